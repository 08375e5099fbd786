use std::future::Future;
use std::time::Duration;

use serde::Serialize;

use super::{DispatchError, OutboundMessage, Transport};
use crate::config::DispatchConfig;

/// Body POSTed to the mail bridge.
#[derive(Debug, Serialize)]
struct BridgeRequest<'a> {
    to: &'a str,
    subject: &'a str,
    body: String,
    sender: &'a str,
    name: String,
    #[serde(rename = "replyTo")]
    reply_to: &'a str,
}

impl<'a> BridgeRequest<'a> {
    fn from_message(message: &'a OutboundMessage) -> Self {
        Self {
            to: &message.to,
            subject: &message.subject,
            body: message.render_body(),
            sender: &message.sender,
            name: message.display_name(),
            reply_to: &message.sender,
        }
    }
}

/// Delivers through an HTTP mail relay that accepts one JSON message per POST.
///
/// Redirects are followed. Any non-2xx answer is a failed delivery.
#[derive(Debug, Clone)]
pub struct HttpBridgeTransport {
    url: String,
    client: reqwest::Client,
}

impl HttpBridgeTransport {
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Transport for the configured bridge, or None when no bridge URL is set.
    pub fn from_config(config: &DispatchConfig) -> Option<Self> {
        config
            .bridge_url
            .as_deref()
            .map(|url| Self::new(url, config.bridge_timeout_secs))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for HttpBridgeTransport {
    fn deliver(&self, message: &OutboundMessage) -> impl Future<Output = Result<(), DispatchError>> + Send {
        let request = self.client.post(&self.url).json(&BridgeRequest::from_message(message));
        async move {
            let resp = request
                .send()
                .await
                .map_err(|e| DispatchError::TransportFailed(e.to_string()))?;
            let status = resp.status();
            if !status.is_success() {
                return Err(DispatchError::Rejected(status.as_u16()));
            }
            Ok(())
        }
    }
}
