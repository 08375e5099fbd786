//! Outbound delivery.
//!
//! Delivery is decoupled from sealing: the caller persists the envelope and
//! its key id first, then submits an [`OutboundMessage`] to the
//! [`Dispatcher`]. Each job is attempted once. The outcome comes back through
//! a [`DeliveryTicket`] and never touches the stored envelope.
//!
//! # Components
//! - `queue`: bounded worker pool and completion tickets.
//! - `bridge`: HTTP mail bridge transport (`remote` feature).

#[cfg(feature = "remote")]
pub mod bridge;
pub mod queue;

#[cfg(feature = "remote")]
pub use bridge::HttpBridgeTransport;
pub use queue::{DeliveryTicket, Dispatcher};

use core::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::envelope::{Envelope, Payload};

/// Errors related to delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The queue is at capacity; the message was not accepted.
    QueueFull,
    /// The dispatcher has shut down.
    Closed,
    /// The transport could not complete the request.
    TransportFailed(String),
    /// The remote side answered with a non-success HTTP status.
    Rejected(u16),
    /// The worker went away before reporting an outcome.
    Canceled,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::QueueFull => write!(f, "Delivery queue is full"),
            DispatchError::Closed => write!(f, "Dispatcher is shut down"),
            DispatchError::TransportFailed(reason) => write!(f, "Transport failed: {}", reason),
            DispatchError::Rejected(status) => write!(f, "Delivery rejected with HTTP {}", status),
            DispatchError::Canceled => write!(f, "Delivery outcome lost"),
        }
    }
}

impl std::error::Error for DispatchError {}

/// Self-describing JSON carried in the body of a delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryPayload {
    pub qumail_secure_payload: bool,
    pub security_level: u8,
    pub algorithm: String,
    pub key_id: String,
    /// Base64 ciphertext; for tier 0 the body text itself.
    pub ciphertext: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

impl DeliveryPayload {
    pub fn from_envelope(envelope: &Envelope) -> Self {
        let tier = envelope.tier();
        let ciphertext = match &envelope.payload {
            Payload::Plain { body } => String::from_utf8_lossy(body).into_owned(),
            other => STANDARD.encode(other.ciphertext()),
        };
        Self {
            qumail_secure_payload: true,
            security_level: tier.level(),
            algorithm: tier.algorithm_name().to_string(),
            key_id: envelope.key_id.clone(),
            ciphertext,
            nonce: envelope.payload.nonce().map(|n| STANDARD.encode(n)),
        }
    }

    /// Indented JSON.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// One message waiting for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub to: String,
    pub subject: String,
    pub sender: String,
    pub payload: DeliveryPayload,
}

const BANNER: &str = "==================================================";

impl OutboundMessage {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, sender: impl Into<String>, payload: DeliveryPayload) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            sender: sender.into(),
            payload,
        }
    }

    /// Display name suggested to the transport.
    pub fn display_name(&self) -> String {
        format!("QuMail: {}", self.sender)
    }

    /// Text body: a short header followed by the pretty-printed payload.
    pub fn render_body(&self) -> String {
        format!(
            "QUMAIL SECURE DISPATCH\n\nFROM: {}\nTO: {}\nALGORITHM: {}\n\n[ SECURE PAYLOAD ]\n{}\n{}\n",
            self.sender,
            self.to,
            self.payload.algorithm,
            self.payload.to_pretty_json(),
            BANNER
        )
    }
}

/// Asynchronous delivery backend.
pub trait Transport: Send + Sync + 'static {
    fn deliver(&self, message: &OutboundMessage) -> impl Future<Output = Result<(), DispatchError>> + Send;
}

/// Synchronous delivery backend, run on the blocking pool through [`Blocking`].
pub trait BlockingTransport: Send + Sync + 'static {
    fn deliver_blocking(&self, message: &OutboundMessage) -> Result<(), DispatchError>;
}

/// Adapts a [`BlockingTransport`] to [`Transport`] via `spawn_blocking`.
pub struct Blocking<T>(Arc<T>);

impl<T: BlockingTransport> Blocking<T> {
    pub fn new(inner: T) -> Self {
        Self(Arc::new(inner))
    }
}

impl<T: BlockingTransport> Transport for Blocking<T> {
    fn deliver(&self, message: &OutboundMessage) -> impl Future<Output = Result<(), DispatchError>> + Send {
        let inner = Arc::clone(&self.0);
        let message = message.clone();
        async move {
            tokio::task::spawn_blocking(move || inner.deliver_blocking(&message))
                .await
                .map_err(|_| DispatchError::Canceled)?
        }
    }
}

/// Keeps delivered messages in memory. Useful for local runs and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryTransport {
    outbox: Arc<Mutex<Vec<OutboundMessage>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<OutboundMessage> {
        self.outbox.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl BlockingTransport for MemoryTransport {
    fn deliver_blocking(&self, message: &OutboundMessage) -> Result<(), DispatchError> {
        self.outbox
            .lock()
            .map_err(|_| DispatchError::TransportFailed(String::from("outbox poisoned")))?
            .push(message.clone());
        Ok(())
    }
}

impl Transport for MemoryTransport {
    fn deliver(&self, message: &OutboundMessage) -> impl Future<Output = Result<(), DispatchError>> + Send {
        let result = self.deliver_blocking(message);
        async move { result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{encode, Tier};

    #[test]
    fn test_payload_from_qaes_envelope() {
        let envelope = encode(b"status report", Tier::QuantumAes, &[5u8; 64], "key-7").unwrap();
        let payload = DeliveryPayload::from_envelope(&envelope);

        assert!(payload.qumail_secure_payload);
        assert_eq!(payload.security_level, 2);
        assert_eq!(payload.algorithm, "Quantum-AES-256-GCM");
        assert_eq!(payload.key_id, "key-7");
        assert!(payload.nonce.is_some());

        let json: serde_json::Value = serde_json::from_str(&payload.to_pretty_json()).unwrap();
        assert_eq!(json["algorithm"], "Quantum-AES-256-GCM");
    }

    #[test]
    fn test_payload_plain_and_otp() {
        let plain = encode(b"hi there", Tier::Plain, &[], "k").unwrap();
        let payload = DeliveryPayload::from_envelope(&plain);
        assert_eq!(payload.algorithm, "UNENCRYPTED");
        assert_eq!(payload.ciphertext, "hi there");

        let otp = encode(b"hi", Tier::Otp, &[0u8; 2], "k").unwrap();
        let payload = DeliveryPayload::from_envelope(&otp);
        assert_eq!(payload.ciphertext, "aGk=");
        assert!(!payload.to_pretty_json().contains("nonce"));
    }

    #[test]
    fn test_render_body_contains_payload() {
        let envelope = encode(b"hi", Tier::Pqc, &[], "key-1").unwrap();
        let message = OutboundMessage::new(
            "bob@qumail.local",
            "QuMail: hello",
            "alice@qumail.local",
            DeliveryPayload::from_envelope(&envelope),
        );
        let body = message.render_body();
        assert!(body.contains("FROM: alice@qumail.local"));
        assert!(body.contains("\"key_id\": \"key-1\""));
        assert_eq!(message.display_name(), "QuMail: alice@qumail.local");
    }

    #[test]
    fn test_memory_transport_records() {
        let transport = MemoryTransport::new();
        let envelope = encode(b"x", Tier::Plain, &[], "k").unwrap();
        let message = OutboundMessage::new("a@b", "s", "c@d", DeliveryPayload::from_envelope(&envelope));
        transport.deliver_blocking(&message).unwrap();
        assert_eq!(transport.delivered(), vec![message]);
    }
}
