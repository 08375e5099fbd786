//! Inbox decoding.
//!
//! Opens stored messages one by one. Each message gets its own result, so a
//! missing key or a tampered envelope only affects that message. Key material
//! is fetched only for tiers that need it.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::envelope::wire;
use crate::error::QumailError;
use crate::keyservice::KeySource;

/// A message as the mail store keeps it: envelope wire string plus key id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: u64,
    pub sender: String,
    pub recipient: String,
    pub subject: String,
    pub body_encrypted: String,
    pub key_id: String,
    pub security_level: u8,
    pub threat_score: u32,
}

/// Outcome of opening one stored message.
#[derive(Debug)]
pub struct OpenedMessage<'a> {
    pub message: &'a StoredMessage,
    /// Decoded body, with invalid UTF-8 replaced.
    pub body: Result<String, QumailError>,
}

impl OpenedMessage<'_> {
    pub fn is_ok(&self) -> bool {
        self.body.is_ok()
    }

    /// Body for display; failures become a short placeholder.
    pub fn display_body(&self) -> Cow<'_, str> {
        match &self.body {
            Ok(body) => Cow::Borrowed(body.as_str()),
            Err(e) => Cow::Owned(format!("<Decryption Error: {}>", e)),
        }
    }
}

/// Decodes one wire string, fetching its key from `keys` when needed.
pub fn open(keys: &dyn KeySource, wire_text: &str, key_id: &str) -> Result<Vec<u8>, QumailError> {
    let payload = wire::parse(wire_text)?;
    if !payload.tier().needs_key() {
        return Ok(payload.open(&[])?);
    }
    let material = keys.retrieve_key(key_id)?;
    Ok(payload.open(material.as_bytes())?)
}

/// Opens every message in `messages`, in order.
pub fn open_batch<'a>(keys: &dyn KeySource, messages: &'a [StoredMessage]) -> Vec<OpenedMessage<'a>> {
    messages
        .iter()
        .map(|message| {
            let body = open(keys, &message.body_encrypted, &message.key_id)
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
            match &body {
                Ok(_) => log::debug!("Opened message {}", message.id),
                Err(e) => log::debug!("Could not open message {} (key {}): {}", message.id, message.key_id, e),
            }
            OpenedMessage { message, body }
        })
        .collect()
}
