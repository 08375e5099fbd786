//! Versioned JSON envelope record.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::wire::{b64_decode, nonce_from_slice};
use super::{Envelope, Payload, Tier};
use crate::cipher::CodecError;

pub const RECORD_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeRecord {
    pub v: u32,
    /// Wire tag (`OTP`, `QAES`, `PQC`, `PLAIN`).
    pub alg: String,
    pub ciphertext: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    pub key_id: String,
}

impl EnvelopeRecord {
    pub fn from_envelope(envelope: &Envelope) -> Self {
        Self {
            v: RECORD_VERSION,
            alg: envelope.tier().tag().to_string(),
            ciphertext: STANDARD.encode(envelope.payload.ciphertext()),
            nonce: envelope.payload.nonce().map(|n| STANDARD.encode(n)),
            key_id: envelope.key_id.clone(),
        }
    }

    pub fn to_json(&self) -> String {
        // A struct of strings and integers always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Result<Self, CodecError> {
        let record: Self =
            serde_json::from_str(json).map_err(|_| CodecError::MalformedEnvelope("invalid envelope record"))?;
        if record.v != RECORD_VERSION {
            return Err(CodecError::MalformedEnvelope("unsupported record version"));
        }
        Ok(record)
    }

    pub fn into_envelope(self) -> Result<Envelope, CodecError> {
        let tier = Tier::from_tag(&self.alg).ok_or(CodecError::MalformedEnvelope("unknown algorithm"))?;
        let ciphertext = b64_decode(&self.ciphertext)?;

        let payload = match tier {
            Tier::Otp => Payload::Otp { ciphertext },
            Tier::Pqc => Payload::Pqc { ciphertext },
            Tier::Plain => Payload::Plain { body: ciphertext },
            Tier::QuantumAes => {
                let nonce = self.nonce.as_deref().ok_or(CodecError::MalformedEnvelope("missing nonce"))?;
                Payload::QuantumAes {
                    ciphertext,
                    nonce: nonce_from_slice(&b64_decode(nonce)?)?,
                }
            }
        };

        Ok(Envelope {
            key_id: self.key_id,
            payload,
        })
    }
}
