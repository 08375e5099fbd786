//! Canonical text form: `"<TAG>_ENC(<base64 ciphertext>[:<base64 nonce>])"`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::{Payload, Tier};
use crate::cipher::qaes::NONCE_LEN;
use crate::cipher::CodecError;

const TAGS: [Tier; 4] = [Tier::Otp, Tier::QuantumAes, Tier::Pqc, Tier::Plain];

pub(crate) fn b64_decode(text: &str) -> Result<Vec<u8>, CodecError> {
    STANDARD
        .decode(text)
        .map_err(|_| CodecError::MalformedEnvelope("invalid base64"))
}

pub(crate) fn nonce_from_slice(bytes: &[u8]) -> Result<[u8; NONCE_LEN], CodecError> {
    <[u8; NONCE_LEN]>::try_from(bytes).map_err(|_| CodecError::MalformedEnvelope("nonce must be 12 bytes"))
}

/// Renders a payload as its wire string.
pub fn render(payload: &Payload) -> String {
    let tag = payload.tier().tag();
    let body = STANDARD.encode(payload.ciphertext());
    match payload.nonce() {
        Some(nonce) => format!("{}_ENC({}:{})", tag, body, STANDARD.encode(nonce)),
        None => format!("{}_ENC({})", tag, body),
    }
}

/// Splits `wire` into a recognized tier and the text inside the parentheses.
fn split_tagged(wire: &str) -> Option<(Tier, &str)> {
    TAGS.iter().find_map(|tier| {
        wire.strip_prefix(tier.tag())
            .and_then(|rest| rest.strip_prefix("_ENC("))
            .map(|rest| (*tier, rest))
    })
}

/// Parses a wire string.
///
/// Text without a recognized tag is returned as a `Plain` payload holding the
/// input bytes unchanged.
pub fn parse(wire: &str) -> Result<Payload, CodecError> {
    let (tier, rest) = match split_tagged(wire) {
        Some(found) => found,
        None => {
            return Ok(Payload::Plain {
                body: wire.as_bytes().to_vec(),
            })
        }
    };

    let inner = rest
        .trim_end()
        .strip_suffix(')')
        .ok_or(CodecError::MalformedEnvelope("missing terminator"))?;

    match tier {
        Tier::QuantumAes => {
            let (ct, nonce) = inner
                .split_once(':')
                .ok_or(CodecError::MalformedEnvelope("missing nonce"))?;
            Ok(Payload::QuantumAes {
                ciphertext: b64_decode(ct)?,
                nonce: nonce_from_slice(&b64_decode(nonce)?)?,
            })
        }
        Tier::Otp => Ok(Payload::Otp {
            ciphertext: b64_decode(inner)?,
        }),
        Tier::Pqc => Ok(Payload::Pqc {
            ciphertext: b64_decode(inner)?,
        }),
        Tier::Plain => Ok(Payload::Plain {
            body: b64_decode(inner)?,
        }),
    }
}
