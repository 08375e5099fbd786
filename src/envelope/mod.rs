//! Envelope codec.
//!
//! Turns a plaintext, a [`Tier`] and QKD key material into a self-describing
//! [`Envelope`], and back. The envelope records which algorithm was used and
//! carries everything except the key: the key is referenced by `key_id` and
//! fetched from the inventory at decode time.
//!
//! Two serializations exist:
//! - `wire`: `"<TAG>_ENC(<base64 ciphertext>[:<base64 nonce>])"`, the canonical
//!   form stored with a message and carried verbatim by transports.
//! - `record`: a versioned JSON document that also carries `key_id`.
//!
//! Encoding and decoding are pure functions of their inputs (plus a fresh
//! nonce for tier 2) and are safe to call from any number of threads.

pub mod record;
pub mod wire;

pub use record::EnvelopeRecord;

use core::fmt;

use serde::{Deserialize, Serialize};

pub use crate::cipher::CodecError;
use crate::cipher::qaes::NONCE_LEN;
use crate::cipher::{otp, pqc, qaes};
use crate::entropy::{EntropySource, OsEntropy};

/// Security tier selecting the envelope algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// Level 0: no transform.
    Plain,
    /// Level 1: one-time pad.
    Otp,
    /// Level 2: AES-256-GCM keyed from QKD material.
    QuantumAes,
    /// Level 3: post-quantum placeholder.
    Pqc,
}

impl Tier {
    /// Maps a numeric security level; anything unrecognized is `Plain`.
    pub fn from_level(level: i64) -> Self {
        match level {
            1 => Tier::Otp,
            2 => Tier::QuantumAes,
            3 => Tier::Pqc,
            _ => Tier::Plain,
        }
    }

    pub fn level(self) -> u8 {
        match self {
            Tier::Plain => 0,
            Tier::Otp => 1,
            Tier::QuantumAes => 2,
            Tier::Pqc => 3,
        }
    }

    /// Tag used in the wire format.
    pub fn tag(self) -> &'static str {
        match self {
            Tier::Plain => "PLAIN",
            Tier::Otp => "OTP",
            Tier::QuantumAes => "QAES",
            Tier::Pqc => "PQC",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "PLAIN" => Some(Tier::Plain),
            "OTP" => Some(Tier::Otp),
            "QAES" => Some(Tier::QuantumAes),
            "PQC" => Some(Tier::Pqc),
            _ => None,
        }
    }

    /// Human label shown in delivery payloads.
    pub fn algorithm_name(self) -> &'static str {
        match self {
            Tier::Plain => "UNENCRYPTED",
            Tier::Otp => "OTP (One-Time Pad)",
            Tier::QuantumAes => "Quantum-AES-256-GCM",
            Tier::Pqc => "PQC (Kyber-1024)",
        }
    }

    /// Whether decoding needs the QKD key material.
    pub fn needs_key(self) -> bool {
        matches!(self, Tier::Otp | Tier::QuantumAes)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Algorithm-specific envelope contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Otp { ciphertext: Vec<u8> },
    QuantumAes { ciphertext: Vec<u8>, nonce: [u8; NONCE_LEN] },
    Pqc { ciphertext: Vec<u8> },
    Plain { body: Vec<u8> },
}

impl Payload {
    pub fn tier(&self) -> Tier {
        match self {
            Payload::Otp { .. } => Tier::Otp,
            Payload::QuantumAes { .. } => Tier::QuantumAes,
            Payload::Pqc { .. } => Tier::Pqc,
            Payload::Plain { .. } => Tier::Plain,
        }
    }

    pub fn ciphertext(&self) -> &[u8] {
        match self {
            Payload::Otp { ciphertext }
            | Payload::QuantumAes { ciphertext, .. }
            | Payload::Pqc { ciphertext } => ciphertext,
            Payload::Plain { body } => body,
        }
    }

    pub fn nonce(&self) -> Option<&[u8; NONCE_LEN]> {
        match self {
            Payload::QuantumAes { nonce, .. } => Some(nonce),
            _ => None,
        }
    }

    /// Recovers the plaintext. `material` is ignored by tiers 0 and 3.
    pub fn open(&self, material: &[u8]) -> Result<Vec<u8>, CodecError> {
        match self {
            Payload::Otp { ciphertext } => Ok(otp::decrypt(ciphertext, material)),
            Payload::QuantumAes { ciphertext, nonce } => qaes::open(ciphertext, material, nonce),
            Payload::Pqc { ciphertext } => Ok(pqc::unwrap(ciphertext)),
            Payload::Plain { body } => Ok(body.clone()),
        }
    }
}

/// An encoded message body plus a reference to the key it was sealed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub key_id: String,
    pub payload: Payload,
}

impl Envelope {
    pub fn tier(&self) -> Tier {
        self.payload.tier()
    }

    /// Canonical wire string.
    pub fn to_wire(&self) -> String {
        wire::render(&self.payload)
    }

    /// Parses a wire string; untagged text becomes a `Plain` payload.
    pub fn parse(wire: &str, key_id: impl Into<String>) -> Result<Self, CodecError> {
        Ok(Self {
            key_id: key_id.into(),
            payload: wire::parse(wire)?,
        })
    }

    pub fn open(&self, material: &[u8]) -> Result<Vec<u8>, CodecError> {
        self.payload.open(material)
    }

    /// Versioned JSON form including `key_id`.
    pub fn to_json(&self) -> String {
        EnvelopeRecord::from_envelope(self).to_json()
    }

    pub fn from_json(json: &str) -> Result<Self, CodecError> {
        EnvelopeRecord::from_json(json)?.into_envelope()
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

/// Seals `plaintext` under `tier`, drawing tier 2 nonces from the OS CSPRNG.
///
/// # Errors
/// * `KeyTooShort` for tier 1 when `material` is shorter than `plaintext`.
/// * `NonceUnavailable` / `EncryptionFailed` for tier 2.
pub fn encode(plaintext: &[u8], tier: Tier, material: &[u8], key_id: &str) -> Result<Envelope, CodecError> {
    encode_with_entropy(plaintext, tier, material, key_id, &mut OsEntropy::new())
}

/// [`encode`] with an explicit nonce source.
pub fn encode_with_entropy(
    plaintext: &[u8],
    tier: Tier,
    material: &[u8],
    key_id: &str,
    entropy: &mut dyn EntropySource,
) -> Result<Envelope, CodecError> {
    let payload = match tier {
        Tier::Otp => Payload::Otp {
            ciphertext: otp::encrypt(plaintext, material)?,
        },
        Tier::QuantumAes => {
            let (ciphertext, nonce) = qaes::seal(plaintext, material, entropy)?;
            Payload::QuantumAes { ciphertext, nonce }
        }
        Tier::Pqc => Payload::Pqc {
            ciphertext: pqc::wrap(plaintext),
        },
        Tier::Plain => Payload::Plain {
            body: plaintext.to_vec(),
        },
    };

    Ok(Envelope {
        key_id: key_id.to_string(),
        payload,
    })
}

/// Decodes a wire string with `material`.
///
/// Unrecognized or missing tags are treated as plaintext and returned as-is.
///
/// # Errors
/// * `MalformedEnvelope` if a recognized tag has a broken body.
/// * `AuthenticationFailed` for tier 2 mismatches or tampering.
pub fn decode(wire: &str, material: &[u8]) -> Result<Vec<u8>, CodecError> {
    wire::parse(wire)?.open(material)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::CustomSource;
    use proptest::prelude::*;

    #[test]
    fn test_tier_levels() {
        assert_eq!(Tier::from_level(1), Tier::Otp);
        assert_eq!(Tier::from_level(2), Tier::QuantumAes);
        assert_eq!(Tier::from_level(3), Tier::Pqc);
        assert_eq!(Tier::from_level(0), Tier::Plain);
        assert_eq!(Tier::from_level(7), Tier::Plain);
        assert_eq!(Tier::from_level(-1), Tier::Plain);
        assert_eq!(Tier::QuantumAes.level(), 2);
    }

    #[test]
    fn test_otp_wire_shape() {
        let envelope = encode(b"hi", Tier::Otp, &[0u8; 4], "k1").unwrap();
        assert_eq!(envelope.to_wire(), "OTP_ENC(aGk=)");
        assert_eq!(envelope.to_string(), "OTP_ENC(aGk=)");
    }

    #[test]
    fn test_otp_key_too_short() {
        let err = encode(b"hello", Tier::Otp, b"key", "k1").unwrap_err();
        assert_eq!(err, CodecError::KeyTooShort { needed: 5, available: 3 });
    }

    #[test]
    fn test_otp_decode_short_key_truncates() {
        let key: Vec<u8> = (0..32).collect();
        let wire = encode(b"attack at dawn", Tier::Otp, &key, "k").unwrap().to_wire();
        assert_eq!(decode(&wire, &key[..6]).unwrap(), b"attack");
    }

    #[test]
    fn test_qaes_wire_carries_nonce() {
        let mut entropy = CustomSource::from_bytes(&[0u8; NONCE_LEN]);
        let envelope = encode_with_entropy(b"x", Tier::QuantumAes, b"key", "k", &mut entropy).unwrap();
        let wire = envelope.to_wire();
        assert!(wire.starts_with("QAES_ENC("));
        assert!(wire.ends_with(":AAAAAAAAAAAAAAAA)"));
        assert_eq!(decode(&wire, b"key").unwrap(), b"x");
    }

    #[test]
    fn test_qaes_wrong_key_or_nonce() {
        let material = vec![9u8; 1024];
        let envelope = encode(b"quarterly finance report", Tier::QuantumAes, &material, "k").unwrap();
        let wire = envelope.to_wire();

        assert_eq!(decode(&wire, &[8u8; 1024]).unwrap_err(), CodecError::AuthenticationFailed);

        let mut other = envelope.clone();
        if let Payload::QuantumAes { nonce, .. } = &mut other.payload {
            nonce[0] ^= 0xFF;
        }
        assert_eq!(decode(&other.to_wire(), &material).unwrap_err(), CodecError::AuthenticationFailed);
    }

    #[test]
    fn test_pqc_roundtrip_needs_no_key() {
        let wire = encode(b"hello", Tier::Pqc, &[], "k").unwrap().to_wire();
        assert_eq!(wire, "PQC_ENC(UFFDX0hFQURFUjpoZWxsbw==)");
        assert_eq!(decode(&wire, &[]).unwrap(), b"hello");
    }

    #[test]
    fn test_plain_roundtrip() {
        let envelope = encode(b"plain text", Tier::Plain, &[], "k").unwrap();
        assert_eq!(envelope.tier(), Tier::Plain);
        assert_eq!(decode(&envelope.to_wire(), &[]).unwrap(), b"plain text");
    }

    #[test]
    fn test_untagged_is_plaintext() {
        assert_eq!(decode("just a note", b"").unwrap(), b"just a note");
        assert_eq!(decode("XYZ_ENC(aGk=)", b"").unwrap(), b"XYZ_ENC(aGk=)");
        assert_eq!(decode("", b"").unwrap(), b"");
    }

    #[test]
    fn test_envelope_json_record() {
        let material = vec![3u8; 64];
        let envelope = encode(b"contract draft", Tier::QuantumAes, &material, "abc-123").unwrap();
        let json = envelope.to_json();
        let back = Envelope::from_json(&json).unwrap();
        assert_eq!(back, envelope);
        assert_eq!(back.open(&material).unwrap(), b"contract draft");
    }

    proptest! {
        #[test]
        fn prop_otp_roundtrip(plaintext in prop::collection::vec(any::<u8>(), 0..512),
                              extra in prop::collection::vec(any::<u8>(), 0..64),
                              seed in any::<u8>()) {
            let mut key: Vec<u8> = plaintext.iter().map(|b| b.wrapping_mul(31).wrapping_add(seed)).collect();
            key.extend_from_slice(&extra);
            let wire = encode(&plaintext, Tier::Otp, &key, "k").unwrap().to_wire();
            prop_assert_eq!(decode(&wire, &key).unwrap(), plaintext);
        }

        #[test]
        fn prop_qaes_roundtrip(plaintext in prop::collection::vec(any::<u8>(), 0..512),
                               key in prop::collection::vec(any::<u8>(), 1..128)) {
            let wire = encode(&plaintext, Tier::QuantumAes, &key, "k").unwrap().to_wire();
            prop_assert_eq!(decode(&wire, &key).unwrap(), plaintext);
        }

        #[test]
        fn prop_pqc_roundtrip(plaintext in prop::collection::vec(any::<u8>(), 0..512)) {
            let wire = encode(&plaintext, Tier::Pqc, &[], "k").unwrap().to_wire();
            prop_assert_eq!(decode(&wire, &[]).unwrap(), plaintext);
        }
    }
}
