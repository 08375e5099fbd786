//! Tier primitives.
//!
//! Each security tier has one module here; [`crate::envelope`] selects
//! between them and owns the wire format.
//!
//! - `xor`: word-at-a-time XOR shared by the OTP paths.
//! - `otp`: tier 1, one-time pad over QKD key material.
//! - `qaes`: tier 2, AES-256-GCM under SHA-256 of the key material.
//! - `pqc`: tier 3, structural placeholder for a post-quantum KEM.

pub mod otp;
pub mod pqc;
pub mod qaes;
pub mod xor;

use core::fmt;

/// Errors raised by the envelope codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// Tier 1 needs at least as many key bytes as plaintext bytes.
    KeyTooShort { needed: usize, available: usize },
    /// Tier 2 tag check failed: wrong key, wrong nonce or tampered ciphertext.
    AuthenticationFailed,
    /// A recognized envelope could not be parsed.
    MalformedEnvelope(&'static str),
    /// No fresh nonce could be drawn.
    NonceUnavailable,
    /// The AEAD refused to encrypt (input too large).
    EncryptionFailed,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::KeyTooShort { needed, available } => {
                write!(f, "QKD key too short. Need {}, got {}", needed, available)
            }
            CodecError::AuthenticationFailed => write!(f, "Authentication failed"),
            CodecError::MalformedEnvelope(reason) => write!(f, "Malformed envelope: {}", reason),
            CodecError::NonceUnavailable => write!(f, "Could not generate a nonce"),
            CodecError::EncryptionFailed => write!(f, "Encryption failed"),
        }
    }
}

impl std::error::Error for CodecError {}
