//! Tier 2: "Quantum-AES".
//!
//! The 256-bit AES key is SHA-256 of the full QKD key material; each message
//! gets a fresh 96-bit nonce. AES-256-GCM provides confidentiality and a
//! 128-bit integrity tag appended to the ciphertext. No associated data.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::CodecError;
use crate::entropy::EntropySource;

/// Nonce length in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// GCM tag length appended to every ciphertext.
pub const TAG_LEN: usize = 16;

/// Derives the AES-256 key from QKD key material.
pub fn derive_key(material: &[u8]) -> Zeroizing<[u8; 32]> {
    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&Sha256::digest(material));
    key
}

fn cipher_for(material: &[u8]) -> Aes256Gcm {
    let key = derive_key(material);
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key[..]))
}

/// Encrypts under a nonce drawn from `entropy`. Returns `(ciphertext || tag, nonce)`.
pub fn seal(
    plaintext: &[u8],
    material: &[u8],
    entropy: &mut dyn EntropySource,
) -> Result<(Vec<u8>, [u8; NONCE_LEN]), CodecError> {
    let mut nonce = [0u8; NONCE_LEN];
    entropy.fill(&mut nonce).map_err(|_| CodecError::NonceUnavailable)?;
    let ciphertext = seal_with_nonce(plaintext, material, &nonce)?;
    Ok((ciphertext, nonce))
}

/// Encrypts under a caller-chosen nonce. The nonce must never repeat for the same key.
pub fn seal_with_nonce(plaintext: &[u8], material: &[u8], nonce: &[u8; NONCE_LEN]) -> Result<Vec<u8>, CodecError> {
    cipher_for(material)
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| CodecError::EncryptionFailed)
}

/// Verifies and decrypts.
///
/// # Errors
/// `AuthenticationFailed` for a wrong key, a wrong nonce or any tampering.
pub fn open(ciphertext: &[u8], material: &[u8], nonce: &[u8; NONCE_LEN]) -> Result<Vec<u8>, CodecError> {
    cipher_for(material)
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CodecError::AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::{CustomSource, OsEntropy};

    #[test]
    fn test_seal_open() {
        let material = [7u8; 1024];
        let (ct, nonce) = seal(b"launch window 0400", &material, &mut OsEntropy::new()).unwrap();
        assert_eq!(ct.len(), 18 + TAG_LEN);
        assert_eq!(open(&ct, &material, &nonce).unwrap(), b"launch window 0400");
    }

    #[test]
    fn test_nonce_comes_from_entropy() {
        let mut entropy = CustomSource::from_bytes(&[0x42; NONCE_LEN]);
        let (_, nonce) = seal(b"x", b"key", &mut entropy).unwrap();
        assert_eq!(nonce, [0x42; NONCE_LEN]);
        assert_eq!(seal(b"x", b"key", &mut entropy).unwrap_err(), CodecError::NonceUnavailable);
    }

    #[test]
    fn test_wrong_key_nonce_or_tamper_fail() {
        let material = b"qkd material".to_vec();
        let nonce = [1u8; NONCE_LEN];
        let ct = seal_with_nonce(b"payload", &material, &nonce).unwrap();

        assert_eq!(open(&ct, b"other material", &nonce).unwrap_err(), CodecError::AuthenticationFailed);
        assert_eq!(open(&ct, &material, &[2u8; NONCE_LEN]).unwrap_err(), CodecError::AuthenticationFailed);

        let mut tampered = ct.clone();
        tampered[0] ^= 0x01;
        assert_eq!(open(&tampered, &material, &nonce).unwrap_err(), CodecError::AuthenticationFailed);
    }

    #[test]
    fn test_derive_key_is_sha256() {
        let key = derive_key(b"abc");
        assert_eq!(
            hex::encode(&key[..]),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
