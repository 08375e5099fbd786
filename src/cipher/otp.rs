//! Tier 1: one-time pad.
//!
//! Encryption is strict about key length; decryption is lenient and XORs
//! over the shorter of ciphertext and key. A ciphertext longer than its key
//! therefore decodes to a truncated plaintext instead of an error.

use super::xor::{xor_into, xor_truncated};
use super::CodecError;

/// XORs `plaintext` with the leading bytes of `key`.
///
/// # Errors
/// `KeyTooShort` when `key.len() < plaintext.len()`; nothing is produced.
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>, CodecError> {
    if key.len() < plaintext.len() {
        return Err(CodecError::KeyTooShort {
            needed: plaintext.len(),
            available: key.len(),
        });
    }
    let mut out = vec![0u8; plaintext.len()];
    xor_into(plaintext, key, &mut out);
    Ok(out)
}

/// XORs `ciphertext` with `key`, truncated to the shorter length.
pub fn decrypt(ciphertext: &[u8], key: &[u8]) -> Vec<u8> {
    xor_truncated(ciphertext, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt() {
        let p = [1u8, 2, 3, 4, 5, 6];
        let k = [6u8, 5, 4, 3, 2, 1, 9, 9];
        let ct = encrypt(&p, &k).unwrap();
        assert_eq!(ct.len(), p.len());
        assert_eq!(decrypt(&ct, &k), p);
    }

    #[test]
    fn test_short_key_rejected() {
        let err = encrypt(b"hello", b"abc").unwrap_err();
        assert_eq!(err, CodecError::KeyTooShort { needed: 5, available: 3 });
    }

    #[test]
    fn test_exact_length_key() {
        let ct = encrypt(b"abc", b"xyz").unwrap();
        assert_eq!(decrypt(&ct, b"xyz"), b"abc");
    }

    #[test]
    fn test_decrypt_with_short_key_truncates() {
        let ct = encrypt(b"hello world", b"0123456789ab").unwrap();
        assert_eq!(decrypt(&ct, b"01234"), b"hello");
    }
}
