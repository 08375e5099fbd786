//! Tier 3: post-quantum placeholder.
//!
//! A real deployment would encapsulate a content key with a KEM
//! (Kyber/ML-KEM) here. Until that exists this tier only prefixes a fixed
//! marker. It applies no cryptographic transform and provides no
//! confidentiality.

/// Marker standing in for the encapsulation payload.
pub const MARKER: &[u8] = b"PQC_HEADER:";

/// Prepends [`MARKER`] to `plaintext`.
pub fn wrap(plaintext: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(MARKER.len() + plaintext.len());
    out.extend_from_slice(MARKER);
    out.extend_from_slice(plaintext);
    out
}

/// Strips [`MARKER`] if present; otherwise returns the input unchanged.
pub fn unwrap(ciphertext: &[u8]) -> Vec<u8> {
    ciphertext.strip_prefix(MARKER).unwrap_or(ciphertext).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_unwrap() {
        let wrapped = wrap(b"hello");
        assert_eq!(wrapped, b"PQC_HEADER:hello");
        assert_eq!(unwrap(&wrapped), b"hello");
    }

    #[test]
    fn test_unwrap_without_marker() {
        assert_eq!(unwrap(b"no marker here"), b"no marker here");
    }
}
