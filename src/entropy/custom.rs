//! Caller-provided entropy.
//!
//! Bytes are handed out in the order they were added. Used to make key
//! issuance reproducible in tests and when replaying a recorded key stream.

use super::{EntropyError, EntropySource};

/// Source that buffers injected bytes.
pub struct CustomSource {
    buffer: Vec<u8>,
}

impl CustomSource {
    /// Creates a new empty CustomSource.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Creates a source pre-filled with `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self { buffer: bytes.to_vec() }
    }

    /// Add entropy bytes to the pool.
    pub fn add_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Bytes still available.
    pub fn available(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for CustomSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EntropySource for CustomSource {
    fn name(&self) -> &'static str {
        "CustomInput"
    }

    fn fill(&mut self, dest: &mut [u8]) -> Result<(), EntropyError> {
        if self.buffer.len() < dest.len() {
            return Err(EntropyError::Exhausted);
        }
        dest.copy_from_slice(&self.buffer[..dest.len()]);
        self.buffer.drain(..dest.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_source() {
        let mut source = CustomSource::new();
        source.add_bytes(&[0x01, 0x02, 0x03, 0x04]);

        let mut buf = [0u8; 2];
        assert!(source.fill(&mut buf).is_ok());
        assert_eq!(buf, [0x01, 0x02]);

        assert!(source.fill(&mut buf).is_ok());
        assert_eq!(buf, [0x03, 0x04]);

        assert_eq!(source.fill(&mut buf), Err(EntropyError::Exhausted));
    }

    #[test]
    fn test_short_fill_leaves_buffer_intact() {
        let mut source = CustomSource::from_bytes(&[7, 7, 7]);
        let mut buf = [0u8; 4];
        assert_eq!(source.fill(&mut buf), Err(EntropyError::Exhausted));
        assert_eq!(source.available(), 3);
    }
}
