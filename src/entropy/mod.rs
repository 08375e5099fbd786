//! Entropy sources for key material.
//!
//! Every byte of issued key material and every AES-GCM nonce is drawn through
//! the [`EntropySource`] trait, so production code runs on the operating
//! system CSPRNG while tests can inject deterministic bytes.
//!
//! # Components
//! - `os`: the operating system CSPRNG (`getrandom` via `rand_core::OsRng`).
//! - `custom`: a caller-filled buffer, drained in order.

pub mod custom;
pub mod os;

pub use custom::CustomSource;
pub use os::OsEntropy;

use core::fmt;

/// Error types for entropy collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntropyError {
    /// The underlying generator refused to produce bytes.
    CollectionFailed,
    /// Source is exhausted (e.g., fixed buffer).
    Exhausted,
}

impl fmt::Display for EntropyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntropyError::CollectionFailed => write!(f, "Entropy collection failed"),
            EntropyError::Exhausted => write!(f, "Entropy source exhausted"),
        }
    }
}

impl std::error::Error for EntropyError {}

/// A trait for entropy sources.
pub trait EntropySource {
    /// Returns a unique identifier for the source.
    fn name(&self) -> &'static str;

    /// Fills `dest` with random bytes from the source.
    ///
    /// # Returns
    /// * `Ok(())` on success.
    /// * `Err(EntropyError)` if the source fails; `dest` contents are then unspecified.
    fn fill(&mut self, dest: &mut [u8]) -> Result<(), EntropyError>;
}
