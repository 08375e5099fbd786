//! Key Inventory.
//!
//! Owns every piece of key material this process has issued. The inventory
//! is the only holder of the `key_id → material` map and of the remaining-key
//! counter; issuers and retrievers go through [`KeyInventory`] and never keep
//! a private copy.
//!
//! # Components
//! - `store`: [`KeyInventory`], the mutex-guarded issue/retrieve/stats service.
//! - `budget`: the remaining-key counter.
//! - `snapshot`: the versioned, checksummed on-disk format.
//!
//! # Security
//! - **Zeroization**: material lives in `Zeroizing` buffers and is wiped on drop.
//! - **Write-then-respond**: a key is durably recorded before it is returned.
//! - **Reuse**: retrieval does not mark material as consumed, so an OTP key can
//!   be fetched (and therefore reused) any number of times.

pub mod budget;
pub mod snapshot;
pub mod store;

pub use budget::KeyBudget;
pub use store::KeyInventory;

use core::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use zeroize::Zeroizing;

use crate::storage::StorageError;

/// Errors related to key inventory operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryError {
    /// No record exists for the requested key id.
    KeyNotFound,
    /// The durable write of an issuance failed; nothing was issued.
    PersistenceFailure(StorageError),
    /// The stored snapshot could not be read back.
    LoadFailure(StorageError),
    /// The stored snapshot is unreadable or fails its checksum.
    Corrupt,
    /// Issuance was asked for zero keys.
    InvalidCount,
    /// The entropy source could not supply key material.
    EntropyFailure,
    /// A thread panicked while holding the inventory lock.
    Poisoned,
}

impl fmt::Display for InventoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InventoryError::KeyNotFound => write!(f, "Key not found"),
            InventoryError::PersistenceFailure(e) => write!(f, "Failed to persist issued keys: {}", e),
            InventoryError::LoadFailure(e) => write!(f, "Failed to load key inventory: {}", e),
            InventoryError::Corrupt => write!(f, "Key inventory snapshot is corrupt"),
            InventoryError::InvalidCount => write!(f, "Key count must be positive"),
            InventoryError::EntropyFailure => write!(f, "Entropy source failed"),
            InventoryError::Poisoned => write!(f, "Key inventory lock poisoned"),
        }
    }
}

impl std::error::Error for InventoryError {}

/// Raw secret key bytes, wiped from memory on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial(Zeroizing<Vec<u8>>);

impl KeyMaterial {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// All-zero material of `len` bytes.
    pub fn zeroed(len: usize) -> Self {
        Self::new(vec![0u8; len])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub(crate) fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Standard base64 with padding, as served by the key manager API.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.as_bytes())
    }

    pub fn from_base64(text: &str) -> Option<Self> {
        STANDARD.decode(text).ok().map(Self::new)
    }
}

impl AsRef<[u8]> for KeyMaterial {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyMaterial({} bytes)", self.len())
    }
}

/// One issued key.
#[derive(Debug, Clone)]
pub struct KeyRecord {
    pub key_id: String,
    pub material: KeyMaterial,
    /// Unix seconds.
    pub issued_at: u64,
}

/// A key as handed to the caller by [`KeyInventory::issue`].
#[derive(Debug, Clone)]
pub struct IssuedKey {
    pub key_id: String,
    pub material: KeyMaterial,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_debug_hides_bytes() {
        let material = KeyMaterial::new(vec![0xde, 0xad, 0xbe, 0xef]);
        let printed = format!("{:?}", material);
        assert_eq!(printed, "KeyMaterial(4 bytes)");
    }

    #[test]
    fn test_material_base64() {
        let material = KeyMaterial::new(b"qkd".to_vec());
        assert_eq!(material.to_base64(), "cWtk");
        assert_eq!(KeyMaterial::from_base64("cWtk").unwrap(), material);
        assert!(KeyMaterial::from_base64("not base64!").is_none());
    }
}
