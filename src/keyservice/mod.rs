//! Key manager access.
//!
//! [`KeySource`] is the seam between consumers of key material (the service
//! facade and the mailbox) and whoever issues it. Two implementations exist:
//! the in-process [`KeyInventory`] and, with the `remote` feature, the HTTP
//! [`KeyServiceClient`] talking to a key manager such as the bundled simulator.
//!
//! # Components
//! - `api`: JSON bodies of the key manager API.
//! - `client`: blocking HTTP client for the key manager API.
//! - `server`: axum router serving the key manager API over a `KeyInventory`.
//!
//! # Security
//! [`FallbackKeySource`] can substitute an all-zero key when the key manager
//! is unreachable. Anything sealed with such a key has no confidentiality, so
//! the fallback is off unless explicitly enabled and logs every use.

pub mod api;
#[cfg(feature = "remote")]
pub mod client;
pub mod server;

#[cfg(feature = "remote")]
pub use client::KeyServiceClient;

use core::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::inventory::{InventoryError, IssuedKey, KeyInventory, KeyMaterial};

/// Errors from a key source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyServiceError {
    /// The key manager could not be reached or answered with an HTTP error.
    ServiceUnavailable,
    /// The key manager has no record of the requested key id.
    KeyNotFound,
    /// The key manager answered with a body that does not match its API.
    InvalidResponse(&'static str),
    /// The in-process inventory failed.
    Inventory(InventoryError),
}

impl fmt::Display for KeyServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyServiceError::ServiceUnavailable => write!(f, "Key manager unavailable"),
            KeyServiceError::KeyNotFound => write!(f, "Key not found"),
            KeyServiceError::InvalidResponse(what) => write!(f, "Invalid key manager response: {}", what),
            KeyServiceError::Inventory(e) => write!(f, "Key inventory error: {}", e),
        }
    }
}

impl std::error::Error for KeyServiceError {}

impl From<InventoryError> for KeyServiceError {
    fn from(e: InventoryError) -> Self {
        match e {
            InventoryError::KeyNotFound => KeyServiceError::KeyNotFound,
            other => KeyServiceError::Inventory(other),
        }
    }
}

/// Something that issues and retrieves QKD key material.
pub trait KeySource: Send + Sync {
    /// Issues `count` fresh keys, recorded before they are returned.
    fn issue_keys(&self, count: usize) -> Result<Vec<IssuedKey>, KeyServiceError>;

    /// Looks up previously issued material.
    fn retrieve_key(&self, key_id: &str) -> Result<KeyMaterial, KeyServiceError>;

    /// Remaining-key counter as reported by the issuer.
    fn remaining(&self) -> Result<i64, KeyServiceError>;

    fn issue_key(&self) -> Result<IssuedKey, KeyServiceError> {
        self.issue_keys(1)?
            .into_iter()
            .next()
            .ok_or(KeyServiceError::InvalidResponse("no key issued"))
    }
}

impl KeySource for KeyInventory {
    fn issue_keys(&self, count: usize) -> Result<Vec<IssuedKey>, KeyServiceError> {
        Ok(self.issue(count)?)
    }

    fn retrieve_key(&self, key_id: &str) -> Result<KeyMaterial, KeyServiceError> {
        Ok(self.retrieve(key_id)?)
    }

    fn remaining(&self) -> Result<i64, KeyServiceError> {
        Ok(self.stats()?)
    }
}

impl<T: KeySource + ?Sized> KeySource for Arc<T> {
    fn issue_keys(&self, count: usize) -> Result<Vec<IssuedKey>, KeyServiceError> {
        (**self).issue_keys(count)
    }

    fn retrieve_key(&self, key_id: &str) -> Result<KeyMaterial, KeyServiceError> {
        (**self).retrieve_key(key_id)
    }

    fn remaining(&self) -> Result<i64, KeyServiceError> {
        (**self).remaining()
    }
}

/// Wraps a [`KeySource`] and optionally masks key manager outages with
/// all-zero keys.
///
/// Only `ServiceUnavailable` is masked. A missing key id is still reported,
/// and `remaining` always reflects the inner source.
pub struct FallbackKeySource<S> {
    inner: S,
    key_len: usize,
    enabled: bool,
}

impl<S: KeySource> FallbackKeySource<S> {
    pub fn new(inner: S, key_len: usize, enabled: bool) -> Self {
        if enabled {
            log::warn!("Zero-key fallback enabled: key manager outages will produce unprotected messages");
        }
        Self { inner, key_len, enabled }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl<S: KeySource> KeySource for FallbackKeySource<S> {
    fn issue_keys(&self, count: usize) -> Result<Vec<IssuedKey>, KeyServiceError> {
        match self.inner.issue_keys(count) {
            Err(KeyServiceError::ServiceUnavailable) if self.enabled => {
                log::warn!("Key manager unavailable, issuing {} all-zero key(s)", count);
                Ok((0..count)
                    .map(|_| IssuedKey {
                        key_id: Uuid::new_v4().to_string(),
                        material: KeyMaterial::zeroed(self.key_len),
                    })
                    .collect())
            }
            other => other,
        }
    }

    fn retrieve_key(&self, key_id: &str) -> Result<KeyMaterial, KeyServiceError> {
        match self.inner.retrieve_key(key_id) {
            Err(KeyServiceError::ServiceUnavailable) if self.enabled => {
                log::warn!("Key manager unavailable, substituting all-zero key for {}", key_id);
                Ok(KeyMaterial::zeroed(self.key_len))
            }
            other => other,
        }
    }

    fn remaining(&self) -> Result<i64, KeyServiceError> {
        self.inner.remaining()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InventoryConfig;

    struct Offline;

    impl KeySource for Offline {
        fn issue_keys(&self, _count: usize) -> Result<Vec<IssuedKey>, KeyServiceError> {
            Err(KeyServiceError::ServiceUnavailable)
        }

        fn retrieve_key(&self, _key_id: &str) -> Result<KeyMaterial, KeyServiceError> {
            Err(KeyServiceError::ServiceUnavailable)
        }

        fn remaining(&self) -> Result<i64, KeyServiceError> {
            Err(KeyServiceError::ServiceUnavailable)
        }
    }

    fn small_config() -> InventoryConfig {
        InventoryConfig {
            key_len: 32,
            initial_budget: 10,
            path: None,
        }
    }

    #[test]
    fn test_inventory_as_key_source() {
        let inventory = KeyInventory::in_memory(&small_config());
        let key = inventory.issue_key().unwrap();
        assert_eq!(key.material.len(), 32);
        assert_eq!(inventory.retrieve_key(&key.key_id).unwrap(), key.material);
        assert_eq!(KeySource::remaining(&inventory).unwrap(), 9);
        assert_eq!(inventory.retrieve_key("nope").unwrap_err(), KeyServiceError::KeyNotFound);
        assert_eq!(
            inventory.issue_keys(0).unwrap_err(),
            KeyServiceError::Inventory(InventoryError::InvalidCount)
        );
    }

    #[test]
    fn test_shared_inventory() {
        let inventory = Arc::new(KeyInventory::in_memory(&small_config()));
        let source: Arc<dyn KeySource> = inventory.clone();
        let keys = source.issue_keys(3).unwrap();
        assert_eq!(keys.len(), 3);
        assert_eq!(inventory.len().unwrap(), 3);
    }

    #[test]
    fn test_fallback_disabled_reports_outage() {
        let source = FallbackKeySource::new(Offline, 64, false);
        assert_eq!(source.issue_key().unwrap_err(), KeyServiceError::ServiceUnavailable);
        assert_eq!(source.retrieve_key("k").unwrap_err(), KeyServiceError::ServiceUnavailable);
    }

    #[test]
    fn test_fallback_enabled_issues_zero_keys() {
        let source = FallbackKeySource::new(Offline, 64, true);
        let keys = source.issue_keys(2).unwrap();
        assert_eq!(keys.len(), 2);
        assert_ne!(keys[0].key_id, keys[1].key_id);
        assert_eq!(keys[0].material.as_bytes(), &[0u8; 64][..]);
        assert_eq!(source.retrieve_key("any").unwrap(), KeyMaterial::zeroed(64));
        assert_eq!(source.remaining().unwrap_err(), KeyServiceError::ServiceUnavailable);
    }

    #[test]
    fn test_fallback_does_not_mask_missing_key() {
        let inventory = KeyInventory::in_memory(&small_config());
        let source = FallbackKeySource::new(inventory, 32, true);
        assert_eq!(source.retrieve_key("missing").unwrap_err(), KeyServiceError::KeyNotFound);
    }
}
