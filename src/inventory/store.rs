//! Key issuance and retrieval.
//!
//! [`KeyInventory`] is the single owner of issued key material. All state
//! sits behind one mutex; `issue` holds it across generation, persistence
//! and commit so concurrent callers can never receive the same key id or
//! desynchronize the counter from the stored records.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use super::{snapshot, InventoryError, IssuedKey, KeyBudget, KeyMaterial, KeyRecord};
use crate::config::InventoryConfig;
use crate::entropy::{EntropySource, OsEntropy};
use crate::storage::{FileBackend, MemoryBackend, SnapshotBackend};

struct InventoryState {
    records: BTreeMap<String, KeyRecord>,
    budget: KeyBudget,
    entropy: Box<dyn EntropySource + Send>,
}

/// Process-wide key inventory.
pub struct KeyInventory {
    key_len: usize,
    backend: Box<dyn SnapshotBackend>,
    state: Mutex<InventoryState>,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl KeyInventory {
    /// Opens an inventory over `backend`, loading any snapshot it already holds.
    pub fn open(
        config: &InventoryConfig,
        backend: Box<dyn SnapshotBackend>,
        entropy: Box<dyn EntropySource + Send>,
    ) -> Result<Self, InventoryError> {
        let records: BTreeMap<String, KeyRecord> = match backend.load().map_err(InventoryError::LoadFailure)? {
            Some(bytes) => {
                let loaded = snapshot::decode(&bytes)?;
                log::info!(
                    "Loaded {} keys from {} (snapshot {})",
                    loaded.len(),
                    backend.describe(),
                    snapshot::fingerprint(&bytes)
                );
                loaded.into_iter().map(|r| (r.key_id.clone(), r)).collect()
            }
            None => BTreeMap::new(),
        };

        let budget = KeyBudget::new(config.initial_budget, records.len());
        log::info!(
            "Key inventory ready: {} keys on record, {} remaining, {}-byte keys, entropy={}",
            records.len(),
            budget.remaining(),
            config.key_len,
            entropy.name()
        );

        Ok(Self {
            key_len: config.key_len,
            backend,
            state: Mutex::new(InventoryState {
                records,
                budget,
                entropy,
            }),
        })
    }

    /// Volatile inventory drawing from the OS CSPRNG.
    pub fn in_memory(config: &InventoryConfig) -> Self {
        let records = BTreeMap::new();
        Self {
            key_len: config.key_len,
            backend: Box::new(MemoryBackend::new()),
            state: Mutex::new(InventoryState {
                budget: KeyBudget::new(config.initial_budget, 0),
                records,
                entropy: Box::new(OsEntropy::new()),
            }),
        }
    }

    /// File-backed inventory drawing from the OS CSPRNG.
    pub fn open_file<P: AsRef<Path>>(path: P, config: &InventoryConfig) -> Result<Self, InventoryError> {
        Self::open(
            config,
            Box::new(FileBackend::new(path)),
            Box::new(OsEntropy::new()),
        )
    }

    fn lock(&self) -> Result<MutexGuard<'_, InventoryState>, InventoryError> {
        self.state.lock().map_err(|_| InventoryError::Poisoned)
    }

    /// Issues `count` fresh keys.
    ///
    /// Keys are recorded durably before they are returned. If generation or
    /// the durable write fails, no key from this call is committed or returned.
    ///
    /// # Errors
    /// * `InvalidCount` for `count == 0`.
    /// * `EntropyFailure` if the entropy source fails.
    /// * `PersistenceFailure` if the backend rejects the new snapshot.
    pub fn issue(&self, count: usize) -> Result<Vec<IssuedKey>, InventoryError> {
        if count == 0 {
            return Err(InventoryError::InvalidCount);
        }

        let mut guard = self.lock()?;
        let state = &mut *guard;
        let issued_at = unix_now();

        let mut pending: Vec<KeyRecord> = Vec::with_capacity(count);
        for _ in 0..count {
            let mut material = KeyMaterial::zeroed(self.key_len);
            state
                .entropy
                .fill(material.as_mut_bytes())
                .map_err(|_| InventoryError::EntropyFailure)?;

            let key_id = loop {
                let candidate = Uuid::new_v4().to_string();
                if !state.records.contains_key(&candidate) && !pending.iter().any(|r| r.key_id == candidate) {
                    break candidate;
                }
            };

            pending.push(KeyRecord {
                key_id,
                material,
                issued_at,
            });
        }

        let next = snapshot::encode(state.records.values().chain(pending.iter()))?;
        if let Err(e) = self.backend.store(&next) {
            log::error!("Key issuance aborted, {} rejected snapshot: {}", self.backend.describe(), e);
            return Err(InventoryError::PersistenceFailure(e));
        }

        let issued: Vec<IssuedKey> = pending
            .iter()
            .map(|r| IssuedKey {
                key_id: r.key_id.clone(),
                material: r.material.clone(),
            })
            .collect();
        for record in pending {
            state.records.insert(record.key_id.clone(), record);
        }
        let remaining = state.budget.consume(count as u64);

        log::info!("Issued {} key(s), {} remaining", count, remaining);
        if state.budget.is_exhausted() {
            log::warn!("Key budget exhausted ({} remaining)", remaining);
        }

        Ok(issued)
    }

    /// Looks up previously issued material.
    ///
    /// Retrieval is a pure read: the record is not marked as used and the
    /// remaining counter does not change.
    pub fn retrieve(&self, key_id: &str) -> Result<KeyMaterial, InventoryError> {
        let state = self.lock()?;
        state
            .records
            .get(key_id)
            .map(|r| r.material.clone())
            .ok_or(InventoryError::KeyNotFound)
    }

    /// Current value of the remaining-key counter.
    pub fn stats(&self) -> Result<i64, InventoryError> {
        Ok(self.lock()?.budget.remaining())
    }

    /// Number of keys on record.
    pub fn len(&self) -> Result<usize, InventoryError> {
        Ok(self.lock()?.records.len())
    }

    pub fn is_empty(&self) -> Result<bool, InventoryError> {
        Ok(self.len()? == 0)
    }

    pub fn contains(&self, key_id: &str) -> Result<bool, InventoryError> {
        Ok(self.lock()?.records.contains_key(key_id))
    }

    /// Length in bytes of every key this inventory issues.
    pub fn key_len(&self) -> usize {
        self.key_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::CustomSource;
    use crate::storage::StorageError;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    struct RejectingBackend;

    impl SnapshotBackend for RejectingBackend {
        fn describe(&self) -> String {
            "rejecting".to_string()
        }
        fn load(&self) -> Result<Option<Vec<u8>>, StorageError> {
            Ok(None)
        }
        fn store(&self, _snapshot: &[u8]) -> Result<(), StorageError> {
            Err(StorageError::DiskFull)
        }
    }

    fn config(key_len: usize, budget: i64) -> InventoryConfig {
        InventoryConfig {
            key_len,
            initial_budget: budget,
            ..Default::default()
        }
    }

    #[test]
    fn test_issue_distinct_ids_and_counter() {
        let inventory = KeyInventory::in_memory(&config(64, 100));
        let before = inventory.stats().unwrap();

        let keys = inventory.issue(5).unwrap();
        assert_eq!(keys.len(), 5);

        let ids: HashSet<_> = keys.iter().map(|k| k.key_id.clone()).collect();
        assert_eq!(ids.len(), 5);
        assert_eq!(inventory.stats().unwrap(), before - 5);
        assert_eq!(inventory.len().unwrap(), 5);

        for key in &keys {
            assert_eq!(key.material.len(), 64);
            assert_eq!(inventory.retrieve(&key.key_id).unwrap(), key.material);
        }
    }

    #[test]
    fn test_issue_uses_entropy_source() {
        let mut bytes = vec![0xAAu8; 8];
        bytes.extend_from_slice(&[0x55u8; 8]);
        let inventory = KeyInventory::open(
            &config(8, 10),
            Box::new(MemoryBackend::new()),
            Box::new(CustomSource::from_bytes(&bytes)),
        )
        .unwrap();

        let keys = inventory.issue(2).unwrap();
        assert_eq!(keys[0].material.as_bytes(), &[0xAAu8; 8]);
        assert_eq!(keys[1].material.as_bytes(), &[0x55u8; 8]);
    }

    #[test]
    fn test_zero_count_rejected() {
        let inventory = KeyInventory::in_memory(&config(16, 10));
        assert_eq!(inventory.issue(0).unwrap_err(), InventoryError::InvalidCount);
        assert_eq!(inventory.stats().unwrap(), 10);
    }

    #[test]
    fn test_retrieve_unknown_key() {
        let inventory = KeyInventory::in_memory(&config(16, 10));
        assert_eq!(inventory.retrieve("missing").unwrap_err(), InventoryError::KeyNotFound);
    }

    #[test]
    fn test_retrieve_is_repeatable_and_read_only() {
        let inventory = KeyInventory::in_memory(&config(16, 10));
        let key = inventory.issue(1).unwrap().remove(0);
        let after_issue = inventory.stats().unwrap();

        let first = inventory.retrieve(&key.key_id).unwrap();
        let second = inventory.retrieve(&key.key_id).unwrap();
        assert_eq!(first, second);
        assert_eq!(inventory.stats().unwrap(), after_issue);
    }

    #[test]
    fn test_persistence_failure_commits_nothing() {
        let inventory = KeyInventory::open(
            &config(16, 10),
            Box::new(RejectingBackend),
            Box::new(OsEntropy::new()),
        )
        .unwrap();

        let err = inventory.issue(3).unwrap_err();
        assert_eq!(err, InventoryError::PersistenceFailure(StorageError::DiskFull));
        assert_eq!(inventory.len().unwrap(), 0);
        assert_eq!(inventory.stats().unwrap(), 10);
    }

    #[test]
    fn test_entropy_failure_mid_batch_commits_nothing() {
        // enough for one 8-byte key only
        let inventory = KeyInventory::open(
            &config(8, 10),
            Box::new(MemoryBackend::new()),
            Box::new(CustomSource::from_bytes(&[1u8; 8])),
        )
        .unwrap();

        assert_eq!(inventory.issue(2).unwrap_err(), InventoryError::EntropyFailure);
        assert!(inventory.is_empty().unwrap());
        assert_eq!(inventory.stats().unwrap(), 10);
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys_persistence.json");
        let cfg = config(32, 4289);

        let issued = {
            let inventory = KeyInventory::open_file(&path, &cfg).unwrap();
            inventory.issue(3).unwrap()
        };

        let reopened = KeyInventory::open_file(&path, &cfg).unwrap();
        assert_eq!(reopened.len().unwrap(), 3);
        assert_eq!(reopened.stats().unwrap(), 4286);
        for key in &issued {
            assert_eq!(reopened.retrieve(&key.key_id).unwrap(), key.material);
        }
    }

    #[test]
    fn test_corrupt_snapshot_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.json");
        std::fs::write(&path, b"{\"version\":1,\"checksum\":\"00\",\"records\":{}}").unwrap();

        let result = KeyInventory::open_file(&path, &config(32, 10));
        assert!(matches!(result, Err(InventoryError::Corrupt)));
    }

    #[test]
    fn test_concurrent_issue_is_consistent() {
        let inventory = Arc::new(KeyInventory::in_memory(&config(32, 1000)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let inventory = Arc::clone(&inventory);
                thread::spawn(move || {
                    let mut ids = Vec::new();
                    for _ in 0..10 {
                        for key in inventory.issue(2).unwrap() {
                            ids.push(key.key_id);
                        }
                    }
                    ids
                })
            })
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(all.insert(id), "duplicate key id issued");
            }
        }

        assert_eq!(all.len(), 160);
        assert_eq!(inventory.len().unwrap(), 160);
        assert_eq!(inventory.stats().unwrap(), 1000 - 160);
    }
}
