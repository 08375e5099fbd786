//! On-disk inventory format.
//!
//! ```json
//! { "version": 1,
//!   "checksum": "<blake3 hex over the serialized records>",
//!   "records": { "<key_id>": { "key": "<base64>", "issued_at": 1700000000 } } }
//! ```
//!
//! Records are kept in a `BTreeMap`, so serialization is deterministic and the
//! checksum can be recomputed on load.
//!
//! The flat `{ "<key_id>": "<base64>" }` map written by earlier key manager
//! deployments is still accepted on load. It carries no checksum or issue
//! time; imported records get `issued_at = 0`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{InventoryError, KeyMaterial, KeyRecord};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredKey {
    key: String,
    issued_at: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    checksum: String,
    records: BTreeMap<String, StoredKey>,
}

fn checksum(records: &BTreeMap<String, StoredKey>) -> Result<blake3::Hash, InventoryError> {
    let canonical = serde_json::to_vec(records).map_err(|_| InventoryError::Corrupt)?;
    Ok(blake3::hash(&canonical))
}

/// Serializes `records` into snapshot bytes.
pub fn encode<'a, I>(records: I) -> Result<Vec<u8>, InventoryError>
where
    I: IntoIterator<Item = &'a KeyRecord>,
{
    let stored: BTreeMap<String, StoredKey> = records
        .into_iter()
        .map(|r| {
            (
                r.key_id.clone(),
                StoredKey {
                    key: r.material.to_base64(),
                    issued_at: r.issued_at,
                },
            )
        })
        .collect();

    let file = SnapshotFile {
        version: SNAPSHOT_VERSION,
        checksum: checksum(&stored)?.to_hex().to_string(),
        records: stored,
    };
    serde_json::to_vec(&file).map_err(|_| InventoryError::Corrupt)
}

/// Parses snapshot bytes, verifying version and checksum.
pub fn decode(bytes: &[u8]) -> Result<Vec<KeyRecord>, InventoryError> {
    let file: SnapshotFile = match serde_json::from_slice(bytes) {
        Ok(file) => file,
        Err(_) => return decode_legacy(bytes),
    };
    if file.version != SNAPSHOT_VERSION {
        return Err(InventoryError::Corrupt);
    }

    let expected = checksum(&file.records)?;
    let stored = blake3::Hash::from_hex(file.checksum.as_bytes()).map_err(|_| InventoryError::Corrupt)?;
    // blake3::Hash equality is constant-time
    if expected != stored {
        return Err(InventoryError::Corrupt);
    }

    file.records
        .into_iter()
        .map(|(key_id, stored)| {
            let material = KeyMaterial::from_base64(&stored.key).ok_or(InventoryError::Corrupt)?;
            Ok(KeyRecord {
                key_id,
                material,
                issued_at: stored.issued_at,
            })
        })
        .collect()
}

fn decode_legacy(bytes: &[u8]) -> Result<Vec<KeyRecord>, InventoryError> {
    let flat: BTreeMap<String, String> = serde_json::from_slice(bytes).map_err(|_| InventoryError::Corrupt)?;
    log::warn!("Importing {} keys from an unversioned snapshot without checksum", flat.len());

    flat.into_iter()
        .map(|(key_id, key)| {
            let material = KeyMaterial::from_base64(&key).ok_or(InventoryError::Corrupt)?;
            Ok(KeyRecord {
                key_id,
                material,
                issued_at: 0,
            })
        })
        .collect()
}

/// Short hex fingerprint of a snapshot, safe to log.
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(&blake3::hash(bytes).as_bytes()[..8])
}
