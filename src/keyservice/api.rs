//! JSON bodies of the key manager API, shared by client and server.
//!
//! - `GET /keys/{slave_id}?number=N` → [`KeyEntry`] for `N == 1`, else [`KeyBatch`]
//! - `GET /keys/retrieve/{key_id}` → [`KeyEntry`] or [`ErrorBody`] (HTTP 200 either way)
//! - `GET /stats` → [`StatsBody`]

use serde::{Deserialize, Serialize};

/// Message returned for an unknown key id.
pub const KEY_NOT_FOUND: &str = "Key not found";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntry {
    pub key_id: String,
    /// Standard base64 of the raw key bytes.
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBatch {
    pub keys: Vec<KeyEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsBody {
    pub remaining_keys: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IssueBody {
    One(KeyEntry),
    Many(KeyBatch),
}

impl IssueBody {
    pub fn into_entries(self) -> Vec<KeyEntry> {
        match self {
            IssueBody::One(entry) => vec![entry],
            IssueBody::Many(batch) => batch.keys,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RetrieveBody {
    Found(KeyEntry),
    Missing(ErrorBody),
}

/// Query string of the issuance route; `number` defaults to 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct IssueQuery {
    #[serde(default = "one")]
    pub number: usize,
}

fn one() -> usize {
    1
}
