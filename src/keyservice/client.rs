use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::Url;

use super::api::{IssueBody, KeyEntry, RetrieveBody, StatsBody};
use super::{KeyServiceError, KeySource};
use crate::config::KeyServiceConfig;
use crate::inventory::{IssuedKey, KeyMaterial};

/// Blocking HTTP client for a remote key manager.
///
/// Do not call from inside an async runtime worker; wrap calls in
/// `spawn_blocking` there.
pub struct KeyServiceClient {
    base_url: String,
    slave_id: String,
    client: Client,
}

impl KeyServiceClient {
    pub fn new(config: &KeyServiceConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            slave_id: config.slave_id.clone(),
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, KeyServiceError> {
        endpoint_url(&self.base_url, segments).ok_or_else(|| {
            log::warn!("Key manager base URL {} cannot carry a path", self.base_url);
            KeyServiceError::ServiceUnavailable
        })
    }

    fn get(&self, url: Url) -> Result<String, KeyServiceError> {
        let resp = self.client.get(url.clone()).send().map_err(|e| {
            log::warn!("Key manager request to {} failed: {}", url, e);
            KeyServiceError::ServiceUnavailable
        })?;

        if !resp.status().is_success() {
            log::warn!("Key manager returned {} for {}", resp.status(), url);
            return Err(KeyServiceError::ServiceUnavailable);
        }

        resp.text().map_err(|_| KeyServiceError::ServiceUnavailable)
    }
}

/// `base` with each segment appended, percent-encoded so ids cannot escape their path slot.
pub(crate) fn endpoint_url(base: &str, segments: &[&str]) -> Option<Url> {
    let mut url = Url::parse(base).ok()?;
    url.path_segments_mut().ok()?.pop_if_empty().extend(segments);
    Some(url)
}

fn decode_entry(entry: KeyEntry) -> Result<IssuedKey, KeyServiceError> {
    let material = KeyMaterial::from_base64(&entry.key).ok_or(KeyServiceError::InvalidResponse("key is not base64"))?;
    Ok(IssuedKey {
        key_id: entry.key_id,
        material,
    })
}

pub(crate) fn parse_issue(body: &str, count: usize) -> Result<Vec<IssuedKey>, KeyServiceError> {
    let parsed: IssueBody =
        serde_json::from_str(body).map_err(|_| KeyServiceError::InvalidResponse("unexpected issue body"))?;
    let entries = parsed.into_entries();
    if entries.len() != count {
        return Err(KeyServiceError::InvalidResponse("wrong number of keys"));
    }
    entries.into_iter().map(decode_entry).collect()
}

pub(crate) fn parse_retrieve(body: &str) -> Result<KeyMaterial, KeyServiceError> {
    match serde_json::from_str(body) {
        Ok(RetrieveBody::Found(entry)) => Ok(decode_entry(entry)?.material),
        Ok(RetrieveBody::Missing(_)) => Err(KeyServiceError::KeyNotFound),
        Err(_) => Err(KeyServiceError::InvalidResponse("unexpected retrieve body")),
    }
}

pub(crate) fn parse_stats(body: &str) -> Result<i64, KeyServiceError> {
    serde_json::from_str::<StatsBody>(body)
        .map(|s| s.remaining_keys)
        .map_err(|_| KeyServiceError::InvalidResponse("unexpected stats body"))
}

impl KeySource for KeyServiceClient {
    fn issue_keys(&self, count: usize) -> Result<Vec<IssuedKey>, KeyServiceError> {
        let mut url = self.endpoint(&["keys", self.slave_id.as_str()])?;
        url.query_pairs_mut().append_pair("number", &count.to_string());
        let keys = parse_issue(&self.get(url)?, count)?;
        log::debug!("Fetched {} key(s) from {}", keys.len(), self.base_url);
        Ok(keys)
    }

    fn retrieve_key(&self, key_id: &str) -> Result<KeyMaterial, KeyServiceError> {
        let url = self.endpoint(&["keys", "retrieve", key_id])?;
        parse_retrieve(&self.get(url)?)
    }

    fn remaining(&self) -> Result<i64, KeyServiceError> {
        let url = self.endpoint(&["stats"])?;
        parse_stats(&self.get(url)?)
    }
}
