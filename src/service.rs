//! Service facade.
//!
//! [`QumailService`] bundles a key source, the risk policy and the audit log
//! behind the operations a mail backend needs: issue and look up keys, seal
//! and open bodies, and recommend a tier.
//!
//! Key source calls may block (file writes, HTTP). From async code, call the
//! facade inside `spawn_blocking`.

use std::sync::Arc;

use crate::audit::{AuditEvent, AuditLog, SecuritySummary};
use crate::config::QumailConfig;
use crate::dispatch::{DeliveryPayload, OutboundMessage};
use crate::envelope::{self, Envelope, Tier};
use crate::error::{QumailError, Result};
use crate::inventory::{IssuedKey, KeyInventory, KeyMaterial};
use crate::keyservice::KeySource;
use crate::mailbox::{self, OpenedMessage, StoredMessage};
use crate::risk::{Recommendation, RiskPolicy};

/// Result of [`QumailService::seal`]; the caller persists `key_id` and the wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedMessage {
    pub key_id: String,
    pub recipient: String,
    pub envelope: Envelope,
    pub threat_score: u32,
}

impl SealedMessage {
    pub fn tier(&self) -> Tier {
        self.envelope.tier()
    }

    pub fn wire(&self) -> String {
        self.envelope.to_wire()
    }
}

pub struct QumailService {
    keys: Arc<dyn KeySource>,
    policy: RiskPolicy,
    audit: AuditLog,
    default_sender: String,
}

impl QumailService {
    pub fn new(keys: Arc<dyn KeySource>, policy: RiskPolicy) -> Self {
        Self {
            keys,
            policy,
            audit: AuditLog::new(),
            default_sender: crate::config::DispatchConfig::default().default_sender,
        }
    }

    fn configured(keys: Arc<dyn KeySource>, config: &QumailConfig) -> Self {
        Self {
            default_sender: config.dispatch.default_sender.clone(),
            ..Self::new(keys, RiskPolicy::with_trusted_domains(config.trusted_domains.iter().cloned()))
        }
    }

    /// Service over an in-process inventory: file-backed when
    /// `config.inventory.path` is set, memory-only otherwise.
    pub fn local(config: &QumailConfig) -> Result<Self> {
        let inventory = match &config.inventory.path {
            Some(path) => KeyInventory::open_file(path, &config.inventory)?,
            None => KeyInventory::in_memory(&config.inventory),
        };
        Ok(Self::configured(Arc::new(inventory), config))
    }

    /// Service over a remote key manager, with the zero-key fallback if enabled.
    #[cfg(feature = "remote")]
    pub fn remote(config: &QumailConfig) -> Self {
        use crate::keyservice::{FallbackKeySource, KeyServiceClient};

        let client = KeyServiceClient::new(&config.key_service);
        let keys = FallbackKeySource::new(
            client,
            config.inventory.key_len,
            config.key_service.insecure_zero_key_fallback,
        );
        Self::configured(Arc::new(keys), config)
    }

    pub fn key_source(&self) -> &Arc<dyn KeySource> {
        &self.keys
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    fn audit_event(&self, event: AuditEvent, description: String) {
        if let Err(e) = self.audit.log(event, description) {
            log::warn!("Could not record {} event: {}", event, e);
        }
    }

    pub fn issue_keys(&self, count: usize) -> Result<Vec<IssuedKey>> {
        let keys = self.keys.issue_keys(count)?;
        self.audit_event(AuditEvent::KeysIssued, format!("Issued {} key(s)", keys.len()));
        Ok(keys)
    }

    pub fn retrieve_key(&self, key_id: &str) -> Result<KeyMaterial> {
        Ok(self.keys.retrieve_key(key_id)?)
    }

    pub fn key_stats(&self) -> Result<i64> {
        Ok(self.keys.remaining()?)
    }

    pub fn encode(&self, tier: Tier, plaintext: &[u8], material: &[u8], key_id: &str) -> Result<Envelope> {
        Ok(envelope::encode(plaintext, tier, material, key_id)?)
    }

    pub fn decode(&self, wire: &str, material: &[u8]) -> Result<Vec<u8>> {
        Ok(envelope::decode(wire, material)?)
    }

    pub fn recommend(&self, body: &str, recipient: &str) -> Recommendation {
        self.policy.recommend(body, recipient)
    }

    /// Issues a key, seals `body` under `tier` and records the send.
    ///
    /// The key is recorded by the key source before it is used here, so the
    /// returned envelope can always be opened later by `key_id`.
    pub fn seal(&self, tier: Tier, body: &str, recipient: &str) -> Result<SealedMessage> {
        let key = self.keys.issue_key()?;
        let threat_score = self.policy.score(body, recipient);
        let envelope = envelope::encode(body.as_bytes(), tier, key.material.as_bytes(), &key.key_id)?;

        if let Err(e) = self.audit.record_sent(recipient, tier, threat_score) {
            log::warn!("Could not record {} event: {}", AuditEvent::EmailSent, e);
        }
        log::info!("Sealed message for {} with {} (key {})", recipient, tier, key.key_id);

        Ok(SealedMessage {
            key_id: key.key_id,
            recipient: recipient.to_string(),
            envelope,
            threat_score,
        })
    }

    /// Fetches the key for `key_id` if the envelope needs one and decodes.
    pub fn open(&self, wire: &str, key_id: &str) -> Result<Vec<u8>> {
        let opened = mailbox::open(self.keys.as_ref(), wire, key_id);
        match &opened {
            Ok(_) => self.audit_event(AuditEvent::EmailOpened, format!("Opened message under key {}", key_id)),
            Err(e) => self.audit_event(AuditEvent::DecryptionFailed, format!("Key {}: {}", key_id, e)),
        }
        opened
    }

    pub fn open_inbox<'a>(&self, messages: &'a [StoredMessage]) -> Vec<OpenedMessage<'a>> {
        let opened = mailbox::open_batch(self.keys.as_ref(), messages);
        let failed = opened.iter().filter(|m| !m.is_ok()).count();
        if failed < opened.len() {
            self.audit_event(
                AuditEvent::EmailOpened,
                format!("Opened {} inbox message(s)", opened.len() - failed),
            );
        }
        if failed > 0 {
            self.audit_event(
                AuditEvent::DecryptionFailed,
                format!("{} of {} inbox messages could not be opened", failed, opened.len()),
            );
        }
        opened
    }

    /// Delivery job for a sealed message. `sender` defaults to the configured address.
    pub fn outbound(&self, sealed: &SealedMessage, subject: &str, sender: Option<&str>) -> OutboundMessage {
        let sender = sender.unwrap_or(&self.default_sender);
        OutboundMessage::new(
            sealed.recipient.clone(),
            format!("QuMail: {} (from {})", subject, sender),
            sender,
            DeliveryPayload::from_envelope(&sealed.envelope),
        )
    }

    /// Dashboard summary with the key source's remaining count.
    pub fn dashboard(&self) -> Result<SecuritySummary> {
        let remaining = self.key_stats()?;
        Ok(self.audit.summary(remaining)?)
    }
}

impl From<Arc<KeyInventory>> for QumailService {
    fn from(inventory: Arc<KeyInventory>) -> Self {
        Self::new(inventory, RiskPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InventoryConfig;
    use crate::keyservice::{FallbackKeySource, KeyServiceError};

    fn service() -> (QumailService, Arc<KeyInventory>) {
        let inventory = Arc::new(KeyInventory::in_memory(&InventoryConfig::default()));
        (QumailService::from(Arc::clone(&inventory)), inventory)
    }

    #[test]
    fn test_issue_then_retrieve() {
        let (service, _) = service();
        let keys = service.issue_keys(3).unwrap();
        assert_eq!(keys.len(), 3);
        assert_eq!(service.key_stats().unwrap(), 4286);
        for key in &keys {
            assert_eq!(service.retrieve_key(&key.key_id).unwrap(), key.material);
        }
        assert_eq!(service.retrieve_key("missing").unwrap_err(), QumailError::KeyNotFound);
    }

    #[test]
    fn test_seal_and_open_every_tier() {
        let (service, inventory) = service();
        for tier in [Tier::Plain, Tier::Otp, Tier::QuantumAes, Tier::Pqc] {
            let sealed = service.seal(tier, "Operation details attached", "bob@qumail.local").unwrap();
            assert!(inventory.contains(&sealed.key_id).unwrap());
            assert_eq!(sealed.tier(), tier);
            assert_eq!(sealed.threat_score, 50);
            assert_eq!(service.open(&sealed.wire(), &sealed.key_id).unwrap(), b"Operation details attached");
        }
        assert_eq!(service.dashboard().unwrap().secured_comms, 4);
    }

    #[test]
    fn test_encode_decode_with_caller_key() {
        let (service, _) = service();
        let key = service.issue_keys(1).unwrap().remove(0);
        let envelope = service.encode(Tier::Otp, b"hello", key.material.as_bytes(), &key.key_id).unwrap();
        assert_eq!(service.decode(&envelope.to_wire(), key.material.as_bytes()).unwrap(), b"hello");

        assert_eq!(
            service.encode(Tier::Otp, b"hello", b"abc", "k").unwrap_err(),
            QumailError::KeyTooShort { needed: 5, available: 3 }
        );
    }

    #[test]
    fn test_body_longer_than_key_rejected() {
        let (service, _) = service();
        let body = "x".repeat(2000);
        assert_eq!(
            service.seal(Tier::Otp, &body, "a@qumail.local").unwrap_err(),
            QumailError::KeyTooShort { needed: 2000, available: 1024 }
        );
        // Long bodies are fine under the AEAD tier.
        assert!(service.seal(Tier::QuantumAes, &body, "a@qumail.local").is_ok());
    }

    #[test]
    fn test_recommend_uses_policy() {
        let (service, _) = service();
        let rec = service.recommend("this is confidential and contains a password", "x@evil.com");
        assert_eq!(rec.tier, Tier::Pqc);
        assert_eq!(rec.score, 105);
    }

    #[test]
    fn test_open_failure_is_audited() {
        let (service, _) = service();
        let sealed = service.seal(Tier::QuantumAes, "hi", "a@qumail.local").unwrap();
        let other = service.issue_keys(1).unwrap().remove(0);
        assert_eq!(
            service.open(&sealed.wire(), &other.key_id).unwrap_err(),
            QumailError::AuthenticationFailed
        );
        let recent = service.audit().recent(1).unwrap();
        assert_eq!(recent[0].event, AuditEvent::DecryptionFailed);
    }

    #[test]
    fn test_successful_open_is_audited() {
        let (service, _) = service();
        let sealed = service.seal(Tier::Otp, "hi", "a@qumail.local").unwrap();
        assert_eq!(service.open(&sealed.wire(), &sealed.key_id).unwrap(), b"hi");
        let recent = service.audit().recent(1).unwrap();
        assert_eq!(recent[0].event, AuditEvent::EmailOpened);
    }

    #[test]
    fn test_outbound_message() {
        let (service, _) = service();
        let sealed = service.seal(Tier::Otp, "hi", "bob@example.org").unwrap();
        let outbound = service.outbound(&sealed, "Status", None);
        assert_eq!(outbound.to, "bob@example.org");
        assert_eq!(outbound.sender, "demo@qumail.local");
        assert_eq!(outbound.subject, "QuMail: Status (from demo@qumail.local)");
        assert_eq!(outbound.payload.key_id, sealed.key_id);
        assert_eq!(outbound.payload.algorithm, "OTP (One-Time Pad)");
    }

    struct Offline;

    impl KeySource for Offline {
        fn issue_keys(&self, _count: usize) -> std::result::Result<Vec<IssuedKey>, KeyServiceError> {
            Err(KeyServiceError::ServiceUnavailable)
        }

        fn retrieve_key(&self, _key_id: &str) -> std::result::Result<KeyMaterial, KeyServiceError> {
            Err(KeyServiceError::ServiceUnavailable)
        }

        fn remaining(&self) -> std::result::Result<i64, KeyServiceError> {
            Err(KeyServiceError::ServiceUnavailable)
        }
    }

    #[test]
    fn test_outage_without_fallback() {
        let service = QumailService::new(Arc::new(FallbackKeySource::new(Offline, 1024, false)), RiskPolicy::default());
        assert_eq!(
            service.seal(Tier::Otp, "hi", "a@qumail.local").unwrap_err(),
            QumailError::ServiceUnavailable
        );
    }

    #[test]
    fn test_outage_with_fallback_uses_zero_key() {
        let service = QumailService::new(Arc::new(FallbackKeySource::new(Offline, 1024, true)), RiskPolicy::default());
        let sealed = service.seal(Tier::Otp, "hi", "a@qumail.local").unwrap();
        // An all-zero pad leaves the plaintext visible.
        assert_eq!(sealed.wire(), "OTP_ENC(aGk=)");
        assert_eq!(service.open(&sealed.wire(), &sealed.key_id).unwrap(), b"hi");
    }

    #[test]
    fn test_local_from_config_with_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = QumailConfig::default();
        config.inventory.path = Some(dir.path().join("keys.json").to_string_lossy().into_owned());

        let sealed = {
            let service = QumailService::local(&config).unwrap();
            service.seal(Tier::QuantumAes, "persisted", "a@qumail.local").unwrap()
        };

        let reopened = QumailService::local(&config).unwrap();
        assert_eq!(reopened.open(&sealed.wire(), &sealed.key_id).unwrap(), b"persisted");
        assert_eq!(reopened.key_stats().unwrap(), 4288);
    }
}
