//! Security event log.
//!
//! Keeps a bounded, in-memory trail of security-relevant events and the
//! threat scores of recently sealed messages, and condenses them into a
//! [`SecuritySummary`] for dashboards. Nothing here ever sees key material.

use core::fmt;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::envelope::Tier;

/// Scores above this count as active risks.
pub const ACTIVE_RISK_THRESHOLD: u32 = 50;

/// Number of recent scores averaged into the risk meter.
pub const RISK_WINDOW: usize = 10;

/// Meter value reported before any message has been sealed.
pub const BASELINE_RISK: u32 = 12;

const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditError {
    WriteFailed,
    ReadFailed,
}

impl fmt::Display for AuditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditError::WriteFailed => write!(f, "Failed to write audit log"),
            AuditError::ReadFailed => write!(f, "Failed to read audit log"),
        }
    }
}

impl std::error::Error for AuditError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEvent {
    EmailSent,
    EmailOpened,
    DecryptionFailed,
    KeysIssued,
}

impl AuditEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditEvent::EmailSent => "EMAIL_SENT",
            AuditEvent::EmailOpened => "EMAIL_OPENED",
            AuditEvent::DecryptionFailed => "DECRYPTION_FAILED",
            AuditEvent::KeysIssued => "KEYS_ISSUED",
        }
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub id: u64,
    /// Unix seconds.
    pub timestamp: u64,
    pub event: AuditEvent,
    pub description: String,
}

/// Dashboard view of the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecuritySummary {
    pub remaining_keys: i64,
    /// Mean of the last [`RISK_WINDOW`] threat scores, capped at 100.
    pub risk_meter: u32,
    pub secured_comms: u64,
    pub active_risks: u64,
    /// Newest first.
    pub recent_logs: Vec<AuditEntry>,
}

#[derive(Default)]
struct AuditState {
    entries: VecDeque<AuditEntry>,
    next_id: u64,
    recent_scores: VecDeque<u32>,
    sent_total: u64,
    active_risks: u64,
}

pub struct AuditLog {
    capacity: usize,
    state: Mutex<AuditState>,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log holding at most `capacity` entries; the oldest are dropped first.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(AuditState::default()),
        }
    }

    pub fn log(&self, event: AuditEvent, description: impl Into<String>) -> Result<(), AuditError> {
        let mut state = self.state.lock().map_err(|_| AuditError::WriteFailed)?;
        state.next_id += 1;
        let entry = AuditEntry {
            id: state.next_id,
            timestamp: unix_now(),
            event,
            description: description.into(),
        };
        if state.entries.len() == self.capacity {
            state.entries.pop_front();
        }
        state.entries.push_back(entry);
        Ok(())
    }

    /// Records a sealed message and its threat score.
    pub fn record_sent(&self, recipient: &str, tier: Tier, threat_score: u32) -> Result<(), AuditError> {
        {
            let mut state = self.state.lock().map_err(|_| AuditError::WriteFailed)?;
            state.sent_total += 1;
            if threat_score > ACTIVE_RISK_THRESHOLD {
                state.active_risks += 1;
            }
            if state.recent_scores.len() == RISK_WINDOW {
                state.recent_scores.pop_front();
            }
            state.recent_scores.push_back(threat_score);
        }
        self.log(
            AuditEvent::EmailSent,
            format!("Sent to {} with level {}", recipient, tier.level()),
        )
    }

    /// Up to `limit` entries, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>, AuditError> {
        let state = self.state.lock().map_err(|_| AuditError::ReadFailed)?;
        Ok(state.entries.iter().rev().take(limit).cloned().collect())
    }

    pub fn risk_meter(&self) -> Result<u32, AuditError> {
        let state = self.state.lock().map_err(|_| AuditError::ReadFailed)?;
        if state.recent_scores.is_empty() {
            return Ok(BASELINE_RISK);
        }
        let total: u64 = state.recent_scores.iter().map(|s| u64::from(*s)).sum();
        let mean = total / state.recent_scores.len() as u64;
        Ok(mean.min(100) as u32)
    }

    pub fn summary(&self, remaining_keys: i64) -> Result<SecuritySummary, AuditError> {
        let risk_meter = self.risk_meter()?;
        let recent_logs = self.recent(5)?;
        let state = self.state.lock().map_err(|_| AuditError::ReadFailed)?;
        Ok(SecuritySummary {
            remaining_keys,
            risk_meter,
            secured_comms: state.sent_total,
            active_risks: state.active_risks,
            recent_logs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_summary() {
        let log = AuditLog::new();
        let summary = log.summary(4289).unwrap();
        assert_eq!(summary.risk_meter, BASELINE_RISK);
        assert_eq!(summary.secured_comms, 0);
        assert!(summary.recent_logs.is_empty());
    }

    #[test]
    fn test_record_sent() {
        let log = AuditLog::new();
        log.record_sent("bob@qumail.local", Tier::QuantumAes, 40).unwrap();
        log.record_sent("eve@evil.com", Tier::Pqc, 105).unwrap();

        let summary = log.summary(4287).unwrap();
        assert_eq!(summary.secured_comms, 2);
        assert_eq!(summary.active_risks, 1);
        assert_eq!(summary.risk_meter, 72);
        assert_eq!(summary.recent_logs[0].description, "Sent to eve@evil.com with level 3");
        assert_eq!(summary.recent_logs[1].event, AuditEvent::EmailSent);
    }

    #[test]
    fn test_risk_meter_window_and_cap() {
        let log = AuditLog::new();
        for _ in 0..5 {
            log.record_sent("a@b", Tier::Otp, 0).unwrap();
        }
        for _ in 0..RISK_WINDOW {
            log.record_sent("a@b", Tier::Pqc, 200).unwrap();
        }
        assert_eq!(log.risk_meter().unwrap(), 100);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let log = AuditLog::with_capacity(3);
        for i in 0..5 {
            log.log(AuditEvent::KeysIssued, format!("batch {}", i)).unwrap();
        }
        let recent = log.recent(10).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].description, "batch 4");
        assert_eq!(recent[2].id, 3);
    }

    #[test]
    fn test_event_names() {
        assert_eq!(AuditEvent::EmailSent.to_string(), "EMAIL_SENT");
        let json = serde_json::to_string(&AuditEvent::DecryptionFailed).unwrap();
        assert_eq!(json, "\"DECRYPTION_FAILED\"");
    }
}
