//! QuMail core.
//!
//! Key lifecycle management for QKD-backed mail and the tiered envelope
//! codec built on it.
//!
//! # Components
//! - `inventory`: issues, records and looks up QKD key material.
//! - `keyservice`: key source abstraction, remote client and the key manager API server.
//! - `cipher` / `envelope`: tier primitives and the self-describing envelope format.
//! - `risk`: lexical risk scoring and tier recommendation.
//! - `mailbox`: per-message inbox decoding.
//! - `dispatch`: bounded delivery queue and mail bridge transport.
//! - `audit`: security event log and dashboard summary.
//! - `service`: the facade tying these together.
//!
//! # Security
//! - Tier 1 is only as strong as the key manager's randomness and the caller's
//!   discipline: material is never marked as used, so a key id can be reused.
//! - Tier 3 is a placeholder and provides no confidentiality.
//! - Key material is zeroized on drop and never logged.

#![forbid(unsafe_code)]

pub mod audit;
pub mod cipher;
pub mod config;
pub mod dispatch;
pub mod entropy;
pub mod envelope;
pub mod error;
pub mod inventory;
pub mod keyservice;
pub mod mailbox;
pub mod risk;
pub mod service;
pub mod storage;

pub use config::QumailConfig;
pub use envelope::{decode, encode, Envelope, Tier};
pub use error::{QumailError, Result};
pub use inventory::{IssuedKey, KeyInventory, KeyMaterial};
pub use keyservice::KeySource;
pub use risk::{recommend, Recommendation};
pub use service::{QumailService, SealedMessage};

/// Crate version, for diagnostics endpoints.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
