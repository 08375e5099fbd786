//! Configuration management for QuMail core.
//!
//! Defines the structure for deployment settings. The host application
//! (mail backend, CLI, key manager simulator) builds a [`QumailConfig`],
//! usually from [`QumailConfig::from_env`], and passes the relevant parts to
//! each component.

use core::fmt;

/// Main configuration structure for the library.
#[derive(Debug, Clone)]
pub struct QumailConfig {
    /// Local key inventory settings.
    pub inventory: InventoryConfig,

    /// Remote key manager settings.
    pub key_service: KeyServiceConfig,

    /// Delivery queue settings.
    pub dispatch: DispatchConfig,

    /// Recipient domains that do not attract the risk penalty.
    pub trusted_domains: Vec<String>,
}

impl Default for QumailConfig {
    fn default() -> Self {
        Self {
            inventory: InventoryConfig::default(),
            key_service: KeyServiceConfig::default(),
            dispatch: DispatchConfig::default(),
            trusted_domains: crate::risk::DEFAULT_TRUSTED_DOMAINS
                .iter()
                .map(|d| d.to_string())
                .collect(),
        }
    }
}

/// Configuration specific to the key inventory.
#[derive(Debug, Clone)]
pub struct InventoryConfig {
    /// Length in bytes of every issued key. Must cover the longest OTP body.
    pub key_len: usize,

    /// Advertised key supply before any key is issued.
    pub initial_budget: i64,

    /// Snapshot file. If None, the inventory is memory-only.
    pub path: Option<String>,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            key_len: 1024,
            initial_budget: 4289,
            path: None,
        }
    }
}

/// Configuration specific to the remote key manager client.
#[derive(Debug, Clone)]
pub struct KeyServiceConfig {
    /// Base URL of the key manager (e.g., "http://localhost:8001").
    pub base_url: String,

    /// Slave SAE identifier used in `/keys/{slave_id}`.
    pub slave_id: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Substitute an all-zero key when the key manager is unreachable.
    ///
    /// This trades all confidentiality for availability and is off unless
    /// explicitly enabled.
    pub insecure_zero_key_fallback: bool,
}

impl Default for KeyServiceConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("http://localhost:8001"),
            slave_id: String::from("slave1"),
            timeout_secs: 3,
            insecure_zero_key_fallback: false,
        }
    }
}

/// Configuration specific to outbound delivery.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Number of concurrent delivery workers.
    pub workers: usize,

    /// Maximum number of deliveries waiting for a worker.
    pub queue_capacity: usize,

    /// HTTP mail bridge endpoint. If None, no bridge transport is built.
    pub bridge_url: Option<String>,

    /// Per-request timeout for the bridge, in seconds.
    pub bridge_timeout_secs: u64,

    /// Sender address used when the caller does not supply one.
    pub default_sender: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 64,
            bridge_url: None,
            bridge_timeout_secs: 15,
            default_sender: String::from("demo@qumail.local"),
        }
    }
}

/// Errors raised while reading configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable was set but could not be parsed.
    InvalidValue(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue(name) => write!(f, "Invalid value for {}", name),
        }
    }
}

impl std::error::Error for ConfigError {}

fn parse<T: core::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| ConfigError::InvalidValue(name)),
        None => Ok(None),
    }
}

fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, name: &'static str) -> Result<Option<bool>, ConfigError> {
    match lookup(name).as_deref().map(str::trim) {
        Some("1") | Some("true") | Some("yes") => Ok(Some(true)),
        Some("0") | Some("false") | Some("no") => Ok(Some(false)),
        Some(_) => Err(ConfigError::InvalidValue(name)),
        None => Ok(None),
    }
}

impl QumailConfig {
    /// Defaults overlaid with `QUMAIL_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overlaid with values from `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = parse(&lookup, "QUMAIL_KEY_LEN")? {
            config.inventory.key_len = v;
        }
        if let Some(v) = parse(&lookup, "QUMAIL_KEY_BUDGET")? {
            config.inventory.initial_budget = v;
        }
        if let Some(v) = lookup("QUMAIL_INVENTORY_PATH") {
            config.inventory.path = Some(v);
        }

        if let Some(v) = lookup("QUMAIL_KM_URL") {
            config.key_service.base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("QUMAIL_SLAVE_ID") {
            config.key_service.slave_id = v;
        }
        if let Some(v) = parse(&lookup, "QUMAIL_KM_TIMEOUT_SECS")? {
            config.key_service.timeout_secs = v;
        }
        if let Some(v) = parse_flag(&lookup, "QUMAIL_INSECURE_ZERO_KEY_FALLBACK")? {
            config.key_service.insecure_zero_key_fallback = v;
        }

        if let Some(v) = parse(&lookup, "QUMAIL_DISPATCH_WORKERS")? {
            config.dispatch.workers = v;
        }
        if let Some(v) = parse(&lookup, "QUMAIL_DISPATCH_QUEUE")? {
            config.dispatch.queue_capacity = v;
        }
        if let Some(v) = lookup("QUMAIL_BRIDGE_URL") {
            config.dispatch.bridge_url = Some(v);
        }
        if let Some(v) = parse(&lookup, "QUMAIL_BRIDGE_TIMEOUT_SECS")? {
            config.dispatch.bridge_timeout_secs = v;
        }
        if let Some(v) = lookup("QUMAIL_DEFAULT_SENDER") {
            config.dispatch.default_sender = v;
        }

        if let Some(v) = lookup("QUMAIL_TRUSTED_DOMAINS") {
            config.trusted_domains = v
                .split(',')
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .collect();
        }

        Ok(config)
    }
}
