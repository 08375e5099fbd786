//! Crate-level error type.
//!
//! Each module keeps its own error enum; [`QumailError`] folds them into
//! the taxonomy callers of [`crate::service::QumailService`] match on.

use core::fmt;

use crate::audit::AuditError;
use crate::cipher::CodecError;
use crate::config::ConfigError;
use crate::dispatch::DispatchError;
use crate::inventory::InventoryError;
use crate::keyservice::KeyServiceError;
use crate::storage::StorageError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QumailError {
    /// Tier 1 key material is shorter than the plaintext.
    KeyTooShort { needed: usize, available: usize },
    KeyNotFound,
    /// Tier 2 integrity check failed.
    AuthenticationFailed,
    MalformedEnvelope(&'static str),
    /// Issued keys could not be recorded durably.
    PersistenceFailure(StorageError),
    /// The key manager is unreachable or misbehaving.
    ServiceUnavailable,
    InvalidRequest(&'static str),
    EntropyFailure,
    DeliveryFailed(DispatchError),
    Config(ConfigError),
    /// A lock was poisoned or a worker vanished.
    Internal(&'static str),
}

pub type Result<T> = core::result::Result<T, QumailError>;

impl fmt::Display for QumailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QumailError::KeyTooShort { needed, available } => {
                write!(f, "QKD key too short. Need {}, got {}", needed, available)
            }
            QumailError::KeyNotFound => write!(f, "Key not found"),
            QumailError::AuthenticationFailed => write!(f, "Authentication failed"),
            QumailError::MalformedEnvelope(reason) => write!(f, "Malformed envelope: {}", reason),
            QumailError::PersistenceFailure(e) => write!(f, "Persistence failure: {}", e),
            QumailError::ServiceUnavailable => write!(f, "Key manager unavailable"),
            QumailError::InvalidRequest(reason) => write!(f, "Invalid request: {}", reason),
            QumailError::EntropyFailure => write!(f, "Entropy source failed"),
            QumailError::DeliveryFailed(e) => write!(f, "Delivery failed: {}", e),
            QumailError::Config(e) => write!(f, "Configuration error: {}", e),
            QumailError::Internal(what) => write!(f, "Internal error: {}", what),
        }
    }
}

impl std::error::Error for QumailError {}

impl From<CodecError> for QumailError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::KeyTooShort { needed, available } => QumailError::KeyTooShort { needed, available },
            CodecError::AuthenticationFailed => QumailError::AuthenticationFailed,
            CodecError::MalformedEnvelope(reason) => QumailError::MalformedEnvelope(reason),
            CodecError::NonceUnavailable => QumailError::EntropyFailure,
            CodecError::EncryptionFailed => QumailError::InvalidRequest("plaintext too large"),
        }
    }
}

impl From<InventoryError> for QumailError {
    fn from(e: InventoryError) -> Self {
        match e {
            InventoryError::KeyNotFound => QumailError::KeyNotFound,
            InventoryError::PersistenceFailure(s) | InventoryError::LoadFailure(s) => QumailError::PersistenceFailure(s),
            InventoryError::Corrupt => QumailError::PersistenceFailure(StorageError::Corruption),
            InventoryError::InvalidCount => QumailError::InvalidRequest("key count must be positive"),
            InventoryError::EntropyFailure => QumailError::EntropyFailure,
            InventoryError::Poisoned => QumailError::Internal("key inventory lock poisoned"),
        }
    }
}

impl From<KeyServiceError> for QumailError {
    fn from(e: KeyServiceError) -> Self {
        match e {
            KeyServiceError::ServiceUnavailable | KeyServiceError::InvalidResponse(_) => QumailError::ServiceUnavailable,
            KeyServiceError::KeyNotFound => QumailError::KeyNotFound,
            KeyServiceError::Inventory(inner) => inner.into(),
        }
    }
}

impl From<DispatchError> for QumailError {
    fn from(e: DispatchError) -> Self {
        QumailError::DeliveryFailed(e)
    }
}

impl From<ConfigError> for QumailError {
    fn from(e: ConfigError) -> Self {
        QumailError::Config(e)
    }
}

impl From<AuditError> for QumailError {
    fn from(_: AuditError) -> Self {
        QumailError::Internal("audit log unavailable")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_mapping() {
        let e: QumailError = CodecError::KeyTooShort { needed: 5, available: 3 }.into();
        assert_eq!(e, QumailError::KeyTooShort { needed: 5, available: 3 });
        assert_eq!(e.to_string(), "QKD key too short. Need 5, got 3");
        assert_eq!(QumailError::from(CodecError::NonceUnavailable), QumailError::EntropyFailure);
    }

    #[test]
    fn test_key_service_mapping() {
        assert_eq!(QumailError::from(KeyServiceError::KeyNotFound), QumailError::KeyNotFound);
        assert_eq!(
            QumailError::from(KeyServiceError::InvalidResponse("x")),
            QumailError::ServiceUnavailable
        );
        assert_eq!(
            QumailError::from(KeyServiceError::Inventory(InventoryError::PersistenceFailure(StorageError::DiskFull))),
            QumailError::PersistenceFailure(StorageError::DiskFull)
        );
    }

    #[test]
    fn test_inventory_mapping() {
        assert_eq!(
            QumailError::from(InventoryError::Corrupt),
            QumailError::PersistenceFailure(StorageError::Corruption)
        );
        assert!(matches!(
            QumailError::from(InventoryError::InvalidCount),
            QumailError::InvalidRequest(_)
        ));
    }
}
