//! Storage Module.
//!
//! Durable persistence for the key inventory:
//! - `raw_files`: atomic write-sync-rename file primitives.
//! - `backend`: the [`SnapshotBackend`] seam the inventory persists through,
//!   with file and in-memory implementations.

pub mod backend;
pub mod raw_files;

pub use backend::{FileBackend, MemoryBackend, SnapshotBackend};

use core::fmt;

/// Errors related to storage operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// File not found.
    NotFound,
    /// Permission denied.
    PermissionDenied,
    /// IO error (generic).
    IoError,
    /// Data corruption or integrity check failed.
    Corruption,
    /// Storage is full.
    DiskFull,
    /// Invalid path or filename.
    InvalidPath,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound => write!(f, "File not found"),
            StorageError::PermissionDenied => write!(f, "Permission denied"),
            StorageError::IoError => write!(f, "I/O error"),
            StorageError::Corruption => write!(f, "Stored data is corrupt"),
            StorageError::DiskFull => write!(f, "Storage is full"),
            StorageError::InvalidPath => write!(f, "Invalid storage path"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound,
            std::io::ErrorKind::PermissionDenied => StorageError::PermissionDenied,
            _ => StorageError::IoError,
        }
    }
}
