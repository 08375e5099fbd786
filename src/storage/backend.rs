//! Snapshot backends.
//!
//! The inventory serializes its whole state into one snapshot and hands the
//! bytes to a [`SnapshotBackend`]. A backend must either store the snapshot
//! completely or report an error; the inventory only commits in-memory state
//! after `store` returns `Ok`.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{raw_files, StorageError};

/// Durable home for inventory snapshots.
pub trait SnapshotBackend: Send + Sync {
    /// Short label for log lines.
    fn describe(&self) -> String;

    /// Returns the last stored snapshot, or `None` if nothing was stored yet.
    fn load(&self) -> Result<Option<Vec<u8>>, StorageError>;

    /// Replaces the stored snapshot.
    fn store(&self, snapshot: &[u8]) -> Result<(), StorageError>;
}

/// Snapshot kept in a single file, replaced atomically on every store.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotBackend for FileBackend {
    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn load(&self) -> Result<Option<Vec<u8>>, StorageError> {
        match raw_files::read_file(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(bytes)),
            Err(StorageError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn store(&self, snapshot: &[u8]) -> Result<(), StorageError> {
        raw_files::write_atomic(&self.path, snapshot)
    }
}

/// Process-local backend; state is lost with the process.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    snapshot: Mutex<Option<Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotBackend for MemoryBackend {
    fn describe(&self) -> String {
        String::from("memory")
    }

    fn load(&self) -> Result<Option<Vec<u8>>, StorageError> {
        let guard = self.snapshot.lock().map_err(|_| StorageError::IoError)?;
        Ok(guard.clone())
    }

    fn store(&self, snapshot: &[u8]) -> Result<(), StorageError> {
        let mut guard = self.snapshot.lock().map_err(|_| StorageError::IoError)?;
        *guard = Some(snapshot.to_vec());
        Ok(())
    }
}
