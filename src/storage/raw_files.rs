//! Raw File Storage.
//!
//! # Security
//! - Files are written atomically (write-sync-rename), so a crash mid-write
//!   leaves either the previous snapshot or the new one, never a torn file.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use super::StorageError;

/// Upper bound on files this module will read into memory.
const MAX_FILE_LEN: u64 = 1024 * 1024 * 1024;

fn temp_path_for(path: &Path) -> Result<PathBuf, StorageError> {
    let filename = path.file_name().ok_or(StorageError::InvalidPath)?;
    Ok(path.with_file_name(format!("{}.tmp", filename.to_string_lossy())))
}

/// Writes data to a file atomically.
pub fn write_atomic<P: AsRef<Path>>(path: P, data: &[u8]) -> Result<(), StorageError> {
    let path = path.as_ref();
    let temp_path = temp_path_for(path)?;

    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir)?;
        }
    }

    let mut file = File::create(&temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;

    // Rename to final path (atomic on POSIX)
    fs::rename(&temp_path, path)?;

    Ok(())
}

/// Reads data from a file.
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, StorageError> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();

    if len > MAX_FILE_LEN {
        return Err(StorageError::IoError);
    }

    let mut buffer = Vec::with_capacity(len as usize);
    file.read_to_end(&mut buffer)?;

    Ok(buffer)
}
