//! OS-level exclusive file locks
//!
//! Every persisted key owns a sibling `.lock` file. Holding the guard gives
//! exclusive access to the key across processes; the lock is released when
//! the guard drops, including on early return.

use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};

use fs2::FileExt;

use crate::error::{IoOperation, StorageError, StorageResult};

/// File lock guard (RAII-style lock release)
#[derive(Debug)]
pub struct FileLockGuard {
    path: PathBuf,
    file: File,
}

impl FileLockGuard {
    /// Block until an exclusive lock on `path` is held
    pub fn acquire(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::io(parent, IoOperation::CreateDir, e))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| StorageError::io(&path, IoOperation::Lock, e))?;

        file.lock_exclusive()
            .map_err(|e| StorageError::lock(&path, format!("Failed to acquire lock: {}", e)))?;

        Ok(Self { path, file })
    }

    /// Try to take the lock without blocking
    ///
    /// Returns `Ok(None)` when another holder has it.
    pub fn try_acquire(path: impl AsRef<Path>) -> StorageResult<Option<Self>> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::io(parent, IoOperation::CreateDir, e))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| StorageError::io(&path, IoOperation::Lock, e))?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { path, file })),
            Err(_) => Ok(None),
        }
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
