//! JSON persistence with atomic replace
//!
//! Writes never edit a file in place: content goes to a temp file in the
//! same directory, which is then renamed over the target.

use std::{io::Write, path::Path};

use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;

use crate::error::{IoOperation, StorageError, StorageResult};

/// Load JSON from a file, `None` when the file does not exist
pub fn load_json<T, P>(path: P) -> StorageResult<Option<T>>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StorageError::io(path, IoOperation::Read, e)),
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| StorageError::parse(path, e.to_string()))
}

/// Save value as JSON atomically (write to temp, then rename)
pub fn save_json_atomic<T, P>(path: P, value: &T) -> StorageResult<()>
where
    T: Serialize + ?Sized,
    P: AsRef<Path>,
{
    let content = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &content)
}

/// Replace the file at `path` with `content` in one rename
pub fn write_atomic(path: impl AsRef<Path>, content: &[u8]) -> StorageResult<()> {
    let path = path.as_ref();
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    std::fs::create_dir_all(parent)
        .map_err(|e| StorageError::io(parent, IoOperation::CreateDir, e))?;

    let mut temp =
        NamedTempFile::new_in(parent).map_err(|e| StorageError::io(parent, IoOperation::Write, e))?;
    temp.write_all(content)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| StorageError::io(temp.path(), IoOperation::Write, e))?;

    temp.persist(path)
        .map_err(|e| StorageError::io(path, IoOperation::Rename, e.error))?;

    Ok(())
}
