//! Per-key persisted state with atomic read-modify-write
//!
//! Rate-limit counters and circuit-breaker state must survive across hook
//! invocations, and several invocations may run at the same time. All access
//! goes through [`StateStore::update`], which holds an exclusive lock for the
//! key while the closure runs and replaces the stored value atomically.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    error::{StorageError, StorageResult},
    file_lock::FileLockGuard,
    json_store::{load_json, save_json_atomic},
};

/// Keyed state store
///
/// Implementations must make `update` atomic per key: no other `update` for
/// the same key may interleave between the read and the write.
pub trait StateStore: Send + Sync {
    /// Read the current value for `key`
    fn get(&self, key: &str) -> StorageResult<Option<Value>>;

    /// Apply `f` to the current value and store its result
    ///
    /// Returns the stored value.
    fn update(&self, key: &str, f: &mut dyn FnMut(Option<Value>) -> Value) -> StorageResult<Value>;
}

/// Typed read-modify-write over a [`StateStore`]
///
/// Missing or undecodable values start from `T::default()`. The closure's
/// return value is passed back to the caller.
pub fn update_as<T, R, F>(store: &dyn StateStore, key: &str, f: F) -> StorageResult<R>
where
    T: Serialize + DeserializeOwned + Default,
    F: FnOnce(&mut T) -> R,
{
    let mut f = Some(f);
    let mut output = None;
    let mut encode_error = None;

    store.update(key, &mut |current| {
        let mut state: T = current
            .clone()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        if let Some(f) = f.take() {
            output = Some(f(&mut state));
        }

        match serde_json::to_value(&state) {
            Ok(value) => value,
            Err(e) => {
                encode_error = Some(e);
                current.unwrap_or(Value::Null)
            }
        }
    })?;

    if let Some(e) = encode_error {
        return Err(StorageError::Serialize(e));
    }

    output.ok_or_else(|| StorageError::lock(key, "update closure was not invoked"))
}

/// Typed read over a [`StateStore`]
pub fn get_as<T>(store: &dyn StateStore, key: &str) -> StorageResult<Option<T>>
where
    T: DeserializeOwned,
{
    match store.get(key)? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| StorageError::parse(key, e.to_string())),
        None => Ok(None),
    }
}

/// File-backed state store
///
/// Each key lives in its own JSON file under the store directory, guarded by
/// a sibling `.lock` file.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    /// Create a store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the key files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn value_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(key)))
    }

    fn lock_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.lock", file_stem(key)))
    }
}

impl StateStore for FileStateStore {
    fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        let _guard = FileLockGuard::acquire(self.lock_path(key))?;
        load_json(self.value_path(key))
    }

    fn update(&self, key: &str, f: &mut dyn FnMut(Option<Value>) -> Value) -> StorageResult<Value> {
        let _guard = FileLockGuard::acquire(self.lock_path(key))?;
        let path = self.value_path(key);

        let current = match load_json::<Value, _>(&path) {
            Ok(value) => value,
            Err(StorageError::Parse { message, .. }) => {
                warn!(key = %key, error = %message, "Discarding unreadable state value");
                None
            }
            Err(e) => return Err(e),
        };

        let next = f(current);
        save_json_atomic(&path, &next)?;
        debug!(key = %key, path = %path.display(), "State updated");
        Ok(next)
    }
}

/// In-memory state store
///
/// Same contract as [`FileStateStore`] within a single process.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStateStore {
    values: Arc<Mutex<HashMap<String, Value>>>,
}

impl InMemoryStateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for InMemoryStateStore {
    fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        let values = self
            .values
            .lock()
            .map_err(|e| StorageError::lock(key, format!("Failed to acquire lock: {}", e)))?;
        Ok(values.get(key).cloned())
    }

    fn update(&self, key: &str, f: &mut dyn FnMut(Option<Value>) -> Value) -> StorageResult<Value> {
        let mut values = self
            .values
            .lock()
            .map_err(|e| StorageError::lock(key, format!("Failed to acquire lock: {}", e)))?;
        let next = f(values.get(key).cloned());
        values.insert(key.to_string(), next.clone());
        Ok(next)
    }
}

/// Stable, filesystem-safe file stem for a key
///
/// Keeps a readable prefix and appends an FNV-1a hash so distinct keys that
/// sanitize to the same prefix still get distinct files.
fn file_stem(key: &str) -> String {
    let readable: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(48)
        .collect();

    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in key.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }

    format!("{}-{:016x}", readable, hash)
}
