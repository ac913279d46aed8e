//! Append-only durable record log
//!
//! Records are JSON lines. Appends take the log's lock and write one line in
//! append mode. A line torn by a kill is skipped on read, and the next append
//! starts on a fresh line.

use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use serde_json::Value;
use tracing::warn;

use crate::{
    error::{IoOperation, StorageError, StorageResult},
    file_lock::FileLockGuard,
};

/// Append-only record store
pub trait RecordLog: Send + Sync {
    /// Append one record
    fn append(&self, record: &Value) -> StorageResult<()>;

    /// Read every record in append order
    fn read_all(&self) -> StorageResult<Vec<Value>>;
}

/// JSON-lines record log on disk
#[derive(Debug, Clone)]
pub struct FileRecordLog {
    path: PathBuf,
}

impl FileRecordLog {
    /// Create a log at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "records".into());
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn read_bytes(&self) -> StorageResult<Vec<u8>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(StorageError::io(&self.path, IoOperation::Read, e)),
        }
    }
}

/// Whether a non-empty file lacks its final newline
fn missing_final_newline(file: &mut File) -> std::io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

impl RecordLog for FileRecordLog {
    fn append(&self, record: &Value) -> StorageResult<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let _guard = FileLockGuard::acquire(self.lock_path())?;

        let write_err = |e| StorageError::io(&self.path, IoOperation::Write, e);
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(write_err)?;

        if missing_final_newline(&mut file).map_err(|e| StorageError::io(&self.path, IoOperation::Read, e))? {
            line.insert(0, b'\n');
        }
        file.write_all(&line).map_err(write_err)?;
        file.flush().map_err(write_err)
    }

    fn read_all(&self) -> StorageResult<Vec<Value>> {
        let _guard = FileLockGuard::acquire(self.lock_path())?;
        let content = self.read_bytes()?;
        let text = String::from_utf8_lossy(&content);

        let mut records = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(value) => records.push(value),
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = index + 1,
                    error = %e,
                    "Skipping unreadable record"
                ),
            }
        }
        Ok(records)
    }
}

/// In-memory record log
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordLog {
    records: Arc<Mutex<Vec<Value>>>,
}

impl InMemoryRecordLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordLog for InMemoryRecordLog {
    fn append(&self, record: &Value) -> StorageResult<()> {
        self.records
            .lock()
            .map_err(|e| StorageError::lock("records", format!("Failed to acquire lock: {}", e)))?
            .push(record.clone());
        Ok(())
    }

    fn read_all(&self) -> StorageResult<Vec<Value>> {
        Ok(self
            .records
            .lock()
            .map_err(|e| StorageError::lock("records", format!("Failed to acquire lock: {}", e)))?
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_append_preserves_order() {
        let dir = TempDir::new().unwrap();
        let log = FileRecordLog::new(dir.path().join("records.jsonl"));

        log.append(&json!({"n": 1})).unwrap();
        log.append(&json!({"n": 2})).unwrap();
        log.append(&json!({"n": 3})).unwrap();

        let records = log.read_all().unwrap();
        let ns: Vec<i64> = records.iter().filter_map(|r| r["n"].as_i64()).collect();
        assert_eq!(ns, vec![1, 2, 3]);
    }

    #[test]
    fn test_append_only_adds_a_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("records.jsonl");
        let log = FileRecordLog::new(&path);

        for n in 0..50 {
            log.append(&json!({"n": n})).unwrap();
        }
        let before = std::fs::read(&path).unwrap();
        log.append(&json!({"n": 50})).unwrap();
        let after = std::fs::read(&path).unwrap();

        assert!(after.starts_with(&before));
        assert_eq!(&after[before.len()..], b"{\"n\":50}\n");
        let ns: Vec<i64> = log.read_all().unwrap().iter().filter_map(|r| r["n"].as_i64()).collect();
        assert_eq!(ns, (0..=50).collect::<Vec<i64>>());
    }

    #[test]
    fn test_append_after_torn_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("records.jsonl");
        std::fs::write(&path, "{\"n\":1}\n{\"n\":").unwrap();

        let log = FileRecordLog::new(&path);
        log.append(&json!({"n": 2})).unwrap();

        let records = log.read_all().unwrap();
        assert_eq!(records, vec![json!({"n": 1}), json!({"n": 2})]);
    }

    #[test]
    fn test_read_missing_log_is_empty() {
        let dir = TempDir::new().unwrap();
        let log = FileRecordLog::new(dir.path().join("none.jsonl"));
        assert!(log.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_unreadable_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("records.jsonl");
        std::fs::write(&path, "{\"n\":1}\nnot json\n").unwrap();

        let log = FileRecordLog::new(&path);
        log.append(&json!({"n": 2})).unwrap();

        let records = log.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["n"], 2);
    }

    #[test]
    fn test_lock_file_sits_next_to_log() {
        let log = FileRecordLog::new("/var/tmp/tollgate/records.jsonl");
        assert_eq!(
            log.lock_path(),
            PathBuf::from("/var/tmp/tollgate/records.jsonl.lock")
        );
    }

    #[test]
    fn test_in_memory_log() {
        let log = InMemoryRecordLog::new();
        log.append(&json!("a")).unwrap();
        assert_eq!(log.read_all().unwrap(), vec![json!("a")]);
    }
}
