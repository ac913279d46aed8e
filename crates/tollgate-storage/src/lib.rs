//! Storage for tollgate
//!
//! Resolves the configuration and state directories and provides the two
//! kinds of state that outlive a single hook invocation:
//!
//! - [`StateStore`]: per-key values (rate-limit counters, circuit-breaker
//!   state) with atomic read-modify-write under an OS file lock
//! - [`RecordLog`]: an append-only log of JSON records
//!
//! Every write replaces files through a temp file and a rename, so a process
//! killed mid-write never leaves a half-written value behind.

pub mod error;
pub mod file_lock;
pub mod json_store;
pub mod paths;
pub mod record_log;
pub mod state_store;

pub use error::{IoOperation, StorageError, StorageResult};
pub use file_lock::FileLockGuard;
pub use json_store::{load_json, save_json_atomic, write_atomic};
pub use paths::PathResolver;
pub use record_log::{FileRecordLog, InMemoryRecordLog, RecordLog};
pub use state_store::{get_as, update_as, FileStateStore, InMemoryStateStore, StateStore};
