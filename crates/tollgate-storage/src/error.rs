//! Storage error types for tollgate

use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage error types
#[derive(Error, Debug)]
pub enum StorageError {
    /// File read/write failed
    #[error("IO error on {path} ({operation}): {source}")]
    Io {
        path: PathBuf,
        operation: IoOperation,
        source: std::io::Error,
    },

    /// Stored content could not be decoded
    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// Path resolution failed
    #[error("Path resolution failed: {message}")]
    PathResolution { message: String },

    /// A per-key lock could not be taken or was poisoned
    #[error("Lock failed for {path}: {message}")]
    Lock { path: PathBuf, message: String },

    /// Value could not be serialized for storage
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// IO operation type for error context
#[derive(Debug, Clone, Copy)]
pub enum IoOperation {
    Read,
    Write,
    Lock,
    Rename,
    CreateDir,
}

impl std::fmt::Display for IoOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoOperation::Read => write!(f, "read"),
            IoOperation::Write => write!(f, "write"),
            IoOperation::Lock => write!(f, "lock"),
            IoOperation::Rename => write!(f, "rename"),
            IoOperation::CreateDir => write!(f, "create dir"),
        }
    }
}

impl StorageError {
    /// Create an IO error
    pub fn io(path: impl Into<PathBuf>, operation: IoOperation, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            operation,
            source,
        }
    }

    /// Create a parse error
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        StorageError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a path resolution error
    pub fn path_resolution(message: impl Into<String>) -> Self {
        StorageError::PathResolution {
            message: message.into(),
        }
    }

    /// Create a lock error
    pub fn lock(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        StorageError::Lock {
            path: path.into(),
            message: message.into(),
        }
    }
}
