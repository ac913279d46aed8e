//! Error types for the hooks engine
//!
//! The engine sorts failures by where they may surface:
//!
//! 1. **Configuration errors** ([`ConfigError`]): malformed mapping files or
//!    references to capabilities, rules, or condition operators that do not
//!    exist. These are fatal and are raised at startup, before any event is
//!    processed.
//!
//! 2. **Validation errors** ([`ValidationError`]): an incoming payload is
//!    missing a required field or has the wrong type. The pipeline fails
//!    closed and still emits a response.
//!
//! 3. **Action errors**: anything that goes wrong inside a capability. These
//!    are caught at the action-flow boundary and become an abort outcome for
//!    that mapping only, unless the mapping is marked critical.
//!
//! 4. **State errors**: persisted counter or record I/O failed. Capabilities
//!    fall back to a conservative default and carry on.
//!
//! # Examples
//!
//! ```ignore
//! match pipeline.handle_event(&event).await {
//!     Ok(response) => println!("{}", response.to_json_string()?),
//!     Err(HooksError::CriticalAbort { mapping, reason }) => {
//!         eprintln!("{} aborted: {}", mapping, reason)
//!     }
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::path::PathBuf;

use thiserror::Error;
use tollgate_storage::StorageError;

use crate::events::EventKind;

/// Errors that can occur in the hooks engine
#[derive(Debug, Error)]
pub enum HooksError {
    /// Configuration is invalid; fatal at startup
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The incoming payload failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A mapping references a rule the catalog does not know
    ///
    /// Raised by the matcher. This is distinct from a normal non-match.
    #[error("Unknown rule: {0}")]
    UnknownRule(String),

    /// A capability failed while running
    #[error("Action '{capability}' failed: {message}")]
    Action { capability: String, message: String },

    /// Persisted state could not be read or written
    #[error("State store error: {0}")]
    State(#[from] StorageError),

    /// A bounded external call exceeded its deadline
    #[error("Timed out after {0}ms")]
    Timeout(u64),

    /// A mapping marked critical aborted, failing the whole event
    #[error("Critical mapping {mapping} aborted: {reason}")]
    CriticalAbort { mapping: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl HooksError {
    /// Create an action error
    pub fn action(capability: impl Into<String>, message: impl Into<String>) -> Self {
        HooksError::Action {
            capability: capability.into(),
            message: message.into(),
        }
    }
}

/// Configuration errors
///
/// `location` names the mapping as `<file>#<n>` (1-based declaration index),
/// or the settings file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration file could not be read
    #[error("Failed to read {path}: {message}")]
    Read { path: PathBuf, message: String },

    /// A configuration file is not valid TOML/YAML or has the wrong shape
    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// An event kind label is not one of the supported kinds
    #[error("{location}: unknown event kind '{kind}'")]
    UnknownEvent { location: String, kind: String },

    /// An action reference names a capability that is not registered
    #[error("{location}: unknown capability '{capability}'")]
    UnknownCapability { location: String, capability: String },

    /// A mapping references a rule that is not registered
    #[error("{location}: unknown rule '{rule}'")]
    UnknownRule { location: String, rule: String },

    /// A condition uses an operator the condition language does not have
    #[error("{location}: unknown condition operator '{operator}'")]
    UnknownOperator { location: String, operator: String },

    /// A condition is syntactically invalid
    #[error("{location}: invalid condition: {message}")]
    InvalidCondition { location: String, message: String },

    /// A condition reads a field the mapping's rule does not expose
    #[error("{location}: field '{field}' is not exposed by rule '{rule}'")]
    FieldNotExposed {
        location: String,
        field: String,
        rule: String,
    },

    /// An action reference is malformed or its parameter is rejected
    #[error("{location}: invalid action '{action}': {message}")]
    InvalidAction {
        location: String,
        action: String,
        message: String,
    },

    /// The settings file holds an invalid value
    #[error("Invalid settings: {0}")]
    Settings(String),
}

/// Payload validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The declared kind label is not one of the twelve kinds
    #[error("Unknown event kind '{0}'")]
    UnknownKind(String),

    /// The payload is not valid JSON
    #[error("Invalid JSON payload: {0}")]
    Json(String),

    /// The payload is valid JSON but not an object
    #[error("Payload must be a JSON object")]
    NotAnObject,

    /// A required field is absent
    #[error("Missing required field '{field}' for {kind}")]
    MissingField {
        kind: EventKind,
        field: &'static str,
    },

    /// A required field has the wrong primitive type
    #[error("Field '{field}' for {kind} must be {expected}")]
    WrongType {
        kind: EventKind,
        field: &'static str,
        expected: &'static str,
    },
}

/// Result type for hooks operations
pub type Result<T> = std::result::Result<T, HooksError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_converts() {
        let err: HooksError = ConfigError::UnknownCapability {
            location: "10-safety.toml#2".to_string(),
            capability: "teleport".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "10-safety.toml#2: unknown capability 'teleport'"
        );
    }

    #[test]
    fn test_validation_error_message() {
        let err = ValidationError::MissingField {
            kind: EventKind::PreToolUse,
            field: "tool_name",
        };
        assert_eq!(
            err.to_string(),
            "Missing required field 'tool_name' for PreToolUse"
        );
    }

    #[test]
    fn test_action_helper() {
        let err = HooksError::action("notification", "channel closed");
        assert!(matches!(err, HooksError::Action { .. }));
        assert!(err.to_string().contains("channel closed"));
    }
}
