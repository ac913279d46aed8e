//! Mapping inspection commands

use serde_json::Value;

/// Inspection commands over a configuration directory
#[derive(Debug, Clone)]
pub enum HookCommand {
    /// Load, resolve and report conflicts
    Validate {
        /// Output format (table or json)
        format: Option<String>,
    },

    /// List loaded mappings
    List {
        /// Only mappings for this event kind
        event: Option<String>,

        /// Output format (table or json)
        format: Option<String>,
    },

    /// Show which mappings a payload would match, without running them
    Check {
        /// Event kind label
        kind: String,

        /// Raw event payload
        payload: Value,

        /// Output format (table or json)
        format: Option<String>,
    },

    /// List registered capabilities and rules
    Capabilities {
        /// Output format (table or json)
        format: Option<String>,
    },
}

impl HookCommand {
    /// Whether JSON output was requested
    pub fn wants_json(&self) -> bool {
        let format = match self {
            HookCommand::Validate { format }
            | HookCommand::List { format, .. }
            | HookCommand::Check { format, .. }
            | HookCommand::Capabilities { format } => format,
        };
        matches!(format.as_deref(), Some("json"))
    }
}

/// Validate with table output
pub fn validate() -> HookCommand {
    HookCommand::Validate { format: None }
}

/// List every mapping
pub fn list_mappings() -> HookCommand {
    HookCommand::List {
        event: None,
        format: None,
    }
}

/// Dry-run a payload
pub fn check(kind: impl Into<String>, payload: Value) -> HookCommand {
    HookCommand::Check {
        kind: kind.into(),
        payload,
        format: None,
    }
}
