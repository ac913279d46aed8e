//! Partial and final hook responses
//!
//! Each matched mapping accumulates a [`PartialResponse`] across its action
//! flow. Once every mapping has run, [`merge`] folds the partials in match
//! order and [`render`] shapes the result into the per-kind wire format.

pub mod merge;
pub mod render;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use merge::{merge, MergedResponse, DEFAULT_CONTEXT_SEPARATOR};
pub use render::{
    fail_closed, render, HookResponse, HookSpecificOutput, PermissionRequestDecision,
    FAIL_CLOSED_REASON,
};

/// Tool permission decision
///
/// Ordered by priority: `Deny` beats `Ask` beats `Allow`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionDecision {
    Allow,
    Ask,
    Deny,
}

impl PermissionDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionDecision::Allow => "allow",
            PermissionDecision::Ask => "ask",
            PermissionDecision::Deny => "deny",
        }
    }
}

impl std::str::FromStr for PermissionDecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" | "approve" => Ok(PermissionDecision::Allow),
            "ask" => Ok(PermissionDecision::Ask),
            "deny" => Ok(PermissionDecision::Deny),
            other => Err(format!("unknown permission decision '{}'", other)),
        }
    }
}

impl std::fmt::Display for PermissionDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level `decision` value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockDecision {
    Block,
}

/// Output fields accumulated across one mapping's action flow
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PartialResponse {
    pub permission_decision: Option<PermissionDecision>,
    pub permission_reason: Option<String>,
    pub updated_input: Option<Map<String, Value>>,
    pub additional_context: Vec<String>,
    pub decision: Option<BlockDecision>,
    pub reason: Option<String>,
    pub updated_mcp_tool_output: Option<Value>,
    pub system_message: Option<String>,
    /// Free-form top-level fields
    pub extra: Map<String, Value>,
}

impl PartialResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a permission decision
    ///
    /// A lower-priority decision never replaces a higher one. At equal
    /// priority the newer reason wins.
    pub fn set_permission(&mut self, decision: PermissionDecision, reason: Option<String>) {
        match self.permission_decision {
            Some(current) if current > decision => {}
            Some(current) if current == decision => {
                if reason.is_some() {
                    self.permission_reason = reason;
                }
            }
            _ => {
                self.permission_decision = Some(decision);
                self.permission_reason = reason;
            }
        }
    }

    /// Append a context snippet
    pub fn push_context(&mut self, text: impl Into<String>) {
        let text = text.into();
        if !text.trim().is_empty() {
            self.additional_context.push(text);
        }
    }

    /// Block with a reason
    pub fn block(&mut self, reason: impl Into<String>) {
        self.decision = Some(BlockDecision::Block);
        self.reason = Some(reason.into());
    }

    /// Whether no field has been written
    pub fn is_empty(&self) -> bool {
        *self == PartialResponse::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        assert!(PermissionDecision::Deny > PermissionDecision::Ask);
        assert!(PermissionDecision::Ask > PermissionDecision::Allow);
    }

    #[test]
    fn test_set_permission_keeps_higher_priority() {
        let mut partial = PartialResponse::new();
        partial.set_permission(PermissionDecision::Deny, Some("dangerous".into()));
        partial.set_permission(PermissionDecision::Allow, Some("fine".into()));
        assert_eq!(partial.permission_decision, Some(PermissionDecision::Deny));
        assert_eq!(partial.permission_reason.as_deref(), Some("dangerous"));

        partial.set_permission(PermissionDecision::Deny, Some("really dangerous".into()));
        assert_eq!(partial.permission_reason.as_deref(), Some("really dangerous"));
    }

    #[test]
    fn test_blank_context_is_ignored() {
        let mut partial = PartialResponse::new();
        partial.push_context("   ");
        assert!(partial.is_empty());
        partial.push_context("note");
        assert_eq!(partial.additional_context, vec!["note".to_string()]);
    }

    #[test]
    fn test_decision_parsing() {
        assert_eq!("Deny".parse::<PermissionDecision>().unwrap(), PermissionDecision::Deny);
        assert_eq!("approve".parse::<PermissionDecision>().unwrap(), PermissionDecision::Allow);
        assert!("maybe".parse::<PermissionDecision>().is_err());
    }
}
