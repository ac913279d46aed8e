//! Folding partial responses into one
//!
//! Fields are last-writer-wins in match order, with two exceptions: the
//! permission decision resolves by priority (deny > ask > allow) and
//! additional context is concatenated.

use serde_json::{Map, Value};

use super::{BlockDecision, PartialResponse, PermissionDecision};

/// Separator between context contributions
pub const DEFAULT_CONTEXT_SEPARATOR: &str = "\n\n";

/// Result of folding every partial response of an event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedResponse {
    pub permission_decision: Option<PermissionDecision>,
    pub permission_reason: Option<String>,
    pub updated_input: Option<Map<String, Value>>,
    pub additional_context: Option<String>,
    pub decision: Option<BlockDecision>,
    pub reason: Option<String>,
    pub updated_mcp_tool_output: Option<Value>,
    pub system_message: Option<String>,
    pub extra: Map<String, Value>,
}

/// Fold `partials` in order
pub fn merge<'a, I>(partials: I, separator: &str) -> MergedResponse
where
    I: IntoIterator<Item = &'a PartialResponse>,
{
    let mut merged = MergedResponse::default();
    let mut context: Vec<&str> = Vec::new();

    for partial in partials {
        if let Some(decision) = partial.permission_decision {
            match merged.permission_decision {
                Some(current) if current > decision => {}
                Some(current) if current == decision => {
                    if partial.permission_reason.is_some() {
                        merged.permission_reason = partial.permission_reason.clone();
                    }
                }
                _ => {
                    merged.permission_decision = Some(decision);
                    merged.permission_reason = partial.permission_reason.clone();
                }
            }
        }

        if partial.updated_input.is_some() {
            merged.updated_input = partial.updated_input.clone();
        }
        if partial.decision.is_some() {
            merged.decision = partial.decision;
        }
        if partial.reason.is_some() {
            merged.reason = partial.reason.clone();
        }
        if partial.updated_mcp_tool_output.is_some() {
            merged.updated_mcp_tool_output = partial.updated_mcp_tool_output.clone();
        }
        if partial.system_message.is_some() {
            merged.system_message = partial.system_message.clone();
        }
        for (key, value) in &partial.extra {
            merged.extra.insert(key.clone(), value.clone());
        }

        context.extend(partial.additional_context.iter().map(String::as_str));
    }

    if !context.is_empty() {
        merged.additional_context = Some(context.join(separator));
    }

    merged
}
