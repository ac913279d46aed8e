//! Wire format of the final response
//!
//! The host reads a single JSON object from stdout. Tool-permission kinds
//! nest their fields under `hookSpecificOutput`; Stop and SubagentStop use a
//! flat top-level `decision`. An event nothing matched renders as `{}`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{merge::MergedResponse, BlockDecision, PermissionDecision};
use crate::events::EventKind;

/// Final response written to stdout
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<BlockDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook_specific_output: Option<HookSpecificOutput>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Kind-specific output block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookSpecificOutput {
    pub hook_event_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_decision: Option<PermissionDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_decision_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_input: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
    #[serde(
        rename = "updatedMCPToolOutput",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_mcp_tool_output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<PermissionRequestDecision>,
}

impl HookSpecificOutput {
    fn new(kind: EventKind) -> Self {
        Self {
            hook_event_name: kind.as_str().to_string(),
            permission_decision: None,
            permission_decision_reason: None,
            updated_input: None,
            additional_context: None,
            updated_mcp_tool_output: None,
            decision: None,
        }
    }

    fn has_content(&self) -> bool {
        self.permission_decision.is_some()
            || self.permission_decision_reason.is_some()
            || self.updated_input.is_some()
            || self.additional_context.is_some()
            || self.updated_mcp_tool_output.is_some()
            || self.decision.is_some()
    }
}

/// Decision block of a PermissionRequest response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRequestDecision {
    pub behavior: PermissionDecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_input: Option<Map<String, Value>>,
}

impl HookResponse {
    /// The `{}` response
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether this renders as `{}`
    pub fn is_empty(&self) -> bool {
        *self == HookResponse::default()
    }

    /// Compact single-line JSON
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Permission decision carried by the response, wherever it is nested
    pub fn permission_decision(&self) -> Option<PermissionDecision> {
        let output = self.hook_specific_output.as_ref()?;
        output
            .permission_decision
            .or_else(|| output.decision.as_ref().map(|d| d.behavior))
    }
}

/// Shape a merged response for `kind`
pub fn render(kind: EventKind, merged: &MergedResponse) -> HookResponse {
    let mut response = HookResponse {
        system_message: merged.system_message.clone(),
        extra: merged.extra.clone(),
        ..HookResponse::default()
    };
    let mut output = HookSpecificOutput::new(kind);

    match kind {
        EventKind::PreToolUse => {
            output.permission_decision = merged.permission_decision;
            output.permission_decision_reason = merged.permission_reason.clone();
            output.updated_input = merged.updated_input.clone();
            output.additional_context = merged.additional_context.clone();
            set_block(&mut response, merged);
        }
        EventKind::PermissionRequest => {
            // The host asks the user itself when no behavior is given
            output.decision = match merged.permission_decision {
                Some(PermissionDecision::Ask) | None => None,
                Some(behavior) => Some(PermissionRequestDecision {
                    behavior,
                    message: merged.permission_reason.clone(),
                    updated_input: merged.updated_input.clone(),
                }),
            };
        }
        EventKind::Stop | EventKind::SubagentStop => {
            set_block(&mut response, merged);
        }
        EventKind::PostToolUse => {
            set_block(&mut response, merged);
            output.additional_context = merged.additional_context.clone();
            output.updated_mcp_tool_output = merged.updated_mcp_tool_output.clone();
        }
        EventKind::UserPromptSubmit => {
            set_block(&mut response, merged);
            output.additional_context = merged.additional_context.clone();
        }
        _ => {
            output.additional_context = merged.additional_context.clone();
        }
    }

    if output.has_content() {
        response.hook_specific_output = Some(output);
    }

    response
}

fn set_block(response: &mut HookResponse, merged: &MergedResponse) {
    if merged.decision.is_some() {
        response.decision = merged.decision;
        response.reason = merged.reason.clone();
    }
}

/// Reason carried by every fail-closed denial; the cause goes to the log only
pub const FAIL_CLOSED_REASON: &str = "tollgate: blocked (fail-closed)";

/// Response emitted when an event cannot be processed safely
///
/// Tool-gating kinds deny with [`FAIL_CLOSED_REASON`]. Everything else,
/// including an unknown kind, is a no-op.
pub fn fail_closed(kind: Option<EventKind>) -> HookResponse {
    let reason = FAIL_CLOSED_REASON;
    let mut output = match kind {
        Some(kind @ (EventKind::PreToolUse | EventKind::PermissionRequest)) => {
            HookSpecificOutput::new(kind)
        }
        _ => return HookResponse::empty(),
    };

    if output.hook_event_name == EventKind::PreToolUse.as_str() {
        output.permission_decision = Some(PermissionDecision::Deny);
        output.permission_decision_reason = Some(reason.to_string());
    } else {
        output.decision = Some(PermissionRequestDecision {
            behavior: PermissionDecision::Deny,
            message: Some(reason.to_string()),
            updated_input: None,
        });
    }

    HookResponse {
        hook_specific_output: Some(output),
        ..HookResponse::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn to_value(response: &HookResponse) -> Value {
        serde_json::to_value(response).unwrap()
    }

    #[test]
    fn test_empty_renders_as_empty_object() {
        for kind in EventKind::ALL {
            let response = render(kind, &MergedResponse::default());
            assert!(response.is_empty());
            assert_eq!(response.to_json_string().unwrap(), "{}");
        }
    }

    #[test]
    fn test_pre_tool_use_shape() {
        let merged = MergedResponse {
            permission_decision: Some(PermissionDecision::Allow),
            permission_reason: Some("rewritten".into()),
            updated_input: json!({"command": "trash rm x"}).as_object().cloned(),
            additional_context: Some("note".into()),
            ..MergedResponse::default()
        };
        let value = to_value(&render(EventKind::PreToolUse, &merged));
        assert_eq!(
            value,
            json!({
                "hookSpecificOutput": {
                    "hookEventName": "PreToolUse",
                    "permissionDecision": "allow",
                    "permissionDecisionReason": "rewritten",
                    "updatedInput": {"command": "trash rm x"},
                    "additionalContext": "note"
                }
            })
        );
    }

    #[test]
    fn test_stop_is_flat() {
        let merged = MergedResponse {
            decision: Some(BlockDecision::Block),
            reason: Some("tests still failing".into()),
            additional_context: Some("ignored".into()),
            ..MergedResponse::default()
        };
        let value = to_value(&render(EventKind::Stop, &merged));
        assert_eq!(value, json!({"decision": "block", "reason": "tests still failing"}));
    }

    #[test]
    fn test_permission_request_shape() {
        let merged = MergedResponse {
            permission_decision: Some(PermissionDecision::Deny),
            permission_reason: Some("no network".into()),
            ..MergedResponse::default()
        };
        let value = to_value(&render(EventKind::PermissionRequest, &merged));
        assert_eq!(
            value["hookSpecificOutput"]["decision"],
            json!({"behavior": "deny", "message": "no network"})
        );

        let ask = MergedResponse {
            permission_decision: Some(PermissionDecision::Ask),
            ..MergedResponse::default()
        };
        assert!(render(EventKind::PermissionRequest, &ask).is_empty());
    }

    #[test]
    fn test_post_tool_use_carries_mcp_output() {
        let merged = MergedResponse {
            additional_context: Some("lint: 2 warnings".into()),
            updated_mcp_tool_output: Some(json!({"ok": true})),
            ..MergedResponse::default()
        };
        let value = to_value(&render(EventKind::PostToolUse, &merged));
        assert_eq!(value["hookSpecificOutput"]["updatedMCPToolOutput"], json!({"ok": true}));
        assert_eq!(value["hookSpecificOutput"]["additionalContext"], "lint: 2 warnings");
    }

    #[test]
    fn test_system_message_and_extra_are_top_level() {
        let mut extra = Map::new();
        extra.insert("suppressOutput".into(), json!(true));
        let merged = MergedResponse {
            system_message: Some("heads up".into()),
            extra,
            ..MergedResponse::default()
        };
        let value = to_value(&render(EventKind::SessionStart, &merged));
        assert_eq!(value, json!({"systemMessage": "heads up", "suppressOutput": true}));
    }

    #[test]
    fn test_fail_closed_shapes() {
        let deny = fail_closed(Some(EventKind::PreToolUse));
        assert_eq!(deny.permission_decision(), Some(PermissionDecision::Deny));
        assert_eq!(
            to_value(&deny)["hookSpecificOutput"]["permissionDecisionReason"],
            FAIL_CLOSED_REASON
        );

        let request = fail_closed(Some(EventKind::PermissionRequest));
        assert_eq!(request.permission_decision(), Some(PermissionDecision::Deny));
        assert_eq!(
            to_value(&request)["hookSpecificOutput"]["decision"]["message"],
            FAIL_CLOSED_REASON
        );

        assert!(fail_closed(Some(EventKind::Stop)).is_empty());
        assert!(fail_closed(None).is_empty());
    }
}
