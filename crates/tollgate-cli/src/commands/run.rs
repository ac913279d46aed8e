//! The hook protocol: one payload on stdin, one response line on stdout

use std::path::Path;

use serde_json::Value;
use tollgate_hooks::{fail_closed, EventKind, EventPipeline, HookResponse, Settings};
use tracing::{error, warn};

/// Response line and exit code for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    /// Exactly one line of JSON
    pub line: String,
    pub exit_code: i32,
    /// Diagnostic for stderr when startup failed
    pub diagnostic: Option<String>,
}

/// Process one hook invocation
#[derive(Debug, Clone, Default)]
pub struct RunCommand {
    kind: Option<String>,
}

impl RunCommand {
    /// Create a run command; without a kind the payload's `hook_event_name` is used
    pub fn new(kind: Option<String>) -> Self {
        Self { kind }
    }

    /// Event kind label for `payload`
    pub fn label(&self, payload: &Value) -> Option<String> {
        self.kind.clone().or_else(|| {
            payload
                .get("hook_event_name")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
    }

    /// Handle `input` against the configuration in `config_dir`
    ///
    /// Never fails. A configuration error still prints the fail-closed
    /// response but exits 1.
    pub async fn execute(&self, config_dir: &Path, settings: Settings, input: &[u8]) -> RunOutput {
        let payload = parse_payload(input);
        let label = self.label(&payload).unwrap_or_default();

        let pipeline = match EventPipeline::from_settings(config_dir, settings) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                error!(config_dir = %config_dir.display(), error = %e, "Configuration rejected");
                return self.startup_failure(input, &e.to_string());
            }
        };

        let response = pipeline.handle(&label, &payload).await;
        RunOutput {
            line: to_line(&response),
            exit_code: 0,
            diagnostic: None,
        }
    }

    /// Output for a configuration that could not be loaded
    ///
    /// `message` goes to the diagnostic only, never into the response.
    pub fn startup_failure(&self, input: &[u8], message: &str) -> RunOutput {
        let label = self.label(&parse_payload(input)).unwrap_or_default();
        let response = fail_closed(label.parse::<EventKind>().ok());
        RunOutput {
            line: to_line(&response),
            exit_code: 1,
            diagnostic: Some(format!("Configuration error: {}", message)),
        }
    }
}

/// Raw stdin as JSON; bytes that are not UTF-8 JSON become `null`, which
/// the normalizer rejects like any other invalid payload
fn parse_payload(input: &[u8]) -> Value {
    serde_json::from_slice(input).unwrap_or_else(|e| {
        warn!(error = %e, bytes = input.len(), "Payload is not valid JSON");
        Value::Null
    })
}

fn to_line(response: &HookResponse) -> String {
    response.to_json_string().unwrap_or_else(|e| {
        error!(error = %e, "Failed to serialize response");
        "{}".to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_label_prefers_argument() {
        let payload = json!({"hook_event_name": "Stop"});
        assert_eq!(RunCommand::new(None).label(&payload).as_deref(), Some("Stop"));
        assert_eq!(
            RunCommand::new(Some("PreToolUse".to_string())).label(&payload).as_deref(),
            Some("PreToolUse")
        );
        assert_eq!(RunCommand::new(None).label(&json!({})), None);
    }

    #[test]
    fn test_startup_failure_denies_tool_use() {
        let output = RunCommand::new(None).startup_failure(
            br#"{"hook_event_name": "PreToolUse"}"#,
            "bad mapping",
        );
        assert_eq!(output.exit_code, 1);
        let parsed: Value = serde_json::from_str(&output.line).unwrap();
        assert_eq!(parsed["hookSpecificOutput"]["permissionDecision"], "deny");
        assert!(!output.line.contains("bad mapping"));
        assert!(output.diagnostic.unwrap().contains("bad mapping"));
    }

    #[test]
    fn test_startup_failure_with_undecodable_input() {
        let output = RunCommand::new(Some("PreToolUse".to_string())).startup_failure(b"\xff{}", "bad");
        let parsed: Value = serde_json::from_str(&output.line).unwrap();
        assert_eq!(parsed["hookSpecificOutput"]["permissionDecision"], "deny");
    }

    #[test]
    fn test_parse_payload() {
        assert_eq!(parse_payload(br#"{"a": 1}"#), json!({"a": 1}));
        assert_eq!(parse_payload(b"\xff{}"), Value::Null);
        assert_eq!(parse_payload(b""), Value::Null);
    }

    #[test]
    fn test_startup_failure_is_noop_for_other_kinds() {
        let output = RunCommand::new(Some("Stop".to_string())).startup_failure(b"{}", "bad mapping");
        assert_eq!(output.line, "{}");
        assert_eq!(output.exit_code, 1);
    }
}
