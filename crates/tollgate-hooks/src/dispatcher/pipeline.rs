//! The per-invocation event pipeline

use std::{path::Path, sync::Arc, time::Instant};

use serde_json::Value;
use tollgate_storage::{FileRecordLog, FileStateStore, PathResolver};
use tracing::{debug, error, info, warn};

use crate::{
    actions::{ActionContext, SystemClock},
    config::{MappingLoader, MappingValidator, ResolvedMappingSet, Settings},
    conflict::dedupe,
    error::{ConfigError, HooksError, Result},
    events::{normalize_labeled, Event, EventKind},
    executor::{FlowExecutor, FlowReport, RetryPolicy},
    matcher::{match_event, RuleCatalog},
    registry::CapabilityRegistry,
    response::{fail_closed, merge, render, HookResponse},
};

/// Subdirectory of the state directory holding per-key counters
pub const COUNTERS_DIR: &str = "counters";

/// Record log file in the state directory
pub const RECORDS_FILE: &str = "records.jsonl";

/// Resolved configuration plus the machinery to run it
#[derive(Debug)]
pub struct EventPipeline {
    resolved: ResolvedMappingSet,
    rules: RuleCatalog,
    executor: FlowExecutor,
    ctx: ActionContext,
    separator: String,
}

impl EventPipeline {
    /// Assemble a pipeline; retry bounds and the context separator come from
    /// the context's settings
    pub fn new(resolved: ResolvedMappingSet, rules: RuleCatalog, ctx: ActionContext) -> Self {
        let executor = FlowExecutor::new(RetryPolicy::from(&ctx.settings.retry));
        let separator = ctx.settings.merge.context_separator.clone();
        Self {
            resolved,
            rules,
            executor,
            ctx,
            separator,
        }
    }

    /// Load settings and mappings from `config_dir` and resolve them
    ///
    /// `TOLLGATE_*` environment variables override the settings file.
    pub fn from_config_dir(config_dir: &Path) -> std::result::Result<Self, ConfigError> {
        let mut settings = Settings::load(config_dir)?;
        settings.apply_env();
        Self::from_settings(config_dir, settings)
    }

    /// Load and resolve mappings from `config_dir` using `settings`
    ///
    /// Counters and records live under the resolved state directory.
    pub fn from_settings(config_dir: &Path, settings: Settings) -> std::result::Result<Self, ConfigError> {
        let rules = RuleCatalog::builtin();
        let registry = CapabilityRegistry::with_builtins(&settings);
        let set = MappingLoader::load_dir(config_dir)?;
        let resolved = MappingValidator::resolve(set, &registry, &rules)?;

        let state_dir = PathResolver::resolve_state_dir(config_dir, settings.state.dir.as_deref())
            .map_err(|e| ConfigError::Settings(e.to_string()))?;
        debug!(state_dir = %state_dir.display(), "Using state directory");

        let ctx = ActionContext::new(
            Arc::new(FileStateStore::new(state_dir.join(COUNTERS_DIR))),
            Arc::new(FileRecordLog::new(state_dir.join(RECORDS_FILE))),
            Arc::new(settings),
            Arc::new(SystemClock),
        );
        Ok(Self::new(resolved, rules, ctx))
    }

    /// Resolved mapping table
    pub fn mappings(&self) -> &ResolvedMappingSet {
        &self.resolved
    }

    /// Rule catalog in use
    pub fn rules(&self) -> &RuleCatalog {
        &self.rules
    }

    /// Shared action context
    pub fn context(&self) -> &ActionContext {
        &self.ctx
    }

    /// Process one raw payload
    ///
    /// Never fails: an invalid payload or a critical abort produces the
    /// fail-closed response for the kind.
    pub async fn handle(&self, label: &str, raw: &Value) -> HookResponse {
        let kind = label.parse::<EventKind>().ok();

        let event = match normalize_labeled(label, raw) {
            Ok(event) => event,
            Err(e) => {
                warn!(kind = %label, error = %e, "Rejected event payload");
                return fail_closed(kind);
            }
        };

        match self.handle_event(&event).await {
            Ok(response) => response,
            Err(e) => {
                error!(kind = %event.kind(), error = %e, "Event failed closed");
                fail_closed(Some(event.kind()))
            }
        }
    }

    /// Process a normalized event
    ///
    /// # Errors
    ///
    /// [`HooksError::CriticalAbort`] when a critical mapping aborts, or
    /// [`HooksError::UnknownRule`] when the table references a rule the
    /// catalog does not have.
    pub async fn handle_event(&self, event: &Event) -> Result<HookResponse> {
        let start = Instant::now();
        let reports = self.execute(event).await?;

        if let Some(report) = reports.iter().find(|r| r.is_critical_abort()) {
            return Err(HooksError::CriticalAbort {
                mapping: report.mapping_id.clone(),
                reason: report.abort_reason.clone().unwrap_or_default(),
            });
        }

        let merged = merge(reports.iter().map(|r| &r.response), &self.separator);
        let response = render(event.kind(), &merged);

        info!(
            kind = %event.kind(),
            mappings = reports.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Event handled"
        );
        Ok(response)
    }

    /// Match, dedupe and run every applicable mapping, in match order
    ///
    /// Stops after the first critical abort.
    pub async fn execute(&self, event: &Event) -> Result<Vec<FlowReport>> {
        let matched = match_event(event, self.resolved.mappings(), &self.rules)?;
        let matched = dedupe(matched);
        debug!(kind = %event.kind(), matched = matched.len(), "Matched mappings");

        let mut reports = Vec::with_capacity(matched.len());
        for mapping in matched {
            let report = self
                .executor
                .execute(mapping, self.resolved.flow(mapping), event, &self.ctx)
                .await;
            let critical = report.is_critical_abort();
            reports.push(report);
            if critical {
                break;
            }
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::FileFormat,
        response::PermissionDecision,
        types::MappingSet,
    };
    use serde_json::json;

    fn pipeline(mappings: &str) -> EventPipeline {
        let mut set = MappingSet::default();
        MappingLoader::load_from_str(&mut set, mappings, FileFormat::Toml, Path::new("test.toml")).unwrap();
        let settings = Settings::default();
        let rules = RuleCatalog::builtin();
        let resolved =
            MappingValidator::resolve(set, &CapabilityRegistry::with_builtins(&settings), &rules).unwrap();
        EventPipeline::new(resolved, rules, ActionContext::in_memory())
    }

    fn bash(command: &str) -> Value {
        json!({
            "session_id": "s1",
            "transcript_path": "/tmp/t.jsonl",
            "cwd": "/work",
            "hook_event_name": "PreToolUse",
            "tool_name": "Bash",
            "tool_input": {"command": command}
        })
    }

    const SAFETY: &str = r#"
[[mappings]]
event = "PreToolUse"
rule = "bash"
condition = 'command ^= "rm "'
action_flow = ["command/trash", "permission/allow"]

[[mappings]]
event = "PreToolUse"
rule = "bash"
condition = 'command *= "--force"'
action_flow = ["permission/deny"]
"#;

    #[tokio::test]
    async fn test_rewrite_and_allow() {
        let response = pipeline(SAFETY).handle("PreToolUse", &bash("rm -rf /tmp/x")).await;
        let output = response.hook_specific_output.unwrap();
        assert_eq!(output.permission_decision, Some(PermissionDecision::Allow));
        assert_eq!(
            output.updated_input.unwrap()["command"],
            json!("trash rm -rf /tmp/x")
        );
    }

    #[tokio::test]
    async fn test_deny_outranks_allow() {
        let response = pipeline(SAFETY)
            .handle("PreToolUse", &bash("rm -rf /tmp/x --force"))
            .await;
        assert_eq!(response.permission_decision(), Some(PermissionDecision::Deny));
    }

    #[tokio::test]
    async fn test_nothing_matched_is_empty() {
        let response = pipeline(SAFETY).handle("PreToolUse", &bash("ls")).await;
        assert!(response.is_empty());
        assert_eq!(response.to_json_string().unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_invalid_payload_fails_closed() {
        let mut payload = bash("rm x");
        payload.as_object_mut().unwrap().remove("tool_name");
        let response = pipeline(SAFETY).handle("PreToolUse", &payload).await;
        assert_eq!(response.permission_decision(), Some(PermissionDecision::Deny));
        let output = response.hook_specific_output.unwrap();
        assert_eq!(
            output.permission_decision_reason.as_deref(),
            Some("tollgate: blocked (fail-closed)")
        );

        let response = pipeline(SAFETY).handle("Stop", &json!([1, 2])).await;
        assert!(response.is_empty());
    }

    #[tokio::test]
    async fn test_critical_abort_fails_closed() {
        let pipeline = pipeline(
            r#"
[[mappings]]
event = "PreToolUse"
rule = "tool"
action_flow = ["permission/allow"]

[[mappings]]
event = "PreToolUse"
rule = "tool"
action_flow = ["ai/review"]
critical = true
"#,
        );
        let response = pipeline.handle("PreToolUse", &bash("ls")).await;
        assert_eq!(response.permission_decision(), Some(PermissionDecision::Deny));
    }

    #[tokio::test]
    async fn test_non_critical_abort_keeps_others() {
        let pipeline = pipeline(
            r#"
[[mappings]]
event = "UserPromptSubmit"
rule = "prompt"
action_flow = ["context/first", "ai/review"]

[[mappings]]
event = "UserPromptSubmit"
rule = "prompt"
action_flow = ["context/second"]
"#,
        );
        let payload = json!({
            "session_id": "s1", "transcript_path": "/t", "cwd": "/w", "prompt": "hi"
        });
        let response = pipeline.handle("UserPromptSubmit", &payload).await;
        assert_eq!(
            response.hook_specific_output.unwrap().additional_context.as_deref(),
            Some("first\n\nsecond")
        );
    }

    #[tokio::test]
    async fn test_duplicates_run_once() {
        let pipeline = pipeline(
            r#"
[[mappings]]
event = "SessionStart"
rule = "session"
action_flow = ["context/welcome"]

[[mappings]]
event = "SessionStart"
rule = "session"
action_flow = ["context/welcome"]
"#,
        );
        let payload = json!({
            "session_id": "s1", "transcript_path": "/t", "cwd": "/w", "source": "startup"
        });
        let event = normalize_labeled("SessionStart", &payload).unwrap();
        let reports = pipeline.execute(&event).await.unwrap();
        assert_eq!(reports.len(), 1);
    }
}
