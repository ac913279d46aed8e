//! `ai/<task>`: an opaque, timeout-bounded call to an external model
//!
//! The configured `[ai] command` receives `{"task": .., "event": ..}` on
//! stdin. Its trimmed stdout becomes additional context. The contribution is
//! all-or-nothing: any failure aborts the mapping and leaves the response as
//! it was.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use super::{
    process::{run_bounded, ProcessError},
    Action, ActionContext, ActionFamily, Capability,
};
use crate::{error::Result, events::Event, executor::Outcome, response::PartialResponse};

/// Delegates a task to the configured AI command
#[derive(Debug, Default)]
pub struct AiCapability;

impl Capability for AiCapability {
    fn name(&self) -> &'static str {
        "ai"
    }

    fn family(&self) -> ActionFamily {
        ActionFamily::Ai
    }

    fn description(&self) -> &'static str {
        "Run the configured AI command for a task and inject its answer"
    }

    fn prepare(&self, parameter: &str) -> std::result::Result<Box<dyn Action>, String> {
        let task = parameter.trim();
        if task.is_empty() {
            return Err("ai needs a task name".to_string());
        }
        if task.chars().any(char::is_whitespace) {
            return Err(format!("task name '{}' must be a single word", task));
        }
        Ok(Box::new(AiAction {
            task: task.to_string(),
        }))
    }
}

struct AiAction {
    task: String,
}

#[async_trait]
impl Action for AiAction {
    async fn run(&self, event: &Event, mut response: PartialResponse, ctx: &ActionContext) -> Result<Outcome> {
        let argv = &ctx.settings.ai.command;
        if argv.is_empty() {
            return Ok(Outcome::abort("no ai command configured"));
        }

        let payload = serde_json::to_vec(&json!({
            "task": self.task,
            "event": event.to_json(),
        }))?;
        let timeout = Duration::from_millis(ctx.settings.timeouts.ai_ms);

        let output = match run_bounded(argv, Some(&payload), timeout).await {
            Ok(output) => output,
            Err(ProcessError::Timeout(ms)) => {
                warn!(mapping = %ctx.mapping_id, task = %self.task, timeout_ms = ms, "AI call timed out");
                return Ok(Outcome::abort(format!("ai task '{}' timed out after {}ms", self.task, ms)));
            }
            Err(e) => {
                warn!(mapping = %ctx.mapping_id, task = %self.task, error = %e, "AI call failed");
                return Ok(Outcome::abort(format!("ai task '{}' failed: {}", self.task, e)));
            }
        };

        if !output.success {
            warn!(
                mapping = %ctx.mapping_id,
                task = %self.task,
                code = ?output.code,
                stderr = %output.stderr.trim(),
                "AI command exited with an error"
            );
            return Ok(Outcome::abort(format!(
                "ai task '{}' exited with {}",
                self.task,
                output.code.map_or_else(|| "a signal".to_string(), |c| format!("code {}", c))
            )));
        }

        let answer = output.stdout.trim();
        debug!(mapping = %ctx.mapping_id, task = %self.task, bytes = answer.len(), "AI call finished");
        response.push_context(answer.to_string());
        Ok(Outcome::Continue(response))
    }
}
