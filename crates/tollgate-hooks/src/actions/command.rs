//! `command/<rewrite>`: deterministic rewriting of unsafe commands
//!
//! A rewrite prefixes a tool-input field when it matches a pattern, e.g.
//! `rm -rf /tmp/x` becomes `trash rm -rf /tmp/x`. Rewriting is idempotent:
//! a value that already carries the prefix is left alone.

use std::collections::BTreeMap;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::{Action, ActionContext, ActionFamily, Capability};
use crate::{
    config::RewriteRule, error::Result, events::Event, executor::Outcome, response::PartialResponse,
};

/// A compiled rewrite rule
#[derive(Debug, Clone)]
pub struct Rewrite {
    name: String,
    field: String,
    pattern: Regex,
    prefix: String,
}

impl Rewrite {
    pub fn compile(rule: &RewriteRule) -> std::result::Result<Self, regex::Error> {
        Ok(Self {
            name: rule.name.clone(),
            field: rule.field.clone(),
            pattern: Regex::new(&rule.pattern)?,
            prefix: rule.prefix.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Rewritten value, or `None` when `value` is left as is
    pub fn apply(&self, value: &str) -> Option<String> {
        let value = value.trim_start();
        if value.starts_with(self.prefix.trim_start()) || !self.pattern.is_match(value) {
            return None;
        }
        Some(format!("{}{}", self.prefix.trim_start(), value))
    }

    /// `value` after the rewrite, changed or not
    pub fn rewrite(&self, value: &str) -> String {
        self.apply(value).unwrap_or_else(|| value.to_string())
    }
}

/// Rewrites unsafe tool input
#[derive(Debug, Clone, Default)]
pub struct CommandCapability {
    rewrites: BTreeMap<String, Rewrite>,
}

impl CommandCapability {
    /// Build from rewrite rules; rules with invalid patterns are skipped
    /// here because settings validation already rejects them
    pub fn new(rules: &[RewriteRule]) -> Self {
        let rewrites = rules
            .iter()
            .filter_map(|rule| Rewrite::compile(rule).ok())
            .map(|rewrite| (rewrite.name.clone(), rewrite))
            .collect();
        Self { rewrites }
    }

    pub fn rewrite_names(&self) -> Vec<&str> {
        self.rewrites.keys().map(String::as_str).collect()
    }
}

impl Capability for CommandCapability {
    fn name(&self) -> &'static str {
        "command"
    }

    fn family(&self) -> ActionFamily {
        ActionFamily::CommandRewrite
    }

    fn description(&self) -> &'static str {
        "Rewrite tool input that matches an unsafe pattern"
    }

    fn prepare(&self, parameter: &str) -> std::result::Result<Box<dyn Action>, String> {
        let name = parameter.trim();
        let rewrite = self.rewrites.get(name).ok_or_else(|| {
            format!(
                "unknown rewrite '{}' (known: {})",
                name,
                self.rewrite_names().join(", ")
            )
        })?;
        Ok(Box::new(CommandAction {
            rewrite: rewrite.clone(),
        }))
    }
}

struct CommandAction {
    rewrite: Rewrite,
}

#[async_trait]
impl Action for CommandAction {
    async fn run(&self, event: &Event, mut response: PartialResponse, _ctx: &ActionContext) -> Result<Outcome> {
        let Some(tool_input) = event.tool_input() else {
            return Ok(Outcome::Continue(response));
        };

        // Earlier rewrites in the same flow take precedence over the raw input
        let mut input = response
            .updated_input
            .take()
            .unwrap_or_else(|| tool_input.clone());
        let changed = match input.get(&self.rewrite.field).and_then(Value::as_str) {
            Some(current) => self.rewrite.apply(current),
            None => None,
        };

        match changed {
            Some(rewritten) => {
                debug!(rewrite = %self.rewrite.name, field = %self.rewrite.field, "Rewrote tool input");
                input.insert(self.rewrite.field.clone(), Value::String(rewritten));
                response.updated_input = Some(input);
            }
            None => {
                if input != *tool_input {
                    response.updated_input = Some(input);
                }
            }
        }

        Ok(Outcome::Continue(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{normalize, EventKind};
    use serde_json::json;

    fn bash(command: &str) -> Event {
        normalize(
            EventKind::PreToolUse,
            &json!({
                "session_id": "s", "transcript_path": "/t", "cwd": "/",
                "tool_name": "Bash",
                "tool_input": {"command": command, "description": "cleanup"}
            }),
        )
        .unwrap()
    }

    fn trash() -> Rewrite {
        Rewrite::compile(&RewriteRule::trash()).unwrap()
    }

    #[test]
    fn test_trash_rewrite_is_idempotent() {
        let once = trash().rewrite("rm -rf /tmp/x");
        assert_eq!(once, "trash rm -rf /tmp/x");
        assert_eq!(trash().rewrite(&once), once);
        assert!(trash().apply(&once).is_none());
    }

    #[test]
    fn test_padded_prefix_applies_once() {
        let rewrite = Rewrite::compile(&RewriteRule {
            name: "echo".into(),
            field: "command".into(),
            pattern: r"rm\s".into(),
            prefix: " echo ".into(),
        })
        .unwrap();
        let once = rewrite.rewrite("rm -rf /tmp/x");
        assert_eq!(once, "echo rm -rf /tmp/x");
        assert_eq!(rewrite.rewrite(&once), once);
    }

    #[test]
    fn test_non_matching_commands_are_untouched() {
        assert!(trash().apply("ls -la").is_none());
        assert!(trash().apply("git rm --cached x").is_none());
        assert!(trash().apply("rmdir x").is_none());
    }

    #[tokio::test]
    async fn test_action_sets_full_updated_input() {
        let capability = CommandCapability::new(&[RewriteRule::trash()]);
        let action = capability.prepare("trash").unwrap();
        let outcome = action
            .run(&bash("rm -rf /tmp/test.txt"), PartialResponse::new(), &ActionContext::in_memory())
            .await
            .unwrap();

        let Outcome::Continue(response) = outcome else {
            panic!("expected Continue");
        };
        let input = response.updated_input.unwrap();
        assert_eq!(input["command"], "trash rm -rf /tmp/test.txt");
        assert_eq!(input["description"], "cleanup");
    }

    #[tokio::test]
    async fn test_action_leaves_safe_command_alone() {
        let capability = CommandCapability::new(&[RewriteRule::trash()]);
        let action = capability.prepare("trash").unwrap();
        let outcome = action
            .run(&bash("ls"), PartialResponse::new(), &ActionContext::in_memory())
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Continue(PartialResponse::new()));
    }

    #[test]
    fn test_unknown_rewrite() {
        let capability = CommandCapability::new(&[RewriteRule::trash()]);
        let err = capability.prepare("shred").err().unwrap();
        assert!(err.contains("trash"));
    }
}
