//! Rule catalog
//!
//! A rule is a named predicate over an event together with the set of
//! fields a mapping's condition may read when it uses that rule.

use std::{collections::BTreeMap, sync::Arc};

use crate::events::{Event, EventData, EventKind};

/// Fields every rule exposes
pub const COMMON_FIELDS: &[&str] = &["kind", "session_id", "transcript_path", "cwd", "permission_mode"];

/// Named predicate over whitelisted event fields
pub trait Rule: Send + Sync {
    /// Rule name as referenced by mappings
    fn name(&self) -> &str;

    /// One-line description for listings
    fn description(&self) -> &str;

    /// Whether a condition under this rule may read `field`
    fn exposes(&self, field: &str) -> bool;

    /// Whether the event passes the rule
    fn applies(&self, event: &Event) -> bool;
}

/// Rule defined by a predicate function and a static field whitelist
pub struct BuiltinRule {
    name: &'static str,
    description: &'static str,
    fields: &'static [&'static str],
    prefixes: &'static [&'static str],
    predicate: fn(&Event) -> bool,
}

impl BuiltinRule {
    pub const fn new(
        name: &'static str,
        description: &'static str,
        fields: &'static [&'static str],
        prefixes: &'static [&'static str],
        predicate: fn(&Event) -> bool,
    ) -> Self {
        Self {
            name,
            description,
            fields,
            prefixes,
            predicate,
        }
    }
}

impl Rule for BuiltinRule {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn exposes(&self, field: &str) -> bool {
        COMMON_FIELDS.contains(&field)
            || self.fields.contains(&field)
            || self.prefixes.iter().any(|prefix| field.starts_with(prefix))
    }

    fn applies(&self, event: &Event) -> bool {
        (self.predicate)(event)
    }
}

const FILE_EDIT_TOOLS: &[&str] = &["Edit", "Write", "MultiEdit", "NotebookEdit"];
const TOOL_INPUT: &[&str] = &["tool_input.", "tool_response."];

fn builtin_rules() -> Vec<BuiltinRule> {
    vec![
        BuiltinRule::new("always", "Every event of the mapped kind", &[], &[], |_| true),
        BuiltinRule::new(
            "tool",
            "Any tool invocation",
            &["tool_name", "tool_input", "tool_response", "tool_use_id", "command", "file_path", "error", "text"],
            TOOL_INPUT,
            |event| event.tool_name().is_some(),
        ),
        BuiltinRule::new(
            "bash",
            "Bash tool calls that carry a command",
            &["tool_name", "command", "tool_input", "text"],
            TOOL_INPUT,
            |event| event.tool_name() == Some("Bash") && event.command().is_some(),
        ),
        BuiltinRule::new(
            "file_edit",
            "Edit, Write, MultiEdit and NotebookEdit tool calls",
            &["tool_name", "file_path", "tool_input"],
            TOOL_INPUT,
            |event| {
                event
                    .tool_name()
                    .map(|name| FILE_EDIT_TOOLS.contains(&name))
                    .unwrap_or(false)
            },
        ),
        BuiltinRule::new(
            "prompt",
            "Submitted user prompts",
            &["prompt", "text"],
            &[],
            |event| event.prompt().is_some(),
        ),
        BuiltinRule::new(
            "keyword",
            "Events that carry free text",
            &["text", "prompt", "message", "command"],
            &[],
            |event| event.text().is_some(),
        ),
        BuiltinRule::new(
            "session",
            "Session start and end",
            &["source", "reason"],
            &[],
            |event| matches!(event.kind(), EventKind::SessionStart | EventKind::SessionEnd),
        ),
        BuiltinRule::new(
            "subagent",
            "Subagent start and stop",
            &["subagent_type", "task_description", "stop_hook_active"],
            &[],
            |event| matches!(event.kind(), EventKind::SubagentStart | EventKind::SubagentStop),
        ),
        BuiltinRule::new(
            "notification",
            "Runtime notifications",
            &["message", "notification_type"],
            &[],
            |event| matches!(event.data(), EventData::Notification { .. }),
        ),
        BuiltinRule::new(
            "compact",
            "Context compaction",
            &["trigger", "custom_instructions"],
            &[],
            |event| event.kind() == EventKind::PreCompact,
        ),
    ]
}

/// Registry of rules by name
#[derive(Clone, Default)]
pub struct RuleCatalog {
    rules: BTreeMap<String, Arc<dyn Rule>>,
}

impl RuleCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding the built-in rules
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        for rule in builtin_rules() {
            catalog.register(Arc::new(rule));
        }
        catalog
    }

    /// Register a rule, replacing any rule of the same name
    pub fn register(&mut self, rule: Arc<dyn Rule>) {
        self.rules.insert(rule.name().to_string(), rule);
    }

    /// Look up a rule
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Rule>> {
        self.rules.get(name)
    }

    /// Rule names in sorted order
    pub fn names(&self) -> Vec<&str> {
        self.rules.keys().map(String::as_str).collect()
    }

    /// All rules in name order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Rule>> {
        self.rules.values()
    }
}

impl std::fmt::Debug for RuleCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleCatalog")
            .field("rules", &self.names())
            .finish()
    }
}
