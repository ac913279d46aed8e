//! `analysis/<prompt|impact|session>`: summaries appended as context

use async_trait::async_trait;
use serde_json::Value;
use tollgate_storage::RecordLog;

use super::{Action, ActionContext, ActionFamily, Capability};
use crate::{error::Result, events::Event, executor::Outcome, response::PartialResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Analysis {
    Prompt,
    Impact,
    Session,
}

const INTENTS: &[(&str, &[&str])] = &[
    ("debugging", &["fix", "bug", "error", "crash", "broken", "fail"]),
    ("testing", &["test", "spec", "coverage"]),
    ("refactoring", &["refactor", "clean up", "cleanup", "rename", "simplify"]),
    ("feature", &["add", "implement", "create", "build", "support"]),
    ("question", &["what", "why", "how", "explain", "?"]),
];

const RISK_MARKERS: &[(&str, &str)] = &[
    ("rm -rf", "recursive delete"),
    ("sudo ", "elevated privileges"),
    ("--force", "forced operation"),
    ("chmod 777", "world-writable permissions"),
    ("| sh", "piped shell execution"),
    ("| bash", "piped shell execution"),
    ("> /dev/", "writes to a device"),
    ("drop table", "destructive SQL"),
];

const SENSITIVE_PATHS: &[(&str, &str)] = &[
    (".env", "environment secrets"),
    ("/etc/", "system configuration"),
    ("Cargo.toml", "dependency manifest"),
    ("package.json", "dependency manifest"),
    ("migrations/", "database migration"),
    (".github/workflows", "CI pipeline"),
];

/// Lightweight heuristics over the event
#[derive(Debug, Default)]
pub struct AnalysisCapability;

impl Capability for AnalysisCapability {
    fn name(&self) -> &'static str {
        "analysis"
    }

    fn family(&self) -> ActionFamily {
        ActionFamily::Analysis
    }

    fn description(&self) -> &'static str {
        "Summarize prompt intent, change impact, or session history"
    }

    fn prepare(&self, parameter: &str) -> std::result::Result<Box<dyn Action>, String> {
        let analysis = match parameter.trim() {
            "" | "prompt" => Analysis::Prompt,
            "impact" => Analysis::Impact,
            "session" => Analysis::Session,
            other => return Err(format!("unknown analysis '{}'", other)),
        };
        Ok(Box::new(AnalysisAction { analysis }))
    }
}

struct AnalysisAction {
    analysis: Analysis,
}

fn analyze_prompt(prompt: &str) -> String {
    let lowered = prompt.to_lowercase();
    let words = prompt.split_whitespace().count();

    let intents: Vec<&str> = INTENTS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(intent, _)| *intent)
        .collect();
    let intent = if intents.is_empty() {
        "general".to_string()
    } else {
        intents.join(", ")
    };

    let has_code = prompt.contains("```")
        || ["fn ", "def ", "class ", "=>", "();", "#include"]
            .iter()
            .any(|marker| prompt.contains(marker));

    format!(
        "Prompt analysis: {} word(s); intent: {}; contains code: {}",
        words,
        intent,
        if has_code { "yes" } else { "no" }
    )
}

fn analyze_impact(event: &Event) -> Option<String> {
    let tool = event.tool_name()?;
    let mut markers: Vec<&str> = Vec::new();

    if let Some(command) = event.command() {
        let lowered = command.to_lowercase();
        markers.extend(
            RISK_MARKERS
                .iter()
                .filter(|(needle, _)| lowered.contains(needle))
                .map(|(_, label)| *label),
        );
    }
    if let Some(path) = event.file_path() {
        markers.extend(
            SENSITIVE_PATHS
                .iter()
                .filter(|(needle, _)| path.contains(needle))
                .map(|(_, label)| *label),
        );
    }
    markers.dedup();

    let level = match markers.len() {
        0 => "low",
        1 => "medium",
        _ => "high",
    };
    let detail = if markers.is_empty() {
        String::new()
    } else {
        format!(" ({})", markers.join(", "))
    };
    Some(format!("Impact of {}: {}{}", tool, level, detail))
}

fn analyze_session(event: &Event, ctx: &ActionContext) -> String {
    let session = event.session_id();
    let records = match ctx.records.read_all() {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!(error = %e, "Could not read records for session analysis");
            Vec::new()
        }
    };
    let in_session: Vec<&Value> = records
        .iter()
        .filter(|r| r.get("session_id").and_then(Value::as_str) == Some(session))
        .collect();

    let mut tools: Vec<&str> = in_session
        .iter()
        .filter_map(|r| r.get("tool_name").and_then(Value::as_str))
        .collect();
    tools.sort_unstable();
    tools.dedup();

    format!(
        "Session {} in {}: {} recorded event(s){}",
        session,
        event.common().cwd,
        in_session.len(),
        if tools.is_empty() {
            String::new()
        } else {
            format!("; tools used: {}", tools.join(", "))
        }
    )
}

#[async_trait]
impl Action for AnalysisAction {
    async fn run(&self, event: &Event, mut response: PartialResponse, ctx: &ActionContext) -> Result<Outcome> {
        let summary = match self.analysis {
            Analysis::Prompt => event.prompt().or_else(|| event.text()).map(analyze_prompt),
            Analysis::Impact => analyze_impact(event),
            Analysis::Session => Some(analyze_session(event, ctx)),
        };

        if let Some(summary) = summary {
            response.push_context(summary);
        }
        Ok(Outcome::Continue(response))
    }
}
