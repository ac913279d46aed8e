//! `quality/<secrets|todo|size|all>`: read-only content checks
//!
//! Scans the text a tool call is about to write or run (`content`,
//! `new_string`, `command`, and each `edits[].new_string`) and appends
//! findings to additionalContext. Never touches the permission decision.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::{parse_param, Action, ActionContext, ActionFamily, Capability};
use crate::{error::Result, events::Event, executor::Outcome, response::PartialResponse};

const DEFAULT_MAX_LINES: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Check {
    Secrets,
    Todo,
    Size,
    All,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct QualityParams {
    check: Check,
    #[serde(default = "default_max_lines")]
    max_lines: usize,
}

fn default_max_lines() -> usize {
    DEFAULT_MAX_LINES
}

/// Content checks on tool input
#[derive(Debug, Default)]
pub struct QualityCapability;

impl Capability for QualityCapability {
    fn name(&self) -> &'static str {
        "quality"
    }

    fn family(&self) -> ActionFamily {
        ActionFamily::Quality
    }

    fn description(&self) -> &'static str {
        "Scan written content for secrets, TODO markers and oversized files"
    }

    fn prepare(&self, parameter: &str) -> std::result::Result<Box<dyn Action>, String> {
        let params: QualityParams = parse_param(parameter, |word| {
            let check = match word {
                "secrets" => Check::Secrets,
                "todo" => Check::Todo,
                "size" => Check::Size,
                "" | "all" | "lint" => Check::All,
                other => return Err(format!("unknown quality check '{}'", other)),
            };
            Ok(QualityParams {
                check,
                max_lines: DEFAULT_MAX_LINES,
            })
        })?;

        let secret_patterns = [
            ("AWS access key", r"\bAKIA[0-9A-Z]{16}\b"),
            ("private key", r"-----BEGIN (?:RSA |EC |DSA |OPENSSH )?PRIVATE KEY-----"),
            (
                "hard-coded credential",
                r#"(?i)\b(?:api[_-]?key|secret|password|passwd|token)\b\s*[:=]\s*["'][^"'\s]{8,}["']"#,
            ),
        ]
        .into_iter()
        .map(|(label, pattern)| {
            Regex::new(pattern)
                .map(|regex| (label, regex))
                .map_err(|e| e.to_string())
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Box::new(QualityAction {
            params,
            secret_patterns,
        }))
    }
}

struct QualityAction {
    params: QualityParams,
    secret_patterns: Vec<(&'static str, Regex)>,
}

impl QualityAction {
    fn wants(&self, check: Check) -> bool {
        self.params.check == Check::All || self.params.check == check
    }

    fn findings(&self, texts: &[&str]) -> Vec<String> {
        let mut findings = Vec::new();

        if self.wants(Check::Secrets) {
            for (label, regex) in &self.secret_patterns {
                if texts.iter().any(|text| regex.is_match(text)) {
                    findings.push(format!("possible {} in written content", label));
                }
            }
        }

        if self.wants(Check::Todo) {
            let markers = texts
                .iter()
                .flat_map(|text| text.lines())
                .filter(|line| ["TODO", "FIXME", "XXX"].iter().any(|m| line.contains(m)))
                .count();
            if markers > 0 {
                findings.push(format!("{} TODO/FIXME marker(s) added", markers));
            }
        }

        if self.wants(Check::Size) {
            let lines: usize = texts.iter().map(|text| text.lines().count()).sum();
            if lines > self.params.max_lines {
                findings.push(format!(
                    "{} lines written at once (limit {})",
                    lines, self.params.max_lines
                ));
            }
        }

        findings
    }
}

/// Text the tool call will write or run
fn scanned_texts(event: &Event) -> Vec<&str> {
    let Some(input) = event.tool_input() else {
        return Vec::new();
    };

    let mut texts: Vec<&str> = ["content", "new_string", "new_source", "command"]
        .iter()
        .filter_map(|key| input.get(*key).and_then(Value::as_str))
        .collect();

    if let Some(edits) = input.get("edits").and_then(Value::as_array) {
        texts.extend(
            edits
                .iter()
                .filter_map(|edit| edit.get("new_string").and_then(Value::as_str)),
        );
    }

    texts
}

#[async_trait]
impl Action for QualityAction {
    async fn run(&self, event: &Event, mut response: PartialResponse, _ctx: &ActionContext) -> Result<Outcome> {
        let texts = scanned_texts(event);
        let findings = self.findings(&texts);

        if !findings.is_empty() {
            let target = event.file_path().unwrap_or("tool input");
            let body: Vec<String> = findings.iter().map(|f| format!("- {}", f)).collect();
            response.push_context(format!("Quality findings for {}:\n{}", target, body.join("\n")));
        }

        Ok(Outcome::Continue(response))
    }
}
