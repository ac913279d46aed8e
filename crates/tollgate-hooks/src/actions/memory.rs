//! `memory/record` and `memory/recall`: the durable record log
//!
//! `record` appends one JSON record per event; a failed write is logged and
//! the flow carries on. `recall` injects the latest records of the session
//! as context.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tollgate_storage::RecordLog;
use tracing::{debug, warn};

use super::{parse_param, Action, ActionContext, ActionFamily, Capability};
use crate::{error::Result, events::Event, executor::Outcome, response::PartialResponse};

const DEFAULT_RECALL: usize = 5;
const SUMMARY_CHARS: usize = 200;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum MemoryParams {
    Record {
        #[serde(default)]
        tags: Vec<String>,
    },
    Recall {
        #[serde(default = "default_recall")]
        limit: usize,
    },
}

fn default_recall() -> usize {
    DEFAULT_RECALL
}

/// Record and recall events
#[derive(Debug, Default)]
pub struct MemoryCapability;

impl Capability for MemoryCapability {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn family(&self) -> ActionFamily {
        ActionFamily::Record
    }

    fn description(&self) -> &'static str {
        "Append events to the durable record log, or recall recent ones"
    }

    fn prepare(&self, parameter: &str) -> std::result::Result<Box<dyn Action>, String> {
        let params = parse_param(parameter, |word| match word {
            "" | "record" => Ok(MemoryParams::Record { tags: Vec::new() }),
            "recall" => Ok(MemoryParams::Recall {
                limit: DEFAULT_RECALL,
            }),
            other => Err(format!("unknown memory operation '{}'", other)),
        })?;
        Ok(Box::new(MemoryAction { params }))
    }
}

struct MemoryAction {
    params: MemoryParams,
}

/// The record written for `event`
pub fn record_for(event: &Event, tags: &[String], now: chrono::DateTime<chrono::Utc>) -> Value {
    let summary = event
        .text()
        .or_else(|| event.file_path())
        .map(|text| text.chars().take(SUMMARY_CHARS).collect::<String>())
        .unwrap_or_else(|| event.kind().to_string());

    json!({
        "id": uuid::Uuid::new_v4().to_string(),
        "timestamp": now.to_rfc3339(),
        "session_id": event.session_id(),
        "kind": event.kind().as_str(),
        "tool_name": event.tool_name(),
        "summary": summary,
        "tags": tags,
    })
}

#[async_trait]
impl Action for MemoryAction {
    async fn run(&self, event: &Event, mut response: PartialResponse, ctx: &ActionContext) -> Result<Outcome> {
        match &self.params {
            MemoryParams::Record { tags } => {
                let now = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(ctx.clock.now_ms())
                    .unwrap_or_else(chrono::Utc::now);
                let record = record_for(event, tags, now);
                match ctx.records.append(&record) {
                    Ok(()) => debug!(mapping = %ctx.mapping_id, "Recorded event"),
                    Err(e) => warn!(mapping = %ctx.mapping_id, error = %e, "Failed to record event"),
                }
            }
            MemoryParams::Recall { limit } => {
                let records = match ctx.records.read_all() {
                    Ok(records) => records,
                    Err(e) => {
                        warn!(mapping = %ctx.mapping_id, error = %e, "Failed to read records");
                        Vec::new()
                    }
                };
                let session = event.session_id();
                let recent: Vec<&Value> = records
                    .iter()
                    .rev()
                    .filter(|r| r.get("session_id").and_then(Value::as_str) == Some(session))
                    .take(*limit)
                    .collect();

                if !recent.is_empty() {
                    let lines: Vec<String> = recent
                        .iter()
                        .rev()
                        .map(|r| {
                            format!(
                                "- [{}] {}",
                                r.get("kind").and_then(Value::as_str).unwrap_or("?"),
                                r.get("summary").and_then(Value::as_str).unwrap_or("")
                            )
                        })
                        .collect();
                    response.push_context(format!("Recent activity in this session:\n{}", lines.join("\n")));
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
    use std::sync::Arc;
    use tollgate_storage::{StorageError, StorageResult};

    struct BrokenLog;

    impl RecordLog for BrokenLog {
        fn append(&self, _record: &Value) -> StorageResult<()> {
            Err(StorageError::lock("records.jsonl", "disk on fire"))
        }

        fn read_all(&self) -> StorageResult<Vec<Value>> {
            Err(StorageError::lock("records.jsonl", "disk on fire"))
        }
    }

    fn prompt(session: &str, text: &str) -> Event {
        normalize(
            EventKind::UserPromptSubmit,
            &json!({"session_id": session, "transcript_path": "/t", "cwd": "/", "prompt": text}),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_record_then_recall() {
        let ctx = ActionContext::in_memory();
        let record = MemoryCapability.prepare(r#"{"op": "record", "tags": ["prompt"]}"#).unwrap();
        let recall = MemoryCapability.prepare("recall").unwrap();

        record.run(&prompt("a", "first"), PartialResponse::new(), &ctx).await.unwrap();
        record.run(&prompt("b", "elsewhere"), PartialResponse::new(), &ctx).await.unwrap();
        record.run(&prompt("a", "second"), PartialResponse::new(), &ctx).await.unwrap();

        let stored = ctx.records.read_all().unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[0]["tags"], json!(["prompt"]));
        assert_eq!(stored[0]["kind"], "UserPromptSubmit");

        let Outcome::Continue(response) = recall
            .run(&prompt("a", "third"), PartialResponse::new(), &ctx)
            .await
            .unwrap()
        else {
            panic!("expected Continue");
        };
        assert_eq!(
            response.additional_context,
            vec!["Recent activity in this session:\n- [UserPromptSubmit] first\n- [UserPromptSubmit] second".to_string()]
        );
    }

    #[tokio::test]
    async fn test_write_failure_continues() {
        let mut ctx = ActionContext::in_memory();
        ctx.records = Arc::new(BrokenLog);
        let record = MemoryCapability.prepare("record").unwrap();
        let outcome = record.run(&prompt("a", "x"), PartialResponse::new(), &ctx).await.unwrap();
        assert_eq!(outcome, Outcome::Continue(PartialResponse::new()));
    }

    #[test]
    fn test_unknown_operation() {
        assert!(MemoryCapability.prepare("forget").is_err());
    }
}
