//! `utility/...`: small helpers for flows
//!
//! - `delay`: sleeps `ms` (at most [`MAX_DELAY_MS`]) before the next action
//! - `timestamp`: adds the current time as context
//! - `uuid`: adds `count` fresh v4 identifiers as context
//! - `health_check`: aborts with `unhealthy` when the state store or the
//!   record log cannot be used

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tollgate_storage::update_as;
use tracing::{debug, warn};

use super::{parse_param, Action, ActionContext, ActionFamily, Capability};
use crate::{error::Result, events::Event, executor::Outcome, response::PartialResponse};

pub const MAX_DELAY_MS: u64 = 10_000;
pub const MAX_UUIDS: usize = 100;

const HEALTH_KEY: &str = "utility:health_check";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TimeFormat {
    #[default]
    Iso,
    Unix,
    Human,
    Date,
    Time,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum UtilityParams {
    Delay {
        ms: u64,
    },
    Timestamp {
        #[serde(default)]
        format: TimeFormat,
    },
    Uuid {
        #[serde(default = "default_count")]
        count: usize,
    },
    HealthCheck,
}

fn default_count() -> usize {
    1
}

/// Delays, timestamps, identifiers and store health checks
#[derive(Debug, Default)]
pub struct UtilityCapability;

impl Capability for UtilityCapability {
    fn name(&self) -> &'static str {
        "utility"
    }

    fn family(&self) -> ActionFamily {
        ActionFamily::Utility
    }

    fn description(&self) -> &'static str {
        "Delay the flow, add a timestamp or identifiers, or check store health"
    }

    fn prepare(&self, parameter: &str) -> std::result::Result<Box<dyn Action>, String> {
        let params = parse_param(parameter, |word| match word {
            "timestamp" => Ok(UtilityParams::Timestamp {
                format: TimeFormat::Iso,
            }),
            "uuid" => Ok(UtilityParams::Uuid { count: 1 }),
            "health_check" => Ok(UtilityParams::HealthCheck),
            "delay" => Err("delay needs a JSON parameter with 'ms'".to_string()),
            other => Err(format!("unknown utility operation '{}'", other)),
        })?;

        match &params {
            UtilityParams::Delay { ms } if *ms > MAX_DELAY_MS => {
                return Err(format!("delay of {}ms exceeds {}ms", ms, MAX_DELAY_MS));
            }
            UtilityParams::Uuid { count } if *count == 0 || *count > MAX_UUIDS => {
                return Err(format!("uuid count must be between 1 and {}", MAX_UUIDS));
            }
            _ => {}
        }
        Ok(Box::new(UtilityAction { params }))
    }
}

struct UtilityAction {
    params: UtilityParams,
}

fn format_time(now_ms: i64, format: TimeFormat) -> String {
    let Some(time) = DateTime::<Utc>::from_timestamp_millis(now_ms) else {
        return now_ms.to_string();
    };
    match format {
        TimeFormat::Iso => time.to_rfc3339(),
        TimeFormat::Unix => time.timestamp().to_string(),
        TimeFormat::Human => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        TimeFormat::Date => time.format("%Y-%m-%d").to_string(),
        TimeFormat::Time => time.format("%H:%M:%S").to_string(),
    }
}

#[async_trait]
impl Action for UtilityAction {
    async fn run(&self, _event: &Event, mut response: PartialResponse, ctx: &ActionContext) -> Result<Outcome> {
        match &self.params {
            UtilityParams::Delay { ms } => {
                debug!(ms, "Delaying flow");
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            UtilityParams::Timestamp { format } => {
                let now = format_time(ctx.clock.now_ms(), *format);
                response.push_context(format!("Current time (UTC): {}", now));
            }
            UtilityParams::Uuid { count } => {
                let ids: Vec<String> = (0..*count).map(|_| uuid::Uuid::new_v4().to_string()).collect();
                response.push_context(format!("Generated id: {}", ids.join(", ")));
            }
            UtilityParams::HealthCheck => {
                let now = ctx.clock.now_ms();
                if let Err(e) = update_as(&*ctx.state, HEALTH_KEY, |last: &mut i64| *last = now) {
                    warn!(error = %e, "State store failed health check");
                    return Ok(Outcome::abort("unhealthy: state store"));
                }
                if let Err(e) = ctx.records.read_all() {
                    warn!(error = %e, "Record log failed health check");
                    return Ok(Outcome::abort("unhealthy: record log"));
                }
                debug!("Stores healthy");
            }
        }
        Ok(Outcome::Continue(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        actions::ManualClock,
        events::{normalize, EventKind},
    };
    use serde_json::json;
    use std::sync::Arc;
    use tollgate_storage::{get_as, FileStateStore};

    fn stop() -> Event {
        normalize(
            EventKind::Stop,
            &json!({"session_id": "s", "transcript_path": "/t", "cwd": "/"}),
        )
        .unwrap()
    }

    async fn context_after(parameter: &str, ctx: &ActionContext) -> Vec<String> {
        let action = UtilityCapability.prepare(parameter).unwrap();
        match action.run(&stop(), PartialResponse::new(), ctx).await.unwrap() {
            Outcome::Continue(response) => response.additional_context,
            other => panic!("Expected continue, got {:?}", other),
        }
    }

    #[test]
    fn test_format_time() {
        let ms = 1_700_000_000_123;
        assert_eq!(format_time(ms, TimeFormat::Iso), "2023-11-14T22:13:20.123+00:00");
        assert_eq!(format_time(ms, TimeFormat::Unix), "1700000000");
        assert_eq!(format_time(ms, TimeFormat::Human), "2023-11-14 22:13:20");
        assert_eq!(format_time(ms, TimeFormat::Date), "2023-11-14");
        assert_eq!(format_time(ms, TimeFormat::Time), "22:13:20");
    }

    #[tokio::test]
    async fn test_timestamp_uses_context_clock() {
        let mut ctx = ActionContext::in_memory();
        ctx.clock = Arc::new(ManualClock::new(0));
        let context = context_after(r#"{"op": "timestamp", "format": "human"}"#, &ctx).await;
        assert_eq!(context, vec!["Current time (UTC): 1970-01-01 00:00:00".to_string()]);
    }

    #[tokio::test]
    async fn test_uuid_count() {
        let ctx = ActionContext::in_memory();
        let context = context_after(r#"{"op": "uuid", "count": 3}"#, &ctx).await;
        assert_eq!(context.len(), 1);
        let ids: Vec<&str> = context[0].trim_start_matches("Generated id: ").split(", ").collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.iter().all(|id| uuid::Uuid::parse_str(id).is_ok()));
        assert_ne!(ids[0], ids[1]);
    }

    #[tokio::test]
    async fn test_delay_continues() {
        let ctx = ActionContext::in_memory();
        let context = context_after(r#"{"op": "delay", "ms": 5}"#, &ctx).await;
        assert!(context.is_empty());
    }

    #[tokio::test]
    async fn test_health_check() {
        let mut ctx = ActionContext::in_memory();
        ctx.clock = Arc::new(ManualClock::new(42));
        assert!(context_after("health_check", &ctx).await.is_empty());
        assert_eq!(get_as::<i64>(&*ctx.state, HEALTH_KEY).unwrap(), Some(42));

        // A store rooted under a regular file cannot be written
        let dir = tempfile::TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        ctx.state = Arc::new(FileStateStore::new(blocker.join("state")));

        let action = UtilityCapability.prepare("health_check").unwrap();
        let outcome = action.run(&stop(), PartialResponse::new(), &ctx).await.unwrap();
        assert_eq!(outcome, Outcome::abort("unhealthy: state store"));
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(UtilityCapability.prepare("delay").is_err());
        assert!(UtilityCapability.prepare("sleep").is_err());
        assert!(UtilityCapability.prepare(r#"{"op": "delay", "ms": 60000}"#).is_err());
        assert!(UtilityCapability.prepare(r#"{"op": "uuid", "count": 0}"#).is_err());
        assert!(UtilityCapability.prepare(r#"{"op": "uuid", "count": 101}"#).is_err());
        assert!(UtilityCapability.prepare(r#"{"op": "timestamp", "format": "roman"}"#).is_err());
    }
}
