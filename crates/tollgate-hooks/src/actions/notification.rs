//! `notification/<log|desktop|command>`: side-effect-only notifications
//!
//! Notifications never change the response. External channels run under
//! `timeouts.notification_ms`; a timeout aborts the mapping, and a channel
//! that fails to start or exits non-zero asks for a retry.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use super::{
    parse_param,
    process::{run_bounded, ProcessError},
    Action, ActionContext, ActionFamily, Capability,
};
use crate::{error::Result, events::Event, executor::Outcome, response::PartialResponse};

const RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Channel {
    Log,
    Desktop,
    Command,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct NotificationParams {
    channel: Channel,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Sends notifications
#[derive(Debug, Default)]
pub struct NotificationCapability;

impl Capability for NotificationCapability {
    fn name(&self) -> &'static str {
        "notification"
    }

    fn family(&self) -> ActionFamily {
        ActionFamily::Notification
    }

    fn description(&self) -> &'static str {
        "Notify through the log, the desktop, or a configured command"
    }

    fn prepare(&self, parameter: &str) -> std::result::Result<Box<dyn Action>, String> {
        let params: NotificationParams = parse_param(parameter, |word| {
            let channel = match word {
                "" | "log" => Channel::Log,
                "desktop" => Channel::Desktop,
                "command" => Channel::Command,
                other => return Err(format!("unknown notification channel '{}'", other)),
            };
            Ok(NotificationParams {
                channel,
                title: None,
                message: None,
            })
        })?;
        Ok(Box::new(NotificationAction { params }))
    }
}

struct NotificationAction {
    params: NotificationParams,
}

impl NotificationAction {
    fn title(&self, event: &Event) -> String {
        self.params
            .title
            .clone()
            .unwrap_or_else(|| format!("tollgate: {}", event.kind()))
    }

    fn message(&self, event: &Event) -> String {
        if let Some(message) = &self.params.message {
            return message.clone();
        }
        match (event.tool_name(), event.text()) {
            (Some(tool), Some(text)) => format!("{}: {}", tool, truncate(text, 120)),
            (Some(tool), None) => tool.to_string(),
            (None, Some(text)) => truncate(text, 120),
            (None, None) => format!("session {}", event.session_id()),
        }
    }

    fn desktop_argv(title: &str, message: &str) -> Vec<String> {
        if cfg!(target_os = "macos") {
            vec![
                "osascript".to_string(),
                "-e".to_string(),
                format!(
                    "display notification {:?} with title {:?}",
                    message, title
                ),
            ]
        } else {
            vec!["notify-send".to_string(), title.to_string(), message.to_string()]
        }
    }
}

#[async_trait]
impl Action for NotificationAction {
    fn retryable(&self) -> bool {
        true
    }

    async fn run(&self, event: &Event, response: PartialResponse, ctx: &ActionContext) -> Result<Outcome> {
        let title = self.title(event);
        let message = self.message(event);

        let (argv, stdin) = match self.params.channel {
            Channel::Log => {
                info!(mapping = %ctx.mapping_id, title = %title, message = %message, "Notification");
                return Ok(Outcome::Continue(response));
            }
            Channel::Desktop => (Self::desktop_argv(&title, &message), None),
            Channel::Command => {
                if ctx.settings.notification.command.is_empty() {
                    return Ok(Outcome::abort("no notification command configured"));
                }
                let payload = serde_json::json!({
                    "title": title,
                    "message": message,
                    "event": event.to_json(),
                });
                (
                    ctx.settings.notification.command.clone(),
                    Some(serde_json::to_vec(&payload)?),
                )
            }
        };

        let timeout = Duration::from_millis(ctx.settings.timeouts.notification_ms);
        match run_bounded(&argv, stdin.as_deref(), timeout).await {
            Ok(output) if output.success => Ok(Outcome::Continue(response)),
            Ok(output) => {
                warn!(
                    mapping = %ctx.mapping_id,
                    code = ?output.code,
                    stderr = %output.stderr.trim(),
                    "Notification channel failed"
                );
                Ok(Outcome::Retry(RETRY_DELAY))
            }
            Err(ProcessError::Timeout(ms)) => {
                warn!(mapping = %ctx.mapping_id, timeout_ms = ms, "Notification timed out");
                Ok(Outcome::abort(format!("notification timed out after {}ms", ms)))
            }
            Err(ProcessError::NoCommand) => Ok(Outcome::abort("no notification command configured")),
            Err(e) => {
                warn!(mapping = %ctx.mapping_id, error = %e, "Notification channel unavailable");
                Ok(Outcome::Retry(RETRY_DELAY))
            }
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
