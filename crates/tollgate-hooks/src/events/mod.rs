//! Lifecycle events of the host coding-agent runtime
//!
//! An [`Event`] is built once per invocation by [`normalize`] and is never
//! mutated afterwards. Rules and conditions read it through
//! [`Event::field`], which resolves dotted paths such as
//! `tool_input.command`.

pub mod normalizer;

use std::{borrow::Cow, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;

pub use normalizer::{normalize, normalize_labeled, normalize_str};

/// The twelve event kinds the host runtime emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    PreToolUse,
    PostToolUse,
    PostToolUseFailure,
    Notification,
    UserPromptSubmit,
    SessionStart,
    SessionEnd,
    Stop,
    SubagentStart,
    SubagentStop,
    PreCompact,
    PermissionRequest,
}

impl EventKind {
    /// Every kind, in declaration order
    pub const ALL: [EventKind; 12] = [
        EventKind::PreToolUse,
        EventKind::PostToolUse,
        EventKind::PostToolUseFailure,
        EventKind::Notification,
        EventKind::UserPromptSubmit,
        EventKind::SessionStart,
        EventKind::SessionEnd,
        EventKind::Stop,
        EventKind::SubagentStart,
        EventKind::SubagentStop,
        EventKind::PreCompact,
        EventKind::PermissionRequest,
    ];

    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PreToolUse => "PreToolUse",
            EventKind::PostToolUse => "PostToolUse",
            EventKind::PostToolUseFailure => "PostToolUseFailure",
            EventKind::Notification => "Notification",
            EventKind::UserPromptSubmit => "UserPromptSubmit",
            EventKind::SessionStart => "SessionStart",
            EventKind::SessionEnd => "SessionEnd",
            EventKind::Stop => "Stop",
            EventKind::SubagentStart => "SubagentStart",
            EventKind::SubagentStop => "SubagentStop",
            EventKind::PreCompact => "PreCompact",
            EventKind::PermissionRequest => "PermissionRequest",
        }
    }

    /// Whether the kind carries a tool invocation
    pub fn is_tool_event(&self) -> bool {
        matches!(
            self,
            EventKind::PreToolUse
                | EventKind::PostToolUse
                | EventKind::PostToolUseFailure
                | EventKind::PermissionRequest
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownKind(s.to_string()))
    }
}

/// Fields every event carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommonFields {
    pub session_id: String,
    pub transcript_path: String,
    pub cwd: String,
    pub permission_mode: Option<String>,
}

/// A tool invocation as seen by the tool-lifecycle kinds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCall {
    pub tool_name: String,
    pub tool_input: Map<String, Value>,
    pub tool_response: Option<Value>,
    pub tool_use_id: Option<String>,
    pub error: Option<String>,
}

/// Kind-specific event fields
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventData {
    /// PreToolUse, PostToolUse, PostToolUseFailure, PermissionRequest
    Tool(ToolCall),
    Notification {
        message: String,
        notification_type: Option<String>,
    },
    Prompt {
        prompt: String,
    },
    SessionStart {
        source: String,
    },
    SessionEnd {
        reason: String,
    },
    /// Stop, SubagentStop
    Stop {
        stop_hook_active: bool,
    },
    SubagentStart {
        subagent_type: String,
        task_description: Option<String>,
    },
    Compact {
        trigger: String,
        custom_instructions: Option<String>,
    },
}

/// A normalized, immutable lifecycle event
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    kind: EventKind,
    common: CommonFields,
    data: EventData,
}

impl Event {
    pub(crate) fn new(kind: EventKind, common: CommonFields, data: EventData) -> Self {
        Self { kind, common, data }
    }

    /// Event kind
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Common fields
    pub fn common(&self) -> &CommonFields {
        &self.common
    }

    /// Kind-specific fields
    pub fn data(&self) -> &EventData {
        &self.data
    }

    /// Session identifier
    pub fn session_id(&self) -> &str {
        &self.common.session_id
    }

    /// Tool call, for tool-lifecycle kinds
    pub fn tool(&self) -> Option<&ToolCall> {
        match &self.data {
            EventData::Tool(call) => Some(call),
            _ => None,
        }
    }

    /// Tool name, for tool-lifecycle kinds
    pub fn tool_name(&self) -> Option<&str> {
        self.tool().map(|t| t.tool_name.as_str())
    }

    /// Tool input object, for tool-lifecycle kinds
    pub fn tool_input(&self) -> Option<&Map<String, Value>> {
        self.tool().map(|t| &t.tool_input)
    }

    /// Shell command of a tool call, when the input has one
    pub fn command(&self) -> Option<&str> {
        self.tool_input()
            .and_then(|input| input.get("command"))
            .and_then(Value::as_str)
    }

    /// Target file of a tool call, when the input has one
    pub fn file_path(&self) -> Option<&str> {
        self.tool_input().and_then(|input| {
            input
                .get("file_path")
                .or_else(|| input.get("notebook_path"))
                .or_else(|| input.get("path"))
                .and_then(Value::as_str)
        })
    }

    /// Prompt text, for UserPromptSubmit
    pub fn prompt(&self) -> Option<&str> {
        match &self.data {
            EventData::Prompt { prompt } => Some(prompt.as_str()),
            _ => None,
        }
    }

    /// Free text carried by the event: prompt, notification message, or command
    pub fn text(&self) -> Option<&str> {
        match &self.data {
            EventData::Prompt { prompt } => Some(prompt.as_str()),
            EventData::Notification { message, .. } => Some(message.as_str()),
            EventData::Tool(_) => self.command(),
            _ => None,
        }
    }

    /// Resolve a dotted field path to its textual value
    ///
    /// Strings resolve to themselves, booleans to `true`/`false`, numbers to
    /// their decimal form, and objects or arrays to compact JSON. Unknown or
    /// absent fields resolve to `None`.
    pub fn field(&self, path: &str) -> Option<Cow<'_, str>> {
        match path {
            "kind" => Some(Cow::Borrowed(self.kind.as_str())),
            "session_id" => Some(Cow::Borrowed(self.common.session_id.as_str())),
            "transcript_path" => Some(Cow::Borrowed(self.common.transcript_path.as_str())),
            "cwd" => Some(Cow::Borrowed(self.common.cwd.as_str())),
            "permission_mode" => self.common.permission_mode.as_deref().map(Cow::Borrowed),
            "command" => self.command().map(Cow::Borrowed),
            "file_path" => self.file_path().map(Cow::Borrowed),
            "text" => self.text().map(Cow::Borrowed),
            _ => self.data_field(path),
        }
    }

    fn data_field(&self, path: &str) -> Option<Cow<'_, str>> {
        match &self.data {
            EventData::Tool(call) => match path {
                "tool_name" => Some(Cow::Borrowed(call.tool_name.as_str())),
                "tool_use_id" => call.tool_use_id.as_deref().map(Cow::Borrowed),
                "error" => call.error.as_deref().map(Cow::Borrowed),
                "tool_input" => Some(Cow::Owned(Value::Object(call.tool_input.clone()).to_string())),
                "tool_response" => call.tool_response.as_ref().map(value_text),
                _ => {
                    if let Some(rest) = path.strip_prefix("tool_input.") {
                        lookup(&call.tool_input, rest).map(value_text)
                    } else if let Some(rest) = path.strip_prefix("tool_response.") {
                        match &call.tool_response {
                            Some(Value::Object(map)) => lookup(map, rest).map(value_text),
                            _ => None,
                        }
                    } else {
                        None
                    }
                }
            },
            EventData::Notification {
                message,
                notification_type,
            } => match path {
                "message" => Some(Cow::Borrowed(message.as_str())),
                "notification_type" => notification_type.as_deref().map(Cow::Borrowed),
                _ => None,
            },
            EventData::Prompt { prompt } => match path {
                "prompt" => Some(Cow::Borrowed(prompt.as_str())),
                _ => None,
            },
            EventData::SessionStart { source } => match path {
                "source" => Some(Cow::Borrowed(source.as_str())),
                _ => None,
            },
            EventData::SessionEnd { reason } => match path {
                "reason" => Some(Cow::Borrowed(reason.as_str())),
                _ => None,
            },
            EventData::Stop { stop_hook_active } => match path {
                "stop_hook_active" => Some(Cow::Borrowed(bool_text(*stop_hook_active))),
                _ => None,
            },
            EventData::SubagentStart {
                subagent_type,
                task_description,
            } => match path {
                "subagent_type" => Some(Cow::Borrowed(subagent_type.as_str())),
                "task_description" => task_description.as_deref().map(Cow::Borrowed),
                _ => None,
            },
            EventData::Compact {
                trigger,
                custom_instructions,
            } => match path {
                "trigger" => Some(Cow::Borrowed(trigger.as_str())),
                "custom_instructions" => custom_instructions.as_deref().map(Cow::Borrowed),
                _ => None,
            },
        }
    }

    /// Canonical JSON form, as handed to external commands
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        object.insert("hook_event_name".into(), Value::from(self.kind.as_str()));
        object.insert("session_id".into(), Value::from(self.common.session_id.clone()));
        object.insert(
            "transcript_path".into(),
            Value::from(self.common.transcript_path.clone()),
        );
        object.insert("cwd".into(), Value::from(self.common.cwd.clone()));
        if let Some(mode) = &self.common.permission_mode {
            object.insert("permission_mode".into(), Value::from(mode.clone()));
        }

        if let Ok(Value::Object(data)) = serde_json::to_value(&self.data) {
            for (key, value) in data {
                if !value.is_null() {
                    object.insert(key, value);
                }
            }
        }

        Value::Object(object)
    }
}

fn lookup<'a>(map: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut current = map.get(first)?;
    for part in parts {
        current = match current {
            Value::Object(inner) => inner.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn value_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s),
        Value::Bool(b) => Cow::Borrowed(bool_text(*b)),
        Value::Null => Cow::Borrowed(""),
        other => Cow::Owned(other.to_string()),
    }
}

fn bool_text(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}
