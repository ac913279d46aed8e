//! Payload validation and normalization
//!
//! Turns a raw invocation payload plus its declared kind into an [`Event`].
//! Each kind has a table of required fields with their primitive type; a
//! missing or mistyped field is a [`ValidationError`]. Normalization is pure.

use serde_json::{Map, Value};

use super::{CommonFields, Event, EventData, EventKind, ToolCall};
use crate::error::ValidationError;

/// Primitive type a required field must have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Object,
    Boolean,
    /// Present with any JSON value, including null
    Any,
}

impl FieldType {
    fn name(&self) -> &'static str {
        match self {
            FieldType::String => "a string",
            FieldType::Object => "an object",
            FieldType::Boolean => "a boolean",
            FieldType::Any => "present",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Object => value.is_object(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Any => true,
        }
    }
}

/// A required field and its type
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
}

const fn field(name: &'static str, ty: FieldType) -> FieldSpec {
    FieldSpec { name, ty }
}

const COMMON: &[FieldSpec] = &[
    field("session_id", FieldType::String),
    field("transcript_path", FieldType::String),
    field("cwd", FieldType::String),
];

const TOOL: &[FieldSpec] = &[
    field("tool_name", FieldType::String),
    field("tool_input", FieldType::Object),
];

const POST_TOOL: &[FieldSpec] = &[
    field("tool_name", FieldType::String),
    field("tool_input", FieldType::Object),
    field("tool_response", FieldType::Any),
];

const TOOL_FAILURE: &[FieldSpec] = &[
    field("tool_name", FieldType::String),
    field("tool_input", FieldType::Object),
    field("error", FieldType::String),
];

const NOTIFICATION: &[FieldSpec] = &[field("message", FieldType::String)];
const PROMPT: &[FieldSpec] = &[field("prompt", FieldType::String)];
const SESSION_START: &[FieldSpec] = &[field("source", FieldType::String)];
const SESSION_END: &[FieldSpec] = &[field("reason", FieldType::String)];
const STOP: &[FieldSpec] = &[field("stop_hook_active", FieldType::Boolean)];
const SUBAGENT_START: &[FieldSpec] = &[field("subagent_type", FieldType::String)];
const COMPACT: &[FieldSpec] = &[field("trigger", FieldType::String)];

/// Fields every payload must carry
pub fn common_fields() -> &'static [FieldSpec] {
    COMMON
}

/// Kind-specific required fields
pub fn required_fields(kind: EventKind) -> &'static [FieldSpec] {
    match kind {
        EventKind::PreToolUse | EventKind::PermissionRequest => TOOL,
        EventKind::PostToolUse => POST_TOOL,
        EventKind::PostToolUseFailure => TOOL_FAILURE,
        EventKind::Notification => NOTIFICATION,
        EventKind::UserPromptSubmit => PROMPT,
        EventKind::SessionStart => SESSION_START,
        EventKind::SessionEnd => SESSION_END,
        EventKind::Stop | EventKind::SubagentStop => STOP,
        EventKind::SubagentStart => SUBAGENT_START,
        EventKind::PreCompact => COMPACT,
    }
}

/// Normalize a payload whose kind label is still a string
pub fn normalize_labeled(label: &str, raw: &Value) -> Result<Event, ValidationError> {
    let kind: EventKind = label.parse()?;
    normalize(kind, raw)
}

/// Normalize a payload given as JSON text
pub fn normalize_str(label: &str, text: &str) -> Result<Event, ValidationError> {
    let raw: Value =
        serde_json::from_str(text).map_err(|e| ValidationError::Json(e.to_string()))?;
    normalize_labeled(label, &raw)
}

/// Validate `raw` against the field table of `kind` and build the event
pub fn normalize(kind: EventKind, raw: &Value) -> Result<Event, ValidationError> {
    let object = raw.as_object().ok_or(ValidationError::NotAnObject)?;

    for spec in COMMON.iter().chain(required_fields(kind)) {
        check(kind, object, spec)?;
    }

    let common = CommonFields {
        session_id: string(object, "session_id"),
        transcript_path: string(object, "transcript_path"),
        cwd: string(object, "cwd"),
        permission_mode: optional_string(object, "permission_mode"),
    };

    let data = match kind {
        EventKind::PreToolUse
        | EventKind::PostToolUse
        | EventKind::PostToolUseFailure
        | EventKind::PermissionRequest => EventData::Tool(ToolCall {
            tool_name: string(object, "tool_name"),
            tool_input: object
                .get("tool_input")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            tool_response: match kind {
                EventKind::PostToolUse => object.get("tool_response").cloned(),
                _ => None,
            },
            tool_use_id: optional_string(object, "tool_use_id"),
            error: optional_string(object, "error"),
        }),
        EventKind::Notification => EventData::Notification {
            message: string(object, "message"),
            notification_type: optional_string(object, "notification_type"),
        },
        EventKind::UserPromptSubmit => EventData::Prompt {
            prompt: string(object, "prompt"),
        },
        EventKind::SessionStart => EventData::SessionStart {
            source: string(object, "source"),
        },
        EventKind::SessionEnd => EventData::SessionEnd {
            reason: string(object, "reason"),
        },
        EventKind::Stop | EventKind::SubagentStop => EventData::Stop {
            stop_hook_active: object
                .get("stop_hook_active")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        },
        EventKind::SubagentStart => EventData::SubagentStart {
            subagent_type: string(object, "subagent_type"),
            task_description: optional_string(object, "task_description"),
        },
        EventKind::PreCompact => EventData::Compact {
            trigger: string(object, "trigger"),
            custom_instructions: optional_string(object, "custom_instructions"),
        },
    };

    Ok(Event::new(kind, common, data))
}

fn check(kind: EventKind, object: &Map<String, Value>, spec: &FieldSpec) -> Result<(), ValidationError> {
    match object.get(spec.name) {
        None => Err(ValidationError::MissingField {
            kind,
            field: spec.name,
        }),
        Some(value) if !spec.ty.accepts(value) => Err(ValidationError::WrongType {
            kind,
            field: spec.name,
            expected: spec.ty.name(),
        }),
        Some(_) => Ok(()),
    }
}

// Only called for fields already checked to be strings
fn string(object: &Map<String, Value>, name: &str) -> String {
    optional_string(object, name).unwrap_or_default()
}

fn optional_string(object: &Map<String, Value>, name: &str) -> Option<String> {
    object.get(name).and_then(Value::as_str).map(str::to_string)
}
