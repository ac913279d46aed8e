//! Tollgate Hooks Engine
//!
//! Intercepts lifecycle events of a coding-agent runtime, matches them
//! against a declarative mapping table, runs the matched action flows and
//! folds their output into one structured response per invocation.
//!
//! # Overview
//!
//! A mapping says: for this event kind, when this rule passes and this
//! condition holds, run these actions in order. Actions are references to
//! named capabilities (`permission/deny`, `command/trash`,
//! `conditional/rate_limit`) resolved once at startup.
//!
//! # Architecture
//!
//! 1. **Events** (`events`): validates raw payloads into immutable [`Event`]s
//! 2. **Matcher** (`matcher`): rule catalog, condition language, [`match_event`]
//! 3. **Conflicts** (`conflict`): grouping, duplicate removal, conflict reports
//! 4. **Registry** (`registry`): capability name to implementation
//! 5. **Actions** (`actions`): the capability families
//! 6. **Executor** (`executor`): per-mapping flow state machine with bounded retry
//! 7. **Response** (`response`): merge rules and the per-kind wire format
//! 8. **Dispatcher** (`dispatcher`): the [`EventPipeline`] tying it together
//! 9. **Configuration** (`config`): settings, mapping loader and validator
//!
//! # Quick Start
//!
//! ```ignore
//! use tollgate_hooks::EventPipeline;
//!
//! let pipeline = EventPipeline::from_config_dir(Path::new("/home/me/.tollgate"))?;
//! let payload = serde_json::json!({
//!     "session_id": "abc",
//!     "transcript_path": "/tmp/t.jsonl",
//!     "cwd": "/work",
//!     "tool_name": "Bash",
//!     "tool_input": {"command": "rm -rf build"},
//! });
//! let response = pipeline.handle("PreToolUse", &payload).await;
//! println!("{}", response.to_json_string()?);
//! ```
//!
//! # Configuration
//!
//! Mappings live in `<config dir>/mappings/*.toml` (or `.yaml`/`.yml`):
//!
//! ```toml
//! [[mappings]]
//! event = "PreToolUse"
//! rule = "bash"
//! condition = 'command ^= "rm "'
//! action_flow = ["command/trash", "permission/allow"]
//! ```
//!
//! # Error Handling
//!
//! Configuration problems surface at startup as [`ConfigError`]. At event
//! time nothing escapes [`EventPipeline::handle`]: invalid payloads and
//! critical aborts turn into the fail-closed response for the kind.

pub mod actions;
pub mod cli;
pub mod config;
pub mod conflict;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod executor;
pub mod matcher;
pub mod registry;
pub mod response;
pub mod tooling;
pub mod types;

// Re-export public types
pub use actions::{Action, ActionContext, ActionFamily, Capability, Clock, ManualClock, SystemClock};
pub use cli::{CliOutput, HookCli, HookCommand};
pub use config::{MappingLoader, MappingValidator, ResolvedMappingSet, Settings};
pub use conflict::{dedupe, detect_conflicts, Conflict, GroupKey};
pub use dispatcher::EventPipeline;
pub use error::{ConfigError, HooksError, Result, ValidationError};
pub use events::{normalize, normalize_labeled, Event, EventKind};
pub use executor::{FlowExecutor, FlowReport, FlowState, Outcome, ResolvedAction, RetryPolicy};
pub use matcher::{match_event, Condition, Rule, RuleCatalog};
pub use registry::CapabilityRegistry;
pub use response::{
    fail_closed, merge, render, HookResponse, MergedResponse, PartialResponse, PermissionDecision,
    FAIL_CLOSED_REASON,
};
pub use types::{ActionRef, Mapping, MappingSet};
