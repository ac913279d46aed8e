//! Capabilities and the actions they prepare
//!
//! A [`Capability`] is a named behavior that action flows reference as
//! `capability/parameter`. At load time the capability parses the parameter
//! once and returns a prepared [`Action`]; at event time the executor runs
//! that action against the event and the mapping's partial response.
//!
//! Parameters are either a bare word (`permission/deny`) or a JSON object
//! (`conditional/{"kind":"rate_limit","limit":3}`) deserialized into the
//! capability's typed parameters.

pub mod ai;
pub mod analysis;
pub mod command;
pub mod conditional;
pub mod context;
pub mod decision;
pub mod memory;
pub mod notification;
pub mod permission;
mod process;
pub mod quality;
pub mod utility;

use std::{
    fmt,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tollgate_storage::{InMemoryRecordLog, InMemoryStateStore, RecordLog, StateStore};

use crate::{
    config::Settings, error::Result, events::Event, executor::Outcome, response::PartialResponse,
};

pub use ai::AiCapability;
pub use analysis::AnalysisCapability;
pub use command::CommandCapability;
pub use conditional::ConditionalCapability;
pub use context::ContextCapability;
pub use decision::BlockCapability;
pub use memory::MemoryCapability;
pub use notification::NotificationCapability;
pub use permission::PermissionCapability;
pub use quality::QualityCapability;
pub use utility::UtilityCapability;

/// Behavioral family of a capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionFamily {
    Permission,
    CommandRewrite,
    Decision,
    Context,
    Notification,
    Quality,
    Analysis,
    Control,
    Record,
    Ai,
    Utility,
}

impl ActionFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionFamily::Permission => "permission",
            ActionFamily::CommandRewrite => "command-rewrite",
            ActionFamily::Decision => "decision",
            ActionFamily::Context => "context",
            ActionFamily::Notification => "notification",
            ActionFamily::Quality => "quality",
            ActionFamily::Analysis => "analysis",
            ActionFamily::Control => "control",
            ActionFamily::Record => "record",
            ActionFamily::Ai => "ai",
            ActionFamily::Utility => "utility",
        }
    }
}

impl fmt::Display for ActionFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, pluggable behavior
pub trait Capability: Send + Sync {
    /// Name used in action references
    fn name(&self) -> &'static str;

    /// Behavioral family
    fn family(&self) -> ActionFamily;

    /// One-line description for listings
    fn description(&self) -> &'static str;

    /// Parse `parameter` into a ready-to-run action
    ///
    /// Called once per action reference at load time. An error here is a
    /// configuration error.
    fn prepare(&self, parameter: &str) -> std::result::Result<Box<dyn Action>, String>;
}

/// A prepared action
#[async_trait]
pub trait Action: Send + Sync {
    /// Whether a `Retry` outcome from this action may be honored
    fn retryable(&self) -> bool {
        false
    }

    /// Run against `event`, taking the mapping's partial response so far
    ///
    /// An `Err` is treated as an abort of the mapping.
    async fn run(&self, event: &Event, response: PartialResponse, ctx: &ActionContext) -> Result<Outcome>;

    /// Called once the mapping's flow reached a terminal state
    ///
    /// `succeeded` is true for Completed and Skipped flows. Only actions
    /// that returned Continue or SkipRemaining are notified.
    fn on_flow_finished(&self, _event: &Event, _ctx: &ActionContext, _succeeded: bool) {}
}

/// Source of wall-clock time in milliseconds
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// System clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    pub fn advance(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, ms: i64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Everything an action may touch besides the event and response
#[derive(Clone)]
pub struct ActionContext {
    pub state: Arc<dyn StateStore>,
    pub records: Arc<dyn RecordLog>,
    pub settings: Arc<Settings>,
    pub clock: Arc<dyn Clock>,
    /// Identifier of the mapping being run
    pub mapping_id: String,
    /// 1-based attempt number of the current action
    pub attempt: u32,
}

impl ActionContext {
    pub fn new(
        state: Arc<dyn StateStore>,
        records: Arc<dyn RecordLog>,
        settings: Arc<Settings>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state,
            records,
            settings,
            clock,
            mapping_id: String::new(),
            attempt: 1,
        }
    }

    /// In-memory stores, default settings and the system clock
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryStateStore::new()),
            Arc::new(InMemoryRecordLog::new()),
            Arc::new(Settings::default()),
            Arc::new(SystemClock),
        )
    }

    /// Same context bound to another mapping
    pub fn for_mapping(&self, mapping_id: impl Into<String>) -> Self {
        Self {
            mapping_id: mapping_id.into(),
            attempt: 1,
            ..self.clone()
        }
    }
}

impl fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionContext")
            .field("mapping_id", &self.mapping_id)
            .field("attempt", &self.attempt)
            .finish_non_exhaustive()
    }
}

/// Parse a parameter that is either a JSON object or a bare word
///
/// JSON objects deserialize into `T`; a bare word is handed to `bare`.
pub(crate) fn parse_param<T, F>(parameter: &str, bare: F) -> std::result::Result<T, String>
where
    T: DeserializeOwned,
    F: FnOnce(&str) -> std::result::Result<T, String>,
{
    let parameter = parameter.trim();
    if parameter.starts_with('{') {
        serde_json::from_str(parameter).map_err(|e| format!("invalid JSON parameter: {}", e))
    } else {
        bare(parameter)
    }
}
