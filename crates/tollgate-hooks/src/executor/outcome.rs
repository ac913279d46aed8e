//! Action outcomes and flow states

use std::time::Duration;

use serde::Serialize;

use crate::response::PartialResponse;

/// Result of running one action
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Proceed to the next action with the updated response
    Continue(PartialResponse),
    /// End the flow successfully with this response
    SkipRemaining(PartialResponse),
    /// Fail the mapping
    Abort(String),
    /// Run the same action again after the delay
    Retry(Duration),
}

impl Outcome {
    pub fn abort(reason: impl Into<String>) -> Self {
        Outcome::Abort(reason.into())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Outcome::Continue(_) => "continue",
            Outcome::SkipRemaining(_) => "skip_remaining",
            Outcome::Abort(_) => "abort",
            Outcome::Retry(_) => "retry",
        }
    }
}

/// State of a mapping's flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    Pending,
    Running,
    Completed,
    Aborted,
    Skipped,
}

impl FlowState {
    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::Completed | FlowState::Aborted | FlowState::Skipped)
    }

    /// Terminal states that count as success
    pub fn is_success(&self) -> bool {
        matches!(self, FlowState::Completed | FlowState::Skipped)
    }
}
