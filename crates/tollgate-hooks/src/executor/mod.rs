//! Action flow execution
//!
//! Each matched mapping runs as a small state machine:
//!
//! ```text
//! Pending -> Running -> Completed
//!                    -> Skipped   (an action returned SkipRemaining)
//!                    -> Aborted   (Abort, an error, or a refused retry)
//! ```
//!
//! Actions within a flow run strictly in order; each sees the partial
//! response left by the one before it.

pub mod outcome;
pub mod runner;

use std::fmt;

pub use outcome::{FlowState, Outcome};
pub use runner::{FlowExecutor, FlowReport, RetryPolicy};

use crate::{actions::Action, types::ActionRef};

/// An action reference together with its prepared action
pub struct ResolvedAction {
    pub action_ref: ActionRef,
    pub action: Box<dyn Action>,
}

impl fmt::Debug for ResolvedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedAction")
            .field("action_ref", &self.action_ref.to_string())
            .finish()
    }
}
