//! Action flow runner

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::{FlowState, Outcome, ResolvedAction};
use crate::{
    actions::{Action, ActionContext},
    config::RetrySettings,
    events::Event,
    response::PartialResponse,
    types::Mapping,
};

/// Bounds on `Retry` outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per action, the first one included
    pub max_attempts: u32,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            max_delay: Duration::from_millis(settings.max_delay_ms),
        }
    }
}

/// What happened to one mapping's flow
#[derive(Debug, Clone, Serialize)]
pub struct FlowReport {
    pub mapping_id: String,
    pub state: FlowState,
    /// Partial response at the terminal state; for an aborted flow, the
    /// response before the aborting action
    #[serde(skip)]
    pub response: PartialResponse,
    pub abort_reason: Option<String>,
    pub critical: bool,
    pub duration_ms: u64,
}

impl FlowReport {
    /// Whether this report fails the whole event
    pub fn is_critical_abort(&self) -> bool {
        self.critical && self.state == FlowState::Aborted
    }
}

/// Runs a mapping's actions in order
#[derive(Debug, Clone, Default)]
pub struct FlowExecutor {
    retry: RetryPolicy,
}

impl FlowExecutor {
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Run `actions` for `mapping` against `event`
    ///
    /// Never fails: errors and timeouts inside actions become an aborted
    /// report.
    pub async fn execute(
        &self,
        mapping: &Mapping,
        actions: &[ResolvedAction],
        event: &Event,
        ctx: &ActionContext,
    ) -> FlowReport {
        let start = Instant::now();
        let mapping_id = mapping.id();
        let ctx = ctx.for_mapping(mapping_id.clone());

        let mut state = FlowState::Pending;
        let mut response = PartialResponse::new();
        let mut abort_reason = None;
        let mut ran: Vec<&dyn Action> = Vec::with_capacity(actions.len());

        debug!(mapping = %mapping_id, actions = actions.len(), "Starting action flow");
        state = transition(&mapping_id, state, FlowState::Running);

        'flow: for resolved in actions {
            let mut attempt = 1;

            loop {
                let mut attempt_ctx = ctx.clone();
                attempt_ctx.attempt = attempt;

                let outcome = match resolved.action.run(event, response.clone(), &attempt_ctx).await {
                    Ok(outcome) => outcome,
                    Err(e) => Outcome::Abort(e.to_string()),
                };

                debug!(
                    mapping = %mapping_id,
                    action = %resolved.action_ref,
                    attempt,
                    outcome = outcome.name(),
                    "Action finished"
                );

                match outcome {
                    Outcome::Continue(updated) => {
                        response = updated;
                        ran.push(resolved.action.as_ref());
                        break;
                    }
                    Outcome::SkipRemaining(updated) => {
                        response = updated;
                        ran.push(resolved.action.as_ref());
                        state = transition(&mapping_id, state, FlowState::Skipped);
                        break 'flow;
                    }
                    Outcome::Abort(reason) => {
                        warn!(
                            mapping = %mapping_id,
                            action = %resolved.action_ref,
                            reason = %reason,
                            "Action aborted the flow"
                        );
                        abort_reason = Some(reason);
                        state = transition(&mapping_id, state, FlowState::Aborted);
                        break 'flow;
                    }
                    Outcome::Retry(delay) => {
                        let refusal = if !resolved.action.retryable() {
                            Some("retry not permitted")
                        } else if attempt >= self.retry.max_attempts {
                            Some("retry limit exceeded")
                        } else {
                            None
                        };

                        if let Some(reason) = refusal {
                            warn!(
                                mapping = %mapping_id,
                                action = %resolved.action_ref,
                                attempt,
                                reason,
                                "Retry refused"
                            );
                            abort_reason = Some(reason.to_string());
                            state = transition(&mapping_id, state, FlowState::Aborted);
                            break 'flow;
                        }

                        let delay = delay.min(self.retry.max_delay);
                        debug!(
                            mapping = %mapping_id,
                            action = %resolved.action_ref,
                            delay_ms = delay.as_millis() as u64,
                            "Retrying action"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                }
            }
        }

        if state == FlowState::Running {
            state = transition(&mapping_id, state, FlowState::Completed);
        }

        let succeeded = state.is_success();
        for action in ran {
            action.on_flow_finished(event, &ctx, succeeded);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            mapping = %mapping_id,
            state = ?state,
            duration_ms,
            "Action flow finished"
        );

        FlowReport {
            mapping_id,
            state,
            response,
            abort_reason,
            critical: mapping.critical,
            duration_ms,
        }
    }
}

fn transition(mapping_id: &str, from: FlowState, to: FlowState) -> FlowState {
    debug_assert!(!from.is_terminal(), "flow left a terminal state");
    debug!(mapping = %mapping_id, from = ?from, to = ?to, "Flow state change");
    to
}
