//! `conditional/...`: flow control gates
//!
//! - `rate_limit`: at most `limit` passes per sliding `window_secs`; once
//!   exhausted the rest of the flow is skipped
//! - `circuit_breaker`: aborts with `circuit-open` after
//!   `failure_threshold` consecutive failed flows, half-opens after
//!   `cooldown_secs`
//! - `branch`: skips the rest of the flow unless `when` holds
//! - `switch_case`: the first case whose `when` holds picks the route
//!   (`continue`, `skip` or `abort`) and may add context; `default` routes
//!   the rest
//! - `if_then`: two-way `switch_case` with `then` and `else` routes
//!
//! Counters live in the state store under
//! `conditional:<variant>:<scope>`. The scope defaults to
//! `<kind>_<tool name or *>`. When the store fails, gates let the flow
//! through.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tollgate_storage::update_as;
use tracing::{debug, warn};

use super::{Action, ActionContext, ActionFamily, Capability};
use crate::{
    error::Result, events::Event, executor::Outcome, matcher::Condition,
    response::PartialResponse,
};

/// Rate-limit and circuit-breaker defaults
pub const DEFAULT_RATE_LIMIT: u32 = 10;
pub const DEFAULT_WINDOW_SECS: u64 = 60;
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_COOLDOWN_SECS: u64 = 60;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ConditionalParams {
    RateLimit {
        #[serde(default = "default_limit")]
        limit: u32,
        #[serde(default = "default_window")]
        window_secs: u64,
        #[serde(default)]
        scope: Option<String>,
    },
    CircuitBreaker {
        #[serde(default = "default_threshold")]
        failure_threshold: u32,
        #[serde(default = "default_cooldown")]
        cooldown_secs: u64,
        #[serde(default)]
        scope: Option<String>,
    },
    Branch {
        when: String,
    },
    SwitchCase {
        cases: Vec<CaseSpec>,
        #[serde(default, rename = "default")]
        otherwise: Route,
    },
    IfThen {
        when: String,
        #[serde(default)]
        then: Route,
        #[serde(default = "route_skip", rename = "else")]
        otherwise: Route,
    },
}

/// Where a `switch_case` arm sends the flow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    #[default]
    Continue,
    Skip,
    Abort,
}

#[derive(Debug, Clone, Deserialize)]
struct CaseSpec {
    when: String,
    then: Route,
    #[serde(default)]
    context: Option<String>,
}

fn route_skip() -> Route {
    Route::Skip
}

fn default_limit() -> u32 {
    DEFAULT_RATE_LIMIT
}

fn default_window() -> u64 {
    DEFAULT_WINDOW_SECS
}

fn default_threshold() -> u32 {
    DEFAULT_FAILURE_THRESHOLD
}

fn default_cooldown() -> u64 {
    DEFAULT_COOLDOWN_SECS
}

/// Persisted sliding window of pass timestamps
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateWindow {
    pub hits: Vec<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerStatus {
    #[default]
    Closed,
    Open,
    HalfOpen,
}

/// Persisted circuit-breaker state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BreakerState {
    pub status: BreakerStatus,
    pub consecutive_failures: u32,
    pub opened_at_ms: Option<i64>,
}

/// Rate limit, circuit breaker and branch gates
#[derive(Debug, Default)]
pub struct ConditionalCapability;

impl Capability for ConditionalCapability {
    fn name(&self) -> &'static str {
        "conditional"
    }

    fn family(&self) -> ActionFamily {
        ActionFamily::Control
    }

    fn description(&self) -> &'static str {
        "Gate the rest of the flow with a rate limit, circuit breaker or branch"
    }

    fn prepare(&self, parameter: &str) -> std::result::Result<Box<dyn Action>, String> {
        let params = super::parse_param(parameter, |word| match word {
            "rate_limit" => Ok(ConditionalParams::RateLimit {
                limit: DEFAULT_RATE_LIMIT,
                window_secs: DEFAULT_WINDOW_SECS,
                scope: None,
            }),
            "circuit_breaker" => Ok(ConditionalParams::CircuitBreaker {
                failure_threshold: DEFAULT_FAILURE_THRESHOLD,
                cooldown_secs: DEFAULT_COOLDOWN_SECS,
                scope: None,
            }),
            "branch" | "if_then" => Err(format!("{} needs a JSON parameter with a 'when' condition", word)),
            "switch_case" => Err("switch_case needs a JSON parameter with 'cases'".to_string()),
            other => Err(format!("unknown conditional '{}'", other)),
        })?;

        let action: Box<dyn Action> = match params {
            ConditionalParams::RateLimit {
                limit,
                window_secs,
                scope,
            } => {
                if limit == 0 || window_secs == 0 {
                    return Err("rate_limit needs a positive limit and window".to_string());
                }
                Box::new(RateLimitAction {
                    limit,
                    window_ms: (window_secs as i64).saturating_mul(1_000),
                    scope,
                })
            }
            ConditionalParams::CircuitBreaker {
                failure_threshold,
                cooldown_secs,
                scope,
            } => {
                if failure_threshold == 0 {
                    return Err("circuit_breaker needs a positive failure_threshold".to_string());
                }
                Box::new(CircuitBreakerAction {
                    failure_threshold,
                    cooldown_ms: (cooldown_secs as i64).saturating_mul(1_000),
                    scope,
                })
            }
            ConditionalParams::Branch { when } => Box::new(BranchAction {
                condition: Condition::parse(&when).map_err(|e| e.to_string())?,
            }),
            ConditionalParams::SwitchCase { cases, otherwise } => {
                if cases.is_empty() {
                    return Err("switch_case needs at least one case".to_string());
                }
                let arms = cases
                    .into_iter()
                    .map(|case| {
                        Ok(SwitchArm {
                            condition: Condition::parse(&case.when).map_err(|e| e.to_string())?,
                            route: case.then,
                            context: case.context,
                        })
                    })
                    .collect::<std::result::Result<Vec<_>, String>>()?;
                Box::new(SwitchAction { arms, otherwise })
            }
            ConditionalParams::IfThen { when, then, otherwise } => Box::new(SwitchAction {
                arms: vec![SwitchArm {
                    condition: Condition::parse(&when).map_err(|e| e.to_string())?,
                    route: then,
                    context: None,
                }],
                otherwise,
            }),
        };
        Ok(action)
    }
}

/// `<kind>_<tool name or *>`
pub fn default_scope(event: &Event) -> String {
    format!("{}_{}", event.kind(), event.tool_name().unwrap_or("*"))
}

fn state_key(variant: &str, scope: &Option<String>, event: &Event) -> String {
    let scope = scope.clone().unwrap_or_else(|| default_scope(event));
    format!("conditional:{}:{}", variant, scope)
}

struct RateLimitAction {
    limit: u32,
    window_ms: i64,
    scope: Option<String>,
}

#[async_trait]
impl Action for RateLimitAction {
    async fn run(&self, event: &Event, response: PartialResponse, ctx: &ActionContext) -> Result<Outcome> {
        let key = state_key("rate_limit", &self.scope, event);
        let now = ctx.clock.now_ms();
        let (limit, window_ms) = (self.limit as usize, self.window_ms);

        let allowed = update_as(&*ctx.state, &key, |window: &mut RateWindow| {
            window.hits.retain(|hit| now - *hit < window_ms);
            if window.hits.len() >= limit {
                false
            } else {
                window.hits.push(now);
                true
            }
        });

        match allowed {
            Ok(true) => Ok(Outcome::Continue(response)),
            Ok(false) => {
                debug!(key = %key, limit = self.limit, "Rate limit reached, skipping rest of flow");
                Ok(Outcome::SkipRemaining(response))
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Rate limit state unavailable, allowing");
                Ok(Outcome::Continue(response))
            }
        }
    }
}

struct CircuitBreakerAction {
    failure_threshold: u32,
    cooldown_ms: i64,
    scope: Option<String>,
}

#[async_trait]
impl Action for CircuitBreakerAction {
    async fn run(&self, event: &Event, response: PartialResponse, ctx: &ActionContext) -> Result<Outcome> {
        let key = state_key("circuit_breaker", &self.scope, event);
        let now = ctx.clock.now_ms();
        let cooldown_ms = self.cooldown_ms;

        let status = update_as(&*ctx.state, &key, |state: &mut BreakerState| {
            if state.status == BreakerStatus::Open {
                let opened_at = state.opened_at_ms.unwrap_or(now);
                if now - opened_at >= cooldown_ms {
                    state.status = BreakerStatus::HalfOpen;
                }
            }
            state.status
        });

        match status {
            Ok(BreakerStatus::Open) => {
                debug!(key = %key, "Circuit open");
                Ok(Outcome::abort("circuit-open"))
            }
            Ok(status) => {
                debug!(key = %key, status = ?status, "Circuit admits flow");
                Ok(Outcome::Continue(response))
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Circuit state unavailable, treating as closed");
                Ok(Outcome::Continue(response))
            }
        }
    }

    fn on_flow_finished(&self, event: &Event, ctx: &ActionContext, succeeded: bool) {
        let key = state_key("circuit_breaker", &self.scope, event);
        let now = ctx.clock.now_ms();
        let threshold = self.failure_threshold;

        let result = update_as(&*ctx.state, &key, |state: &mut BreakerState| {
            if succeeded {
                *state = BreakerState::default();
            } else {
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                if state.status == BreakerStatus::HalfOpen || state.consecutive_failures >= threshold {
                    state.status = BreakerStatus::Open;
                    state.opened_at_ms = Some(now);
                }
            }
            state.status
        });

        match result {
            Ok(status) => debug!(key = %key, succeeded, status = ?status, "Recorded flow result"),
            Err(e) => warn!(key = %key, error = %e, "Could not record flow result"),
        }
    }
}

struct BranchAction {
    condition: Condition,
}

#[async_trait]
impl Action for BranchAction {
    async fn run(&self, event: &Event, response: PartialResponse, _ctx: &ActionContext) -> Result<Outcome> {
        if self.condition.evaluate(event) {
            Ok(Outcome::Continue(response))
        } else {
            debug!(condition = %self.condition, "Branch not taken");
            Ok(Outcome::SkipRemaining(response))
        }
    }
}

struct SwitchArm {
    condition: Condition,
    route: Route,
    context: Option<String>,
}

struct SwitchAction {
    arms: Vec<SwitchArm>,
    otherwise: Route,
}

#[async_trait]
impl Action for SwitchAction {
    async fn run(&self, event: &Event, mut response: PartialResponse, _ctx: &ActionContext) -> Result<Outcome> {
        let chosen = self.arms.iter().position(|arm| arm.condition.evaluate(event));
        let route = match chosen {
            Some(index) => {
                let arm = &self.arms[index];
                debug!(case = index, condition = %arm.condition, route = ?arm.route, "Switch case taken");
                if let Some(text) = &arm.context {
                    response.push_context(text.clone());
                }
                arm.route
            }
            None => {
                debug!(route = ?self.otherwise, "No switch case matched, using default");
                self.otherwise
            }
        };

        Ok(match route {
            Route::Continue => Outcome::Continue(response),
            Route::Skip => Outcome::SkipRemaining(response),
            Route::Abort => match chosen {
                Some(index) => Outcome::abort(format!("switch-case {}", index)),
                None => Outcome::abort("switch-default"),
            },
        })
    }
}
