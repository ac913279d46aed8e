//! `permission/<allow|deny|ask>` and `permission/{"decision": .., "reason": ..}`

use async_trait::async_trait;
use serde::Deserialize;

use super::{parse_param, Action, ActionContext, ActionFamily, Capability};
use crate::{
    error::Result,
    events::Event,
    executor::Outcome,
    response::{PartialResponse, PermissionDecision},
};

/// Sets the permission decision
#[derive(Debug, Default)]
pub struct PermissionCapability;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct PermissionParams {
    decision: PermissionDecision,
    #[serde(default)]
    reason: Option<String>,
}

impl Capability for PermissionCapability {
    fn name(&self) -> &'static str {
        "permission"
    }

    fn family(&self) -> ActionFamily {
        ActionFamily::Permission
    }

    fn description(&self) -> &'static str {
        "Set the tool permission decision (allow, ask or deny)"
    }

    fn prepare(&self, parameter: &str) -> std::result::Result<Box<dyn Action>, String> {
        let params: PermissionParams = parse_param(parameter, |word| {
            Ok(PermissionParams {
                decision: word.parse()?,
                reason: None,
            })
        })?;
        Ok(Box::new(PermissionAction {
            decision: params.decision,
            reason: params.reason,
        }))
    }
}

struct PermissionAction {
    decision: PermissionDecision,
    reason: Option<String>,
}

#[async_trait]
impl Action for PermissionAction {
    async fn run(&self, _event: &Event, mut response: PartialResponse, ctx: &ActionContext) -> Result<Outcome> {
        let reason = self
            .reason
            .clone()
            .unwrap_or_else(|| format!("{} by tollgate mapping {}", self.decision, ctx.mapping_id));
        response.set_permission(self.decision, Some(reason));
        Ok(Outcome::Continue(response))
    }
}
