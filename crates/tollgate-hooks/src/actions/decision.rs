//! `block/<reason>`: top-level block decision

use async_trait::async_trait;

use super::{Action, ActionContext, ActionFamily, Capability};
use crate::{error::Result, events::Event, executor::Outcome, response::PartialResponse};

/// Sets `decision = "block"` with a reason
#[derive(Debug, Default)]
pub struct BlockCapability;

impl Capability for BlockCapability {
    fn name(&self) -> &'static str {
        "block"
    }

    fn family(&self) -> ActionFamily {
        ActionFamily::Decision
    }

    fn description(&self) -> &'static str {
        "Block the event with a reason shown to the agent"
    }

    fn prepare(&self, parameter: &str) -> std::result::Result<Box<dyn Action>, String> {
        let reason = parameter.trim();
        if reason.is_empty() {
            return Err("block needs a reason".to_string());
        }
        Ok(Box::new(BlockAction {
            reason: reason.to_string(),
        }))
    }
}

struct BlockAction {
    reason: String,
}

#[async_trait]
impl Action for BlockAction {
    async fn run(&self, _event: &Event, mut response: PartialResponse, _ctx: &ActionContext) -> Result<Outcome> {
        response.block(self.reason.clone());
        Ok(Outcome::Continue(response))
    }
}
