//! `context/<snippet or text>`: additional context injection
//!
//! The parameter names a `[[context]]` snippet from the settings. Anything
//! that is not a known snippet name is injected as literal text.

use async_trait::async_trait;

use super::{Action, ActionContext, ActionFamily, Capability};
use crate::{
    config::ContextSnippet, error::Result, events::Event, executor::Outcome,
    response::PartialResponse,
};

/// Appends configured or literal text to additionalContext
#[derive(Debug, Clone, Default)]
pub struct ContextCapability {
    snippets: Vec<ContextSnippet>,
}

impl ContextCapability {
    pub fn new(snippets: &[ContextSnippet]) -> Self {
        Self {
            snippets: snippets.to_vec(),
        }
    }
}

impl Capability for ContextCapability {
    fn name(&self) -> &'static str {
        "context"
    }

    fn family(&self) -> ActionFamily {
        ActionFamily::Context
    }

    fn description(&self) -> &'static str {
        "Inject a named snippet or literal text as additional context"
    }

    fn prepare(&self, parameter: &str) -> std::result::Result<Box<dyn Action>, String> {
        let parameter = parameter.trim();
        if parameter.is_empty() {
            return Err("context needs a snippet name or text".to_string());
        }
        let text = self
            .snippets
            .iter()
            .find(|s| s.name == parameter)
            .map(|s| s.text.clone())
            .unwrap_or_else(|| parameter.to_string());
        Ok(Box::new(ContextAction { text }))
    }
}

struct ContextAction {
    text: String,
}

#[async_trait]
impl Action for ContextAction {
    async fn run(&self, _event: &Event, mut response: PartialResponse, _ctx: &ActionContext) -> Result<Outcome> {
        response.push_context(self.text.clone());
        Ok(Outcome::Continue(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{normalize, EventKind};
    use serde_json::json;

    async fn context_of(capability: &ContextCapability, parameter: &str) -> Vec<String> {
        let event = normalize(
            EventKind::SessionStart,
            &json!({"session_id": "s", "transcript_path": "/t", "cwd": "/", "source": "startup"}),
        )
        .unwrap();
        let action = capability.prepare(parameter).unwrap();
        match action
            .run(&event, PartialResponse::new(), &ActionContext::in_memory())
            .await
            .unwrap()
        {
            Outcome::Continue(response) => response.additional_context,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_named_snippet_and_literal() {
        let capability = ContextCapability::new(&[ContextSnippet {
            name: "style".into(),
            text: "Prefer small commits.".into(),
        }]);
        assert_eq!(context_of(&capability, "style").await, vec!["Prefer small commits."]);
        assert_eq!(
            context_of(&capability, "Remember to run the linter").await,
            vec!["Remember to run the linter"]
        );
    }
}
