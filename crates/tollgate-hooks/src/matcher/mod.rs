//! Rule matching
//!
//! Selects the mappings that apply to an event. A mapping matches when it is
//! enabled, declared for the event's kind, its rule passes, and its
//! condition (if any) evaluates to true. Every match is returned, in the
//! order the mappings were loaded.

pub mod condition;
pub mod rules;

use tracing::debug;

pub use condition::{CompareOp, Condition, ConditionError};
pub use rules::{BuiltinRule, Rule, RuleCatalog, COMMON_FIELDS};

use crate::{
    error::{HooksError, Result},
    events::Event,
    types::Mapping,
};

/// Return every mapping that matches `event`, in load order
///
/// A mapping naming a rule the catalog does not have fails with
/// [`HooksError::UnknownRule`], which is distinct from an empty match.
pub fn match_event<'a>(
    event: &Event,
    mappings: &'a [Mapping],
    rules: &RuleCatalog,
) -> Result<Vec<&'a Mapping>> {
    let mut matched = Vec::new();

    for mapping in mappings
        .iter()
        .filter(|m| m.enabled && m.event == event.kind())
    {
        let rule = rules
            .get(&mapping.rule)
            .ok_or_else(|| HooksError::UnknownRule(mapping.rule.clone()))?;

        if !rule.applies(event) {
            debug!(mapping = %mapping.id(), rule = %mapping.rule, "Rule did not apply");
            continue;
        }

        if let Some(condition) = &mapping.condition {
            if !condition.evaluate(event) {
                debug!(mapping = %mapping.id(), "Condition evaluated to false");
                continue;
            }
        }

        debug!(mapping = %mapping.id(), "Mapping matched");
        matched.push(mapping);
    }

    Ok(matched)
}
