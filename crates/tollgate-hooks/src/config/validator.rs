//! Startup validation of the mapping table
//!
//! Resolves every mapping against the capability registry and the rule
//! catalog. After this step nothing in the table can fail to resolve at
//! event time.

use tracing::{debug, info};

use crate::{
    error::ConfigError,
    executor::ResolvedAction,
    matcher::RuleCatalog,
    registry::CapabilityRegistry,
    types::{Mapping, MappingSet},
};

/// A mapping set whose action flows have been prepared
#[derive(Debug, Default)]
pub struct ResolvedMappingSet {
    pub set: MappingSet,
    /// Prepared actions, indexed like `set.mappings`
    flows: Vec<Vec<ResolvedAction>>,
}

impl ResolvedMappingSet {
    /// Loaded mappings in load order
    pub fn mappings(&self) -> &[Mapping] {
        &self.set.mappings
    }

    /// Prepared actions of `mapping`
    pub fn flow(&self, mapping: &Mapping) -> &[ResolvedAction] {
        self.flows
            .get(mapping.order)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Validates mappings against the registry and the rule catalog
pub struct MappingValidator;

impl MappingValidator {
    /// Resolve every mapping, disabled ones included
    ///
    /// # Errors
    ///
    /// The first unknown capability, rejected parameter, unknown rule, or
    /// condition field outside the rule's whitelist.
    pub fn resolve(
        set: MappingSet,
        registry: &CapabilityRegistry,
        rules: &RuleCatalog,
    ) -> Result<ResolvedMappingSet, ConfigError> {
        let mut flows = Vec::with_capacity(set.mappings.len());

        for mapping in &set.mappings {
            Self::check_rule(mapping, rules)?;
            flows.push(Self::prepare_flow(mapping, registry)?);
            debug!(mapping = %mapping.id(), actions = mapping.action_flow.len(), "Mapping resolved");
        }

        info!(mappings = set.mappings.len(), "Mappings validated");
        Ok(ResolvedMappingSet { set, flows })
    }

    /// Check the rule exists and exposes every field the condition reads
    pub fn check_rule(mapping: &Mapping, rules: &RuleCatalog) -> Result<(), ConfigError> {
        let rule = rules.get(&mapping.rule).ok_or_else(|| ConfigError::UnknownRule {
            location: mapping.id(),
            rule: mapping.rule.clone(),
        })?;

        if let Some(condition) = &mapping.condition {
            if let Some(field) = condition.fields().into_iter().find(|f| !rule.exposes(f)) {
                return Err(ConfigError::FieldNotExposed {
                    location: mapping.id(),
                    field: field.to_string(),
                    rule: mapping.rule.clone(),
                });
            }
        }
        Ok(())
    }

    /// Prepare each action of the mapping's flow
    pub fn prepare_flow(
        mapping: &Mapping,
        registry: &CapabilityRegistry,
    ) -> Result<Vec<ResolvedAction>, ConfigError> {
        mapping
            .action_flow
            .iter()
            .map(|action_ref| -> Result<ResolvedAction, ConfigError> {
                let capability = registry.get(action_ref.capability()).ok_or_else(|| {
                    ConfigError::UnknownCapability {
                        location: mapping.id(),
                        capability: action_ref.capability().to_string(),
                    }
                })?;
                let action = capability.prepare(action_ref.parameter()).map_err(|message| {
                    ConfigError::InvalidAction {
                        location: mapping.id(),
                        action: action_ref.to_string(),
                        message,
                    }
                })?;
                Ok(ResolvedAction {
                    action_ref: action_ref.clone(),
                    action,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FileFormat, MappingLoader, Settings};
    use std::path::Path;

    fn load(content: &str) -> MappingSet {
        let mut set = MappingSet::default();
        MappingLoader::load_from_str(&mut set, content, FileFormat::Toml, Path::new("m.toml")).unwrap();
        set
    }

    fn resolve(content: &str) -> Result<ResolvedMappingSet, ConfigError> {
        MappingValidator::resolve(
            load(content),
            &CapabilityRegistry::with_builtins(&Settings::default()),
            &RuleCatalog::builtin(),
        )
    }

    #[test]
    fn test_resolves_flows() {
        let resolved = resolve(
            r#"
[[mappings]]
event = "PreToolUse"
rule = "bash"
condition = 'command ^= "rm "'
action_flow = ["command/trash", "permission/allow"]
"#,
        )
        .unwrap();
        let mapping = &resolved.mappings()[0];
        let flow = resolved.flow(mapping);
        assert_eq!(flow.len(), 2);
        assert_eq!(flow[0].action_ref.to_string(), "command/trash");
    }

    #[test]
    fn test_unknown_capability() {
        let err = resolve(
            "[[mappings]]\nevent = \"Stop\"\nrule = \"always\"\naction_flow = [\"teleport/home\"]\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownCapability { ref capability, .. } if capability == "teleport"));
    }

    #[test]
    fn test_rejected_parameter() {
        let err = resolve(
            "[[mappings]]\nevent = \"PreToolUse\"\nrule = \"bash\"\naction_flow = [\"permission/maybe\"]\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAction { ref location, .. } if location == "m.toml#1"));
    }

    #[test]
    fn test_unknown_rule() {
        let err = resolve(
            "[[mappings]]\nevent = \"Stop\"\nrule = \"lunar_phase\"\naction_flow = [\"block/no\"]\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownRule { .. }));
    }

    #[test]
    fn test_field_not_exposed() {
        let err = resolve(
            "[[mappings]]\nevent = \"UserPromptSubmit\"\nrule = \"prompt\"\ncondition = 'tool_name == \"Bash\"'\naction_flow = [\"analysis/prompt\"]\n",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::FieldNotExposed { ref field, ref rule, .. } if field == "tool_name" && rule == "prompt"
        ));
    }

    #[test]
    fn test_common_fields_always_exposed() {
        assert!(resolve(
            "[[mappings]]\nevent = \"SessionStart\"\nrule = \"session\"\ncondition = 'cwd ^= \"/work\" && source == \"startup\"'\naction_flow = [\"context/hello\"]\n",
        )
        .is_ok());
    }
}
