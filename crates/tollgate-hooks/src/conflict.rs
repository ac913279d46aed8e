//! Conflict detection and deduplication
//!
//! Mappings are grouped by `(event, rule, condition)`, using the condition
//! text exactly as written. Within a group, action flows are compared as
//! ordered sequences: identical flows are duplicates and run once, differing
//! flows are a conflict.

use std::{collections::HashMap, path::PathBuf};

use serde::Serialize;

use crate::{
    events::EventKind,
    types::{ActionRef, Mapping},
};

/// Grouping key of a mapping
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GroupKey {
    pub event: EventKind,
    pub rule: String,
    pub condition: Option<String>,
}

impl GroupKey {
    /// Key of `mapping`
    pub fn of(mapping: &Mapping) -> Self {
        Self {
            event: mapping.event,
            rule: mapping.rule.clone(),
            condition: mapping
                .condition_text
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        }
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.condition {
            Some(condition) => write!(f, "{} / {} / {}", self.event, self.rule, condition),
            None => write!(f, "{} / {}", self.event, self.rule),
        }
    }
}

/// Mappings that share a key but disagree on their action flow
#[derive(Debug, Clone, Serialize)]
pub struct Conflict {
    pub key: GroupKey,
    /// Every file contributing to the group, first-seen order
    pub files: Vec<PathBuf>,
    /// Distinct action flows, first-seen order
    pub flows: Vec<Vec<ActionRef>>,
    /// Identifiers of every mapping in the group
    pub mappings: Vec<String>,
}

/// Report every conflicting group among the enabled mappings
pub fn detect_conflicts(mappings: &[Mapping]) -> Vec<Conflict> {
    let mut order: Vec<GroupKey> = Vec::new();
    let mut groups: HashMap<GroupKey, Vec<&Mapping>> = HashMap::new();

    for mapping in mappings.iter().filter(|m| m.enabled) {
        let key = GroupKey::of(mapping);
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(mapping);
    }

    order
        .into_iter()
        .filter_map(|key| {
            let members = groups.remove(&key)?;
            if members.len() < 2 {
                return None;
            }

            let mut flows: Vec<Vec<ActionRef>> = Vec::new();
            for member in &members {
                if !flows.contains(&member.action_flow) {
                    flows.push(member.action_flow.clone());
                }
            }
            if flows.len() < 2 {
                return None;
            }

            let mut files: Vec<PathBuf> = Vec::new();
            for member in &members {
                if !files.contains(&member.source) {
                    files.push(member.source.clone());
                }
            }

            Some(Conflict {
                key,
                files,
                flows,
                mappings: members.iter().map(|m| m.id()).collect(),
            })
        })
        .collect()
}

/// Drop later mappings that duplicate an earlier one's key and flow
pub fn dedupe<'a>(matched: Vec<&'a Mapping>) -> Vec<&'a Mapping> {
    let mut seen: Vec<(GroupKey, &[ActionRef])> = Vec::new();
    let mut kept = Vec::with_capacity(matched.len());

    for mapping in matched {
        let key = GroupKey::of(mapping);
        let duplicate = seen
            .iter()
            .any(|(k, flow)| *k == key && *flow == mapping.action_flow.as_slice());
        if duplicate {
            tracing::debug!(mapping = %mapping.id(), "Skipping duplicate mapping");
            continue;
        }
        seen.push((key, mapping.action_flow.as_slice()));
        kept.push(mapping);
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(file: &str, order: usize, condition: Option<&str>, flow: &[&str]) -> Mapping {
        Mapping {
            source: PathBuf::from(file),
            index: 1,
            order,
            event: EventKind::PreToolUse,
            rule: "bash".to_string(),
            condition_text: condition.map(str::to_string),
            condition: None,
            action_flow: flow.iter().map(|a| a.parse().unwrap()).collect(),
            enabled: true,
            critical: false,
        }
    }

    #[test]
    fn test_identical_flows_do_not_conflict() {
        let mappings = vec![
            mapping("a.toml", 0, Some("command ^= \"rm\""), &["command/trash", "permission/allow"]),
            mapping("b.toml", 1, Some("command ^= \"rm\""), &["command/trash", "permission/allow"]),
        ];
        assert!(detect_conflicts(&mappings).is_empty());
    }

    #[test]
    fn test_order_sensitive_flows_conflict() {
        let mappings = vec![
            mapping("a.toml", 0, None, &["command/trash", "permission/allow"]),
            mapping("b.toml", 1, None, &["permission/allow", "command/trash"]),
            mapping("c.toml", 2, None, &["command/trash", "permission/allow"]),
        ];
        let conflicts = detect_conflicts(&mappings);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(
            conflicts[0].files,
            vec![PathBuf::from("a.toml"), PathBuf::from("b.toml"), PathBuf::from("c.toml")]
        );
        assert_eq!(conflicts[0].flows.len(), 2);
    }

    #[test]
    fn test_literal_conditions_form_separate_groups() {
        let mappings = vec![
            mapping("a.toml", 0, Some("command ^= \"rm\""), &["permission/allow"]),
            mapping("b.toml", 1, Some("(command ^= \"rm\")"), &["permission/deny"]),
        ];
        assert!(detect_conflicts(&mappings).is_empty());
    }

    #[test]
    fn test_disabled_mappings_are_ignored() {
        let mut disabled = mapping("b.toml", 1, None, &["permission/deny"]);
        disabled.enabled = false;
        let mappings = vec![mapping("a.toml", 0, None, &["permission/allow"]), disabled];
        assert!(detect_conflicts(&mappings).is_empty());
    }

    #[test]
    fn test_dedupe_keeps_first_of_identical() {
        let a = mapping("a.toml", 0, None, &["permission/allow"]);
        let b = mapping("b.toml", 1, None, &["permission/allow"]);
        let c = mapping("c.toml", 2, None, &["permission/deny"]);
        let kept = dedupe(vec![&a, &b, &c]);
        let orders: Vec<usize> = kept.iter().map(|m| m.order).collect();
        assert_eq!(orders, vec![0, 2]);
    }
}
