//! Property-based tests for rule matching
//!
//! These tests check that:
//! - matches come back in load order and only for the event's kind
//! - disabled mappings never match
//! - prefix and contains conditions agree with plain string operations
//! - a condition is a pure function of the event
//! - spacing around operators does not change a condition's meaning

use std::path::PathBuf;

use proptest::prelude::*;
use serde_json::json;
use tollgate_hooks::{
    events::{normalize, Event, EventKind},
    matcher::{match_event, Condition, RuleCatalog},
    types::{ActionRef, Mapping},
};

// Strategy for command text that needs no escaping inside a literal
fn command_strategy() -> impl Strategy<Value = String> {
    r"[a-z0-9 ./_-]{0,40}"
}

fn tool_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Bash".to_string()),
        Just("Edit".to_string()),
        Just("Write".to_string()),
        Just("Read".to_string()),
        "[A-Z][a-zA-Z]{2,10}",
    ]
}

fn kind_strategy() -> impl Strategy<Value = EventKind> {
    prop_oneof![
        Just(EventKind::PreToolUse),
        Just(EventKind::PostToolUse),
        Just(EventKind::Stop),
        Just(EventKind::Notification),
    ]
}

fn tool_event(tool: &str, command: &str) -> Event {
    normalize(
        EventKind::PreToolUse,
        &json!({
            "session_id": "s", "transcript_path": "/t", "cwd": "/",
            "tool_name": tool, "tool_input": {"command": command}
        }),
    )
    .unwrap()
}

fn mapping(order: usize, event: EventKind, rule: &str, condition: Option<&str>, enabled: bool) -> Mapping {
    Mapping {
        source: PathBuf::from("props.toml"),
        index: order + 1,
        order,
        event,
        rule: rule.to_string(),
        condition_text: condition.map(str::to_string),
        condition: condition.map(|c| Condition::parse(c).unwrap()),
        action_flow: vec![ActionRef::new("permission", "allow")],
        enabled,
        critical: false,
    }
}

proptest! {
    /// Matches are a load-ordered subset restricted to the event's kind
    #[test]
    fn prop_matches_preserve_order(
        tool in tool_strategy(),
        command in command_strategy(),
        specs in prop::collection::vec((kind_strategy(), any::<bool>()), 0..12),
    ) {
        let event = tool_event(&tool, &command);
        let mappings: Vec<Mapping> = specs
            .iter()
            .enumerate()
            .map(|(i, (kind, enabled))| mapping(i, *kind, "always", None, *enabled))
            .collect();

        let matched = match_event(&event, &mappings, &RuleCatalog::builtin()).unwrap();

        let expected: Vec<usize> = mappings
            .iter()
            .filter(|m| m.enabled && m.event == EventKind::PreToolUse)
            .map(|m| m.order)
            .collect();
        let actual: Vec<usize> = matched.iter().map(|m| m.order).collect();
        prop_assert_eq!(actual, expected);
    }

    /// `^=` and `*=` agree with starts_with and contains
    #[test]
    fn prop_prefix_and_contains(
        command in command_strategy(),
        needle in r"[a-z0-9 ]{0,6}",
    ) {
        let event = tool_event("Bash", &command);

        let prefix = Condition::parse(&format!("command ^= \"{}\"", needle)).unwrap();
        prop_assert_eq!(prefix.evaluate(&event), command.starts_with(&needle));

        let contains = Condition::parse(&format!("command *= \"{}\"", needle)).unwrap();
        prop_assert_eq!(contains.evaluate(&event), command.contains(&needle));

        let negated = Condition::parse(&format!("!(command *= \"{}\")", needle)).unwrap();
        prop_assert_eq!(negated.evaluate(&event), !command.contains(&needle));
    }

    /// The bash rule passes exactly for Bash tool calls
    #[test]
    fn prop_bash_rule(tool in tool_strategy(), command in command_strategy()) {
        let event = tool_event(&tool, &command);
        let mappings = vec![mapping(0, EventKind::PreToolUse, "bash", None, true)];
        let matched = match_event(&event, &mappings, &RuleCatalog::builtin()).unwrap();
        prop_assert_eq!(matched.len() == 1, tool == "Bash");
    }

    /// Evaluating twice gives the same answer
    #[test]
    fn prop_evaluation_is_pure(command in command_strategy(), needle in r"[a-z]{1,4}") {
        let event = tool_event("Bash", &command);
        let condition = Condition::parse(&format!(
            "command ~= \"^{}\" || tool_name == \"Bash\" && command != \"{}\"",
            needle, needle
        ))
        .unwrap();
        prop_assert_eq!(condition.evaluate(&event), condition.evaluate(&event));
    }

    /// Dropping the spaces around `&&` and `!` keeps the meaning
    #[test]
    fn prop_unspaced_negation(tool in tool_strategy(), command in command_strategy(), needle in r"[a-z]{1,4}") {
        let event = tool_event(&tool, &command);
        let spaced = Condition::parse(&format!(
            "tool_name == \"Bash\" && ! command ^= \"{}\"", needle
        ))
        .unwrap();
        let tight = Condition::parse(&format!(
            "tool_name == \"Bash\" &&!command ^= \"{}\"", needle
        ))
        .unwrap();
        let expected = tool == "Bash" && !command.starts_with(&needle);
        prop_assert_eq!(spaced.evaluate(&event), expected);
        prop_assert_eq!(tight.evaluate(&event), expected);
    }
}

#[test]
fn test_unknown_rule_is_an_error() {
    let event = tool_event("Bash", "ls");
    let mappings = vec![mapping(0, EventKind::PreToolUse, "lunar_phase", None, true)];
    assert!(match_event(&event, &mappings, &RuleCatalog::builtin()).is_err());
}
