//! Property-based tests for persisted state
//!
//! Verifies that the state store behaves like a keyed register:
//! - Updates to one key never disturb another key
//! - A sequence of updates is observed in full after reopening the store
//! - The record log returns exactly what was appended, in order

use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tollgate_storage::{get_as, update_as, FileRecordLog, FileStateStore, RecordLog};

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
struct Counter {
    value: u64,
}

// Strategy for generating state keys in the shape capabilities use
fn key_strategy() -> impl Strategy<Value = String> {
    (
        prop::sample::select(vec!["conditional:rate_limit", "conditional:circuit_breaker"]),
        "[A-Za-z_*]{1,16}",
    )
        .prop_map(|(prefix, scope)| format!("{}:{}", prefix, scope))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Increments applied to a key are all visible after reopening
    #[test]
    fn prop_increments_survive_reopen(key in key_strategy(), steps in 1usize..12) {
        let dir = TempDir::new().unwrap();
        {
            let store = FileStateStore::new(dir.path());
            for _ in 0..steps {
                update_as::<Counter, _, _>(&store, &key, |c| c.value += 1).unwrap();
            }
        }

        let store = FileStateStore::new(dir.path());
        let counter: Option<Counter> = get_as(&store, &key).unwrap();
        prop_assert_eq!(counter.map(|c| c.value), Some(steps as u64));
    }

    /// Keys are isolated from each other
    #[test]
    fn prop_keys_are_isolated(a in key_strategy(), b in key_strategy(), n in 1u64..20) {
        prop_assume!(a != b);
        let dir = TempDir::new().unwrap();
        let store = FileStateStore::new(dir.path());

        update_as::<Counter, _, _>(&store, &a, |c| c.value = n).unwrap();
        update_as::<Counter, _, _>(&store, &b, |c| c.value = n + 100).unwrap();

        let read_a: Option<Counter> = get_as(&store, &a).unwrap();
        prop_assert_eq!(read_a.map(|c| c.value), Some(n));
    }

    /// The record log is append-only and ordered
    #[test]
    fn prop_record_log_keeps_order(values in prop::collection::vec(any::<i64>(), 0..10)) {
        let dir = TempDir::new().unwrap();
        let log = FileRecordLog::new(dir.path().join("records.jsonl"));

        for v in &values {
            log.append(&serde_json::json!({ "v": v })).unwrap();
        }

        let read: Vec<i64> = log
            .read_all()
            .unwrap()
            .iter()
            .filter_map(|r| r["v"].as_i64())
            .collect();
        prop_assert_eq!(read, values);
    }
}
