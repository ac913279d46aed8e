//! Property Tests: Cross-Invocation State
//!
//! Every hook invocation is a fresh process. These tests build a new
//! pipeline per event over the same state directory, the way successive
//! invocations would, and check that counters survive in between.

use std::{fs, path::Path};

use proptest::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;
use tollgate_hooks::{EventPipeline, PermissionDecision, Settings};
use tollgate_storage::{FileRecordLog, RecordLog};

fn rate_limited_config(dir: &Path, limit: u32) {
    let mappings = dir.join("mappings");
    fs::create_dir_all(&mappings).unwrap();
    fs::write(
        mappings.join("limits.toml"),
        format!(
            "[[mappings]]\nevent = \"PreToolUse\"\nrule = \"bash\"\naction_flow = ['conditional/{{\"kind\":\"rate_limit\",\"limit\":{},\"window_secs\":3600}}', \"permission/allow\"]\n",
            limit
        ),
    )
    .unwrap();
}

fn settings_for(dir: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.state.dir = Some(dir.join("state"));
    settings
}

fn bash(session: &str) -> Value {
    json!({
        "session_id": session,
        "transcript_path": "/tmp/t.jsonl",
        "cwd": "/work",
        "tool_name": "Bash",
        "tool_input": {"command": "cargo build"}
    })
}

fn invoke(dir: &Path, payload: &Value) -> Option<PermissionDecision> {
    let pipeline = EventPipeline::from_settings(dir, settings_for(dir)).unwrap();
    tokio_block_on(pipeline.handle("PreToolUse", payload)).permission_decision()
}

fn tokio_block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Across fresh pipelines, exactly `limit` invocations pass the gate
    #[test]
    fn prop_rate_limit_survives_restarts(limit in 1u32..5, extra in 1u32..3) {
        let dir = TempDir::new().unwrap();
        rate_limited_config(dir.path(), limit);

        let payload = bash("persisted");
        let allowed = (0..limit + extra)
            .filter(|_| invoke(dir.path(), &payload) == Some(PermissionDecision::Allow))
            .count();

        prop_assert_eq!(allowed, limit as usize);
    }
}

#[tokio::test]
async fn test_memory_records_reach_the_log() {
    let dir = TempDir::new().unwrap();
    let mappings = dir.path().join("mappings");
    fs::create_dir_all(&mappings).unwrap();
    fs::write(
        mappings.join("memory.toml"),
        "[[mappings]]\nevent = \"PreToolUse\"\nrule = \"bash\"\naction_flow = [\"memory/record\"]\n",
    )
    .unwrap();

    for _ in 0..2 {
        let pipeline = EventPipeline::from_settings(dir.path(), settings_for(dir.path())).unwrap();
        let response = pipeline.handle("PreToolUse", &bash("logged")).await;
        assert!(response.is_empty());
    }

    let log = FileRecordLog::new(dir.path().join("state").join("records.jsonl"));
    let records = log.read_all().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["session_id"], "logged");
}
