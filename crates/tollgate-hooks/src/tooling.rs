//! Pure functions for external tooling
//!
//! Editors, linters and test harnesses can load a mapping table, ask which
//! mappings an event would match, and list conflicts without preparing any
//! capability or touching state.

use std::path::Path;

use crate::{error::Result, types::MappingSet};

pub use crate::{
    conflict::{detect_conflicts, Conflict, GroupKey},
    matcher::match_event,
};

/// Load and merge every mapping file under `<config_dir>/mappings/`
///
/// Action references are parsed but not resolved against the capability
/// registry.
pub fn load_mappings(config_dir: &Path) -> Result<MappingSet> {
    Ok(crate::config::MappingLoader::load_dir(config_dir)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{events::normalize_labeled, matcher::RuleCatalog};
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_match_and_conflicts() {
        let dir = TempDir::new().unwrap();
        let mappings = dir.path().join("mappings");
        fs::create_dir_all(&mappings).unwrap();
        fs::write(
            mappings.join("a.toml"),
            "[[mappings]]\nevent = \"PreToolUse\"\nrule = \"bash\"\naction_flow = [\"permission/allow\"]\n",
        )
        .unwrap();
        fs::write(
            mappings.join("b.yaml"),
            "mappings:\n  - event: PreToolUse\n    rule: bash\n    action_flow: [\"permission/deny\"]\n",
        )
        .unwrap();

        let set = load_mappings(dir.path()).unwrap();
        assert_eq!(set.mappings.len(), 2);

        let event = normalize_labeled(
            "PreToolUse",
            &json!({
                "session_id": "s", "transcript_path": "/t", "cwd": "/",
                "tool_name": "Bash", "tool_input": {"command": "ls"}
            }),
        )
        .unwrap();
        let matched = match_event(&event, &set.mappings, &RuleCatalog::builtin()).unwrap();
        assert_eq!(matched.len(), 2);

        let conflicts = detect_conflicts(&set.mappings);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].flows.len(), 2);
    }
}
