//! Inspection commands: validate, list, check, capabilities

use std::{fs, path::Path};

use anyhow::Context;
use serde_json::Value;
use tollgate_hooks::{CliOutput, HookCli, HookCommand, Settings};

/// Runs one inspection command against a configuration directory
pub struct InspectCommand {
    command: HookCommand,
}

impl InspectCommand {
    pub fn new(command: HookCommand) -> Self {
        Self { command }
    }

    /// Execute the command
    pub fn execute(self, config_dir: &Path, settings: Settings) -> anyhow::Result<CliOutput> {
        let cli = HookCli::new(config_dir, settings);
        cli.execute(self.command)
            .with_context(|| format!("Configuration in {}", config_dir.display()))
    }
}

/// Read a JSON payload from `path`
pub fn read_payload(path: &Path) -> anyhow::Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read payload {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_payload() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.json");
        fs::write(&good, r#"{"session_id": "s"}"#).unwrap();
        assert_eq!(read_payload(&good).unwrap()["session_id"], "s");

        let bad = dir.path().join("bad.json");
        fs::write(&bad, "not json").unwrap();
        assert!(read_payload(&bad).unwrap_err().to_string().contains("Invalid JSON"));
        assert!(read_payload(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_capabilities_without_config() {
        let dir = TempDir::new().unwrap();
        let output = InspectCommand::new(HookCommand::Capabilities { format: None })
            .execute(dir.path(), Settings::default())
            .unwrap();
        assert!(output.ok);
        assert!(output.output.contains("permission"));
    }
}
