//! Engine settings
//!
//! Read from `config.toml` in the configuration directory. Every key is
//! optional. `TOLLGATE_*` environment variables override the logging table.

use std::{
    collections::{HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error::ConfigError, response::DEFAULT_CONTEXT_SEPARATOR};

/// Name of the settings file inside the configuration directory
pub const SETTINGS_FILE: &str = "config.toml";

/// Engine settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub state: StateSettings,
    pub timeouts: TimeoutSettings,
    pub retry: RetrySettings,
    pub merge: MergeSettings,
    pub ai: CommandSettings,
    pub notification: CommandSettings,
    pub rewrites: Vec<RewriteRule>,
    pub context: Vec<ContextSnippet>,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub file: Option<PathBuf>,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StateSettings {
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub notification_ms: u64,
    pub ai_ms: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            notification_ms: 5_000,
            ai_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Attempts per action, the first one included
    pub max_attempts: u32,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            max_delay_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeSettings {
    pub context_separator: String,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            context_separator: DEFAULT_CONTEXT_SEPARATOR.to_string(),
        }
    }
}

/// External command given as argv
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandSettings {
    pub command: Vec<String>,
}

/// Unsafe-command rewrite
///
/// When `field` of the tool input matches `pattern` and does not already
/// start with `prefix`, the prefix is prepended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteRule {
    pub name: String,
    #[serde(default = "default_rewrite_field")]
    pub field: String,
    pub pattern: String,
    pub prefix: String,
}

fn default_rewrite_field() -> String {
    "command".to_string()
}

impl RewriteRule {
    /// Route `rm` through `trash`
    pub fn trash() -> Self {
        Self {
            name: "trash".to_string(),
            field: default_rewrite_field(),
            pattern: r"^\s*rm\s".to_string(),
            prefix: "trash ".to_string(),
        }
    }
}

/// Named block of text for the `context` capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSnippet {
    pub name: String,
    pub text: String,
}

impl Settings {
    /// Load `config.toml` from `config_dir`, or defaults when absent
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let path = config_dir.join(SETTINGS_FILE);
        if !path.exists() {
            debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::Read {
            path: path.clone(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content, &path)
    }

    /// Parse and validate settings text
    pub fn from_toml_str(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Settings(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for rule in &self.rewrites {
            if !names.insert(rule.name.as_str()) {
                return Err(ConfigError::Settings(format!(
                    "duplicate rewrite '{}'",
                    rule.name
                )));
            }
            Regex::new(&rule.pattern).map_err(|e| {
                ConfigError::Settings(format!("rewrite '{}' has an invalid pattern: {}", rule.name, e))
            })?;
            if rule.prefix.trim().is_empty() {
                return Err(ConfigError::Settings(format!(
                    "rewrite '{}' has an empty prefix",
                    rule.name
                )));
            }
            if rule.prefix.starts_with(char::is_whitespace) {
                return Err(ConfigError::Settings(format!(
                    "rewrite '{}' prefix must not start with whitespace",
                    rule.name
                )));
            }
        }

        let mut names = HashSet::new();
        for snippet in &self.context {
            if !names.insert(snippet.name.as_str()) {
                return Err(ConfigError::Settings(format!(
                    "duplicate context snippet '{}'",
                    snippet.name
                )));
            }
        }

        Ok(())
    }

    /// Built-in rewrites followed by configured ones; a configured rewrite
    /// replaces a built-in of the same name
    pub fn rewrite_rules(&self) -> Vec<RewriteRule> {
        let mut rules: Vec<RewriteRule> = std::iter::once(RewriteRule::trash())
            .filter(|builtin| !self.rewrites.iter().any(|r| r.name == builtin.name))
            .collect();
        rules.extend(self.rewrites.iter().cloned());
        rules
    }

    /// Snippet by name
    pub fn snippet(&self, name: &str) -> Option<&ContextSnippet> {
        self.context.iter().find(|s| s.name == name)
    }

    /// Apply `TOLLGATE_*` variables from the process environment
    pub fn apply_env(&mut self) {
        let vars: HashMap<String, String> = std::env::vars()
            .filter(|(key, _)| key.starts_with(ENV_PREFIX))
            .collect();
        self.apply_overrides(&vars);
    }

    /// Apply environment-style overrides
    pub fn apply_overrides(&mut self, vars: &HashMap<String, String>) {
        if let Some(level) = vars.get("TOLLGATE_LOG_LEVEL").filter(|v| !v.is_empty()) {
            self.logging.level = level.clone();
        }
        if let Some(file) = vars.get("TOLLGATE_LOG_FILE").filter(|v| !v.is_empty()) {
            self.logging.file = Some(PathBuf::from(file));
        }
        if let Some(format) = vars.get("TOLLGATE_LOG_FORMAT") {
            match format.parse() {
                Ok(format) => self.logging.format = format,
                Err(e) => debug!(error = %e, "Ignoring TOLLGATE_LOG_FORMAT"),
            }
        }
        if vars
            .get("TOLLGATE_DEBUG")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false)
        {
            self.logging.level = "debug".to_string();
        }
    }
}

const ENV_PREFIX: &str = "TOLLGATE_";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.logging.level, "warn");
        assert_eq!(settings.timeouts.notification_ms, 5_000);
        assert_eq!(settings.timeouts.ai_ms, 30_000);
        assert_eq!(settings.retry.max_attempts, 2);
        assert_eq!(settings.merge.context_separator, "\n\n");
        assert_eq!(settings.rewrite_rules(), vec![RewriteRule::trash()]);
    }

    #[test]
    fn test_parse_full_file() {
        let settings = Settings::from_toml_str(
            r#"
            [logging]
            level = "info"
            format = "json"

            [timeouts]
            notification_ms = 100

            [merge]
            context_separator = "\n---\n"

            [ai]
            command = ["llm", "--json"]

            [[rewrites]]
            name = "no-force-push"
            pattern = 'git\s+push\s+--force'
            prefix = "echo "

            [[context]]
            name = "style"
            text = "Use four-space indentation."
            "#,
            Path::new("config.toml"),
        )
        .unwrap();

        assert_eq!(settings.logging.format, LogFormat::Json);
        assert_eq!(settings.timeouts.notification_ms, 100);
        assert_eq!(settings.timeouts.ai_ms, 30_000);
        assert_eq!(settings.ai.command, vec!["llm", "--json"]);
        assert_eq!(settings.rewrite_rules().len(), 2);
        assert_eq!(settings.rewrites[0].field, "command");
        assert_eq!(settings.snippet("style").unwrap().text, "Use four-space indentation.");
    }

    #[test]
    fn test_configured_rewrite_replaces_builtin() {
        let settings = Settings {
            rewrites: vec![RewriteRule {
                name: "trash".into(),
                field: "command".into(),
                pattern: r"^rm\s".into(),
                prefix: "gio trash ".into(),
            }],
            ..Settings::default()
        };
        let rules = settings.rewrite_rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].prefix, "gio trash ");
    }

    #[test]
    fn test_invalid_settings() {
        let bad_regex = Settings::from_toml_str(
            "[[rewrites]]\nname = \"x\"\npattern = \"([\"\nprefix = \"y \"\n",
            Path::new("config.toml"),
        );
        assert!(matches!(bad_regex, Err(ConfigError::Settings(_))));

        let duplicate = Settings::from_toml_str(
            "[[context]]\nname = \"a\"\ntext = \"1\"\n[[context]]\nname = \"a\"\ntext = \"2\"\n",
            Path::new("config.toml"),
        );
        assert!(matches!(duplicate, Err(ConfigError::Settings(_))));

        let padded = Settings::from_toml_str(
            "[[rewrites]]\nname = \"x\"\npattern = \"rm\"\nprefix = \" echo \"\n",
            Path::new("config.toml"),
        );
        assert!(matches!(padded, Err(ConfigError::Settings(m)) if m.contains("whitespace")));

        let blank = Settings::from_toml_str(
            "[[rewrites]]\nname = \"x\"\npattern = \"rm\"\nprefix = \"  \"\n",
            Path::new("config.toml"),
        );
        assert!(matches!(blank, Err(ConfigError::Settings(_))));

        let zero = Settings::from_toml_str("[retry]\nmax_attempts = 0\n", Path::new("config.toml"));
        assert!(matches!(zero, Err(ConfigError::Settings(_))));

        let malformed = Settings::from_toml_str("[logging", Path::new("config.toml"));
        assert!(matches!(malformed, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();
        let mut vars = HashMap::new();
        vars.insert("TOLLGATE_LOG_LEVEL".to_string(), "info".to_string());
        vars.insert("TOLLGATE_LOG_FORMAT".to_string(), "json".to_string());
        vars.insert("TOLLGATE_LOG_FILE".to_string(), "/tmp/tollgate.log".to_string());
        settings.apply_overrides(&vars);
        assert_eq!(settings.logging.level, "info");
        assert_eq!(settings.logging.format, LogFormat::Json);
        assert_eq!(settings.logging.file, Some(PathBuf::from("/tmp/tollgate.log")));

        vars.insert("TOLLGATE_DEBUG".to_string(), "1".to_string());
        settings.apply_overrides(&vars);
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings.retry.max_delay_ms, 2_000);
    }
}
