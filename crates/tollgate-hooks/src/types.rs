//! Core data types for mapping configuration

use std::{fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{events::EventKind, matcher::Condition};

/// Reference to a capability invocation: `capability/parameter`
///
/// Splits on the first `/`, so parameters may themselves contain slashes
/// (paths, JSON). The parameter may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActionRef {
    capability: String,
    parameter: String,
}

impl ActionRef {
    /// Create a reference from its parts
    pub fn new(capability: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            parameter: parameter.into(),
        }
    }

    /// Capability name
    pub fn capability(&self) -> &str {
        &self.capability
    }

    /// Raw parameter text
    pub fn parameter(&self) -> &str {
        &self.parameter
    }
}

impl FromStr for ActionRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (capability, parameter) = match s.split_once('/') {
            Some((capability, parameter)) => (capability.trim(), parameter.trim()),
            None => (s, ""),
        };

        if capability.is_empty() {
            return Err(format!("action '{}' has no capability name", s));
        }
        if !capability
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
        {
            return Err(format!("invalid capability name '{}'", capability));
        }

        Ok(ActionRef::new(capability, parameter))
    }
}

impl TryFrom<String> for ActionRef {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ActionRef> for String {
    fn from(value: ActionRef) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ActionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parameter.is_empty() {
            f.write_str(&self.capability)
        } else {
            write!(f, "{}/{}", self.capability, self.parameter)
        }
    }
}

/// File-level switch of a mapping file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default = "default_true")]
    pub enable: bool,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self { enable: true }
    }
}

/// One `[[mappings]]` entry as written in a mapping file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingEntry {
    pub event: String,
    pub rule: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default)]
    pub action_flow: Vec<String>,
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default)]
    pub critical: bool,
}

/// A whole mapping file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingFile {
    #[serde(default)]
    pub config: FileConfig,
    #[serde(default)]
    pub mappings: Vec<MappingEntry>,
}

fn default_true() -> bool {
    true
}

/// A loaded mapping
///
/// Immutable once loaded. `order` is the position in the loaded set and is
/// the file-discovery-then-declaration order used for matching and merging.
#[derive(Debug, Clone, Serialize)]
pub struct Mapping {
    /// Mapping file the entry came from, relative to the mappings directory
    pub source: PathBuf,
    /// 1-based declaration index within the file
    pub index: usize,
    /// Position in the loaded set
    pub order: usize,
    pub event: EventKind,
    pub rule: String,
    /// Condition text exactly as written (trimmed), used for grouping
    pub condition_text: Option<String>,
    #[serde(skip)]
    pub condition: Option<Condition>,
    pub action_flow: Vec<ActionRef>,
    pub enabled: bool,
    pub critical: bool,
}

impl Mapping {
    /// Stable identifier, `<file>#<index>`
    pub fn id(&self) -> String {
        format!("{}#{}", self.source.display(), self.index)
    }

    /// Action flow rendered as strings
    pub fn flow_strings(&self) -> Vec<String> {
        self.action_flow.iter().map(ToString::to_string).collect()
    }
}

/// Every mapping loaded from the configuration directory
#[derive(Debug, Clone, Default)]
pub struct MappingSet {
    /// Mappings in file-discovery-then-declaration order
    pub mappings: Vec<Mapping>,
    /// Files that were read, in discovery order
    pub files: Vec<PathBuf>,
    /// Files skipped by `config.enable = false`
    pub disabled_files: Vec<PathBuf>,
}

impl MappingSet {
    /// Mappings declared for `kind`, enabled or not
    pub fn for_event(&self, kind: EventKind) -> impl Iterator<Item = &Mapping> {
        self.mappings.iter().filter(move |m| m.event == kind)
    }

    /// Number of enabled mappings
    pub fn enabled_count(&self) -> usize {
        self.mappings.iter().filter(|m| m.enabled).count()
    }
}
