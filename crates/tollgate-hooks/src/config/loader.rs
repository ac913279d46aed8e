//! Mapping file loader
//!
//! Reads every `.toml`, `.yaml` and `.yml` file in `<config dir>/mappings/`
//! in lexicographic file-name order and turns each `[[mappings]]` entry into
//! a typed [`Mapping`]: the event label becomes an [`EventKind`], the
//! condition is parsed into a [`Condition`] tree, and each action string
//! becomes an [`ActionRef`]. Capabilities and rules are not looked up here;
//! that is the validator's job.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};

use crate::{
    error::ConfigError,
    events::EventKind,
    matcher::{Condition, ConditionError},
    types::{ActionRef, Mapping, MappingEntry, MappingFile, MappingSet},
};

/// Subdirectory of the configuration directory holding mapping files
pub const MAPPINGS_DIR: &str = "mappings";

/// Mapping file syntax
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Toml,
    Yaml,
}

impl FileFormat {
    /// Format implied by the file extension, if it is a mapping file
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Some(FileFormat::Toml),
            Some("yaml") | Some("yml") => Some(FileFormat::Yaml),
            _ => None,
        }
    }
}

/// Loads mapping files into a [`MappingSet`]
pub struct MappingLoader;

impl MappingLoader {
    /// Load `<config_dir>/mappings/`
    ///
    /// A missing directory yields an empty set.
    pub fn load_dir(config_dir: &Path) -> Result<MappingSet, ConfigError> {
        Self::load_mappings_dir(&config_dir.join(MAPPINGS_DIR))
    }

    /// Load every mapping file directly under `dir`
    pub fn load_mappings_dir(dir: &Path) -> Result<MappingSet, ConfigError> {
        let mut set = MappingSet::default();

        if !dir.is_dir() {
            debug!(dir = %dir.display(), "No mappings directory");
            return Ok(set);
        }

        for path in Self::discover(dir)? {
            let content = fs::read_to_string(&path).map_err(|e| ConfigError::Read {
                path: path.clone(),
                message: e.to_string(),
            })?;
            let source = path
                .strip_prefix(dir)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| path.clone());
            let format = FileFormat::from_path(&path).unwrap_or(FileFormat::Toml);
            Self::load_from_str(&mut set, &content, format, &source)?;
        }

        info!(
            files = set.files.len(),
            disabled = set.disabled_files.len(),
            mappings = set.mappings.len(),
            "Loaded mappings"
        );
        Ok(set)
    }

    /// Mapping files under `dir`, sorted by file name
    pub fn discover(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
        let entries = fs::read_dir(dir).map_err(|e| ConfigError::Read {
            path: dir.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ConfigError::Read {
                path: dir.to_path_buf(),
                message: e.to_string(),
            })?;
            let path = entry.path();
            if path.is_file() && FileFormat::from_path(&path).is_some() {
                files.push(path);
            }
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }

    /// Parse one file's text and append its mappings to `set`
    ///
    /// `source` names the file in mapping identifiers and diagnostics.
    pub fn load_from_str(
        set: &mut MappingSet,
        content: &str,
        format: FileFormat,
        source: &Path,
    ) -> Result<(), ConfigError> {
        let file = Self::parse_file(content, format, source)?;

        if !file.config.enable {
            info!(file = %source.display(), "Mapping file disabled");
            set.disabled_files.push(source.to_path_buf());
            return Ok(());
        }

        for (i, entry) in file.mappings.into_iter().enumerate() {
            let order = set.mappings.len();
            let mapping = Self::build_mapping(entry, source, i + 1, order)?;
            set.mappings.push(mapping);
        }
        set.files.push(source.to_path_buf());
        Ok(())
    }

    /// Deserialize a mapping file
    pub fn parse_file(content: &str, format: FileFormat, source: &Path) -> Result<MappingFile, ConfigError> {
        if content.trim().is_empty() {
            return Ok(MappingFile::default());
        }

        let parsed = match format {
            FileFormat::Toml => toml::from_str::<MappingFile>(content).map_err(|e| e.to_string()),
            FileFormat::Yaml => {
                serde_yaml::from_str::<MappingFile>(content).map_err(|e| e.to_string())
            }
        };
        parsed.map_err(|message| ConfigError::Parse {
            path: source.to_path_buf(),
            message,
        })
    }

    fn build_mapping(
        entry: MappingEntry,
        source: &Path,
        index: usize,
        order: usize,
    ) -> Result<Mapping, ConfigError> {
        let location = format!("{}#{}", source.display(), index);

        let event: EventKind = entry
            .event
            .trim()
            .parse()
            .map_err(|_| ConfigError::UnknownEvent {
                location: location.clone(),
                kind: entry.event.clone(),
            })?;

        let condition_text = entry
            .condition
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        let condition = condition_text
            .as_deref()
            .map(Condition::parse)
            .transpose()
            .map_err(|e| match e {
                ConditionError::UnknownOperator(operator) => ConfigError::UnknownOperator {
                    location: location.clone(),
                    operator,
                },
                other => ConfigError::InvalidCondition {
                    location: location.clone(),
                    message: other.to_string(),
                },
            })?;

        let action_flow = entry
            .action_flow
            .iter()
            .map(|action| {
                action.parse::<ActionRef>().map_err(|message| ConfigError::InvalidAction {
                    location: location.clone(),
                    action: action.clone(),
                    message,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if action_flow.is_empty() {
            warn!(mapping = %location, "Mapping has an empty action flow");
        }

        Ok(Mapping {
            source: source.to_path_buf(),
            index,
            order,
            event,
            rule: entry.rule.trim().to_string(),
            condition_text,
            condition,
            action_flow,
            enabled: entry.enable,
            critical: entry.critical,
        })
    }
}
