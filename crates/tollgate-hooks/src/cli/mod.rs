//! CLI commands for inspecting a configuration
//!
//! Validation, listing, dry-run matching and catalog listings. None of these
//! run an action flow or touch persisted state.

pub mod commands;
pub mod formatter;

pub use commands::{check, list_mappings, validate, HookCommand};
pub use formatter::{
    format_catalog_json, format_catalog_table, format_mappings_json, format_mappings_table,
    format_validation_json, format_validation_table, CatalogEntry, CatalogListing, MappingSummary,
    ValidationReport,
};

use std::path::{Path, PathBuf};

use crate::{
    config::{MappingLoader, MappingValidator, Settings},
    conflict::detect_conflicts,
    error::Result,
    events::{normalize_labeled, EventKind},
    matcher::{match_event, RuleCatalog},
    registry::CapabilityRegistry,
};

/// Rendered command output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOutput {
    pub output: String,
    /// False when the command found problems (conflicts, config errors)
    pub ok: bool,
}

impl CliOutput {
    fn ok(output: String) -> Self {
        Self { output, ok: true }
    }
}

/// Inspection CLI over one configuration directory
pub struct HookCli {
    config_dir: PathBuf,
    settings: Settings,
    rules: RuleCatalog,
}

impl HookCli {
    /// Create a CLI for `config_dir`
    pub fn new(config_dir: impl Into<PathBuf>, settings: Settings) -> Self {
        Self {
            config_dir: config_dir.into(),
            settings,
            rules: RuleCatalog::builtin(),
        }
    }

    /// Configuration directory in use
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Execute a command
    ///
    /// # Errors
    ///
    /// `List` and `Check` fail on configuration errors; `Check` also fails
    /// on an invalid payload. `Validate` reports errors in its output instead.
    pub fn execute(&self, command: HookCommand) -> Result<CliOutput> {
        let json = command.wants_json();
        match command {
            HookCommand::Validate { .. } => {
                let report = self.validate();
                let output = if json {
                    format_validation_json(&report)?
                } else {
                    format_validation_table(&report)
                };
                Ok(CliOutput {
                    output,
                    ok: report.is_ok(),
                })
            }
            HookCommand::List { event, .. } => {
                let kind = event.as_deref().map(str::parse::<EventKind>).transpose()?;
                let set = MappingLoader::load_dir(&self.config_dir)?;
                let summaries: Vec<MappingSummary> = set
                    .mappings
                    .iter()
                    .filter(|m| kind.map_or(true, |k| m.event == k))
                    .map(MappingSummary::from)
                    .collect();
                Ok(CliOutput::ok(if json {
                    format_mappings_json(&summaries)?
                } else {
                    format_mappings_table(&summaries)
                }))
            }
            HookCommand::Check { kind, payload, .. } => {
                let event = normalize_labeled(&kind, &payload)?;
                let set = MappingLoader::load_dir(&self.config_dir)?;
                let matched = match_event(&event, &set.mappings, &self.rules)?;
                let summaries: Vec<MappingSummary> =
                    matched.into_iter().map(MappingSummary::from).collect();
                Ok(CliOutput::ok(if json {
                    format_mappings_json(&summaries)?
                } else {
                    format_mappings_table(&summaries)
                }))
            }
            HookCommand::Capabilities { .. } => {
                let listing = self.catalog();
                Ok(CliOutput::ok(if json {
                    format_catalog_json(&listing)?
                } else {
                    format_catalog_table(&listing)
                }))
            }
        }
    }

    /// Load, resolve and look for conflicts
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        let set = match MappingLoader::load_dir(&self.config_dir) {
            Ok(set) => set,
            Err(e) => {
                report.errors.push(e.to_string());
                return report;
            }
        };

        report.files = set.files.clone();
        report.disabled_files = set.disabled_files.clone();
        report.mappings = set.mappings.len();
        report.enabled = set.enabled_count();

        // Resolve mapping by mapping so every bad reference is reported
        let registry = CapabilityRegistry::with_builtins(&self.settings);
        for mapping in &set.mappings {
            if let Err(e) = MappingValidator::check_rule(mapping, &self.rules) {
                report.errors.push(e.to_string());
            }
            if let Err(e) = MappingValidator::prepare_flow(mapping, &registry) {
                report.errors.push(e.to_string());
            }
        }

        report.conflicts = detect_conflicts(&set.mappings);
        report
    }

    /// Registered capabilities and rules
    pub fn catalog(&self) -> CatalogListing {
        let registry = CapabilityRegistry::with_builtins(&self.settings);
        CatalogListing {
            capabilities: registry
                .iter()
                .map(|c| CatalogEntry {
                    name: c.name().to_string(),
                    family: Some(c.family().to_string()),
                    description: c.description().to_string(),
                })
                .collect(),
            rules: self
                .rules
                .iter()
                .map(|r| CatalogEntry {
                    name: r.name().to_string(),
                    family: None,
                    description: r.description().to_string(),
                })
                .collect(),
        }
    }
}
