//! Output formatting for inspection commands

use std::path::PathBuf;

use serde::Serialize;

use crate::{
    conflict::Conflict,
    error::Result,
    types::Mapping,
};

/// Flat view of a mapping for listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingSummary {
    pub id: String,
    pub event: String,
    pub rule: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    pub action_flow: Vec<String>,
    pub enabled: bool,
    pub critical: bool,
}

impl From<&Mapping> for MappingSummary {
    fn from(mapping: &Mapping) -> Self {
        Self {
            id: mapping.id(),
            event: mapping.event.to_string(),
            rule: mapping.rule.clone(),
            condition: mapping.condition_text.clone(),
            action_flow: mapping.flow_strings(),
            enabled: mapping.enabled,
            critical: mapping.critical,
        }
    }
}

/// Outcome of `validate`
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub files: Vec<PathBuf>,
    pub disabled_files: Vec<PathBuf>,
    pub mappings: usize,
    pub enabled: usize,
    pub conflicts: Vec<Conflict>,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.conflicts.is_empty() && self.errors.is_empty()
    }
}

/// One capability or rule in a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    pub description: String,
}

/// Registered capabilities and rules
#[derive(Debug, Clone, Default, Serialize)]
pub struct CatalogListing {
    pub capabilities: Vec<CatalogEntry>,
    pub rules: Vec<CatalogEntry>,
}

fn clip(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let head: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Format mappings as a table
pub fn format_mappings_table(mappings: &[MappingSummary]) -> String {
    if mappings.is_empty() {
        return "No mappings found".to_string();
    }

    let mut output = String::new();
    output.push_str("ID                       | Event              | Rule         | Status   | Action flow\n");
    output.push_str("-------------------------|--------------------|--------------|----------|------------\n");

    for mapping in mappings {
        let status = match (mapping.enabled, mapping.critical) {
            (false, _) => "Disabled",
            (true, true) => "Critical",
            (true, false) => "Enabled",
        };
        output.push_str(&format!(
            "{:<24} | {:<18} | {:<12} | {:<8} | {}\n",
            clip(&mapping.id, 24),
            mapping.event,
            clip(&mapping.rule, 12),
            status,
            mapping.action_flow.join(" -> ")
        ));
        if let Some(condition) = &mapping.condition {
            output.push_str(&format!("{:<24} |   when {}\n", "", condition));
        }
    }

    output
}

/// Format mappings as JSON
pub fn format_mappings_json(mappings: &[MappingSummary]) -> Result<String> {
    Ok(serde_json::to_string_pretty(mappings)?)
}

/// Format a validation report as text
pub fn format_validation_table(report: &ValidationReport) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "Files:     {} loaded, {} disabled\n",
        report.files.len(),
        report.disabled_files.len()
    ));
    output.push_str(&format!(
        "Mappings:  {} ({} enabled)\n",
        report.mappings, report.enabled
    ));

    for error in &report.errors {
        output.push_str(&format!("✗ {}\n", error));
    }

    for conflict in &report.conflicts {
        output.push_str(&format!("✗ Conflict on {}\n", conflict.key));
        output.push_str(&format!("    mappings: {}\n", conflict.mappings.join(", ")));
        for flow in conflict_flows(conflict) {
            output.push_str(&format!("    flow:     {}\n", flow));
        }
    }

    if report.is_ok() {
        output.push_str("✓ No conflicts\n");
    }
    output
}

fn conflict_flows(conflict: &Conflict) -> Vec<String> {
    conflict
        .flows
        .iter()
        .map(|flow| {
            flow.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" -> ")
        })
        .collect()
}

/// Format a validation report as JSON
pub fn format_validation_json(report: &ValidationReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Format a capability and rule listing as a table
pub fn format_catalog_table(listing: &CatalogListing) -> String {
    let mut output = String::new();
    output.push_str("Capabilities:\n");
    for entry in &listing.capabilities {
        output.push_str(&format!(
            "  {:<14} {:<16} {}\n",
            entry.name,
            entry.family.as_deref().unwrap_or(""),
            entry.description
        ));
    }
    output.push_str("Rules:\n");
    for entry in &listing.rules {
        output.push_str(&format!("  {:<14} {}\n", entry.name, entry.description));
    }
    output
}

/// Format a capability and rule listing as JSON
pub fn format_catalog_json(listing: &CatalogListing) -> Result<String> {
    Ok(serde_json::to_string_pretty(listing)?)
}
