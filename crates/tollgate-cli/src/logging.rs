// Logging bootstrap and verbosity control

use std::{fs::OpenOptions, sync::Mutex};

use anyhow::Context;
use tollgate_hooks::config::{LogFormat, LoggingSettings};
use tracing_subscriber::{fmt::writer::BoxMakeWriter, EnvFilter};

/// Verbosity levels selected by `-q` and `-v`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum VerbosityLevel {
    /// Errors only
    Quiet,
    /// Whatever the settings say
    Normal,
    /// At least debug
    Verbose,
}

impl VerbosityLevel {
    /// Map CLI flags to a verbosity level; `quiet` wins over `verbose`
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        if quiet {
            VerbosityLevel::Quiet
        } else if verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }

    /// Filter directive for a configured level
    pub fn directive(&self, configured: &str) -> String {
        match self {
            VerbosityLevel::Quiet => "error".to_string(),
            VerbosityLevel::Normal => configured.to_string(),
            VerbosityLevel::Verbose => match configured.trim().to_ascii_lowercase().as_str() {
                "trace" => "trace".to_string(),
                _ => "debug".to_string(),
            },
        }
    }
}

/// Install the global tracing subscriber
///
/// Logs go to the configured file, or stderr. Stdout carries hook responses
/// and never receives log lines.
pub fn init_logging(settings: &LoggingSettings, verbosity: VerbosityLevel) -> anyhow::Result<()> {
    let directive = verbosity.directive(&settings.level);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("warn"));

    let (writer, ansi) = match &settings.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(false);

    let result = match settings.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.with_ansi(ansi).try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flags() {
        assert_eq!(VerbosityLevel::from_flags(false, false), VerbosityLevel::Normal);
        assert_eq!(VerbosityLevel::from_flags(true, false), VerbosityLevel::Verbose);
        assert_eq!(VerbosityLevel::from_flags(true, true), VerbosityLevel::Quiet);
    }

    #[test]
    fn test_directive() {
        assert_eq!(VerbosityLevel::Normal.directive("info"), "info");
        assert_eq!(VerbosityLevel::Quiet.directive("debug"), "error");
        assert_eq!(VerbosityLevel::Verbose.directive("warn"), "debug");
        assert_eq!(VerbosityLevel::Verbose.directive("TRACE"), "trace");
    }

    #[test]
    fn test_unopenable_log_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let settings = LoggingSettings {
            file: Some(dir.path().join("missing").join("tollgate.log")),
            ..LoggingSettings::default()
        };
        let err = init_logging(&settings, VerbosityLevel::Normal).unwrap_err();
        assert!(err.to_string().contains("Failed to open log file"));
    }
}
