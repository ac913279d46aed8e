// Command routing and dispatch

use std::{
    io::{self, Read, Write},
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tollgate_hooks::{ConfigError, HookCommand, Settings};
use tollgate_storage::PathResolver;
use tracing::{debug, warn};

use crate::{
    commands::{read_payload, InspectCommand, RunCommand, RunOutput},
    logging::{init_logging, VerbosityLevel},
};

/// Tollgate - lifecycle-hook gatekeeper for coding agents
#[derive(Parser, Debug)]
#[command(name = "tollgate")]
#[command(bin_name = "tollgate")]
#[command(about = "Lifecycle-hook gatekeeper for coding agents")]
#[command(
    long_about = "Tollgate reads one hook event from stdin, runs the action flows of every matching mapping and prints one JSON response.\n\nMappings live in <config dir>/mappings/*.toml (or .yaml).\n\n  • tollgate run             Handle a hook event (default command)\n  • tollgate validate        Check mappings and report conflicts\n  • tollgate list            List loaded mappings\n  • tollgate check KIND ...  Dry-run a payload\n  • tollgate capabilities    List capabilities and rules"
)]
#[command(version)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration directory (default: $TOLLGATE_CONFIG_DIR, ./.tollgate or ~/.tollgate)
    #[arg(long, global = true, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Handle one hook event from stdin
    #[command(about = "Read a hook payload from stdin and print the response")]
    Run {
        /// Event kind (default: the payload's hook_event_name)
        #[arg(value_name = "KIND")]
        kind: Option<String>,
    },

    /// Validate mappings and report conflicts
    #[command(about = "Load and resolve every mapping and report conflicts")]
    Validate {
        /// Output format (table or json)
        #[arg(long, value_parser = ["table", "json"])]
        format: Option<String>,
    },

    /// List loaded mappings
    #[command(about = "List loaded mappings")]
    List {
        /// Only mappings for this event kind
        #[arg(long, value_name = "KIND")]
        event: Option<String>,

        /// Output format (table or json)
        #[arg(long, value_parser = ["table", "json"])]
        format: Option<String>,
    },

    /// Show which mappings a payload would match
    #[command(about = "Dry-run a payload against the mappings without executing them")]
    Check {
        /// Event kind
        #[arg(value_name = "KIND")]
        kind: String,

        /// File holding the JSON payload
        #[arg(long, value_name = "FILE")]
        payload: PathBuf,

        /// Output format (table or json)
        #[arg(long, value_parser = ["table", "json"])]
        format: Option<String>,
    },

    /// List registered capabilities and rules
    #[command(about = "List registered capabilities and rules")]
    Capabilities {
        /// Output format (table or json)
        #[arg(long, value_parser = ["table", "json"])]
        format: Option<String>,
    },
}

/// Command router
pub struct CommandRouter;

impl CommandRouter {
    /// Parse CLI arguments, set up logging and run the command
    ///
    /// Returns the process exit code.
    pub async fn route() -> anyhow::Result<i32> {
        let cli = Cli::parse();
        let command = cli.command.clone().unwrap_or(Commands::Run { kind: None });

        let loaded = PathResolver::resolve_config_dir(cli.config_dir.as_deref())
            .map_err(|e| ConfigError::Settings(e.to_string()))
            .and_then(|dir| {
                let mut settings = Settings::load(&dir)?;
                settings.apply_env();
                Ok((dir, settings))
            });

        let logging = match &loaded {
            Ok((_, settings)) => settings.logging.clone(),
            Err(_) => {
                // Environment still applies when the file is broken
                let mut defaults = Settings::default();
                defaults.apply_env();
                defaults.logging
            }
        };
        if let Err(e) = init_logging(&logging, VerbosityLevel::from_flags(cli.verbose, cli.quiet)) {
            eprintln!("tollgate: {:#}", e);
        }

        match command {
            Commands::Run { kind } => {
                let input = read_stdin();
                let output = Self::run_hook(kind, loaded, &input).await;
                emit(&output.line)?;
                if let Some(diagnostic) = output.diagnostic {
                    eprintln!("tollgate: {}", diagnostic);
                }
                Ok(output.exit_code)
            }
            other => {
                let (dir, settings) = loaded.context("Failed to load settings")?;
                debug!(config_dir = %dir.display(), "Using configuration directory");
                Self::inspect(other, &dir, settings)
            }
        }
    }

    /// Answer one hook invocation from raw stdin bytes
    ///
    /// Always yields exactly one response line, whatever the input or the
    /// state of the configuration.
    pub async fn run_hook(
        kind: Option<String>,
        loaded: Result<(PathBuf, Settings), ConfigError>,
        input: &[u8],
    ) -> RunOutput {
        let command = RunCommand::new(kind);
        match loaded {
            Ok((dir, settings)) => {
                debug!(config_dir = %dir.display(), "Using configuration directory");
                command.execute(&dir, settings, input).await
            }
            Err(e) => command.startup_failure(input, &e.to_string()),
        }
    }

    /// Run an inspection command against a loaded configuration
    pub fn inspect(command: Commands, config_dir: &Path, settings: Settings) -> anyhow::Result<i32> {
        let hook_command = Self::to_hook_command(command)?;
        let output = InspectCommand::new(hook_command).execute(config_dir, settings)?;
        println!("{}", output.output.trim_end());
        Ok(if output.ok { 0 } else { 1 })
    }

    /// Translate an inspection subcommand
    pub fn to_hook_command(command: Commands) -> anyhow::Result<HookCommand> {
        Ok(match command {
            Commands::Validate { format } => HookCommand::Validate { format },
            Commands::List { event, format } => HookCommand::List { event, format },
            Commands::Check {
                kind,
                payload,
                format,
            } => HookCommand::Check {
                kind,
                payload: read_payload(&payload)?,
                format,
            },
            Commands::Capabilities { format } => HookCommand::Capabilities { format },
            Commands::Run { .. } => anyhow::bail!("run is not an inspection command"),
        })
    }
}

/// Raw stdin; a read error leaves whatever arrived, which then fails closed
fn read_stdin() -> Vec<u8> {
    let mut input = Vec::new();
    if let Err(e) = io::stdin().read_to_end(&mut input) {
        warn!(error = %e, "Failed to read payload from stdin");
    }
    input
}

fn emit(line: &str) -> anyhow::Result<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", line).context("Failed to write response")?;
    stdout.flush().context("Failed to write response")
}
