// Tollgate CLI Library

pub mod commands;
pub mod logging;
pub mod router;

pub use commands::{InspectCommand, RunCommand, RunOutput};
pub use logging::{init_logging, VerbosityLevel};
pub use router::{Cli, CommandRouter, Commands};
