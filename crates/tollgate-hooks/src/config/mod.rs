//! Configuration for the hooks engine
//!
//! Two kinds of files live in the configuration directory:
//!
//! - `config.toml`: engine [`Settings`] (logging, timeouts, retry bounds,
//!   rewrites, context snippets)
//! - `mappings/*.toml|yaml|yml`: the mapping table, loaded by
//!   [`MappingLoader`] and resolved against the capability registry and the
//!   rule catalog by [`MappingValidator`]

pub mod loader;
pub mod settings;
pub mod validator;

pub use loader::{FileFormat, MappingLoader, MAPPINGS_DIR};
pub use settings::{
    CommandSettings, ContextSnippet, LogFormat, LoggingSettings, MergeSettings, RetrySettings,
    RewriteRule, Settings, StateSettings, TimeoutSettings, SETTINGS_FILE,
};
pub use validator::{MappingValidator, ResolvedMappingSet};
