//! Path resolution for configuration and state directories

use std::path::{Path, PathBuf};

use crate::error::{StorageError, StorageResult};

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "TOLLGATE_CONFIG_DIR";

/// Environment variable overriding the state directory
pub const STATE_DIR_ENV: &str = "TOLLGATE_STATE_DIR";

/// Name of the per-project and per-user directory
pub const DIR_NAME: &str = ".tollgate";

/// Path resolver for cross-platform storage paths
pub struct PathResolver;

impl PathResolver {
    /// Resolve the configuration directory
    ///
    /// Priority:
    /// 1. Explicit path (command line)
    /// 2. TOLLGATE_CONFIG_DIR environment variable
    /// 3. ./.tollgate/ when it exists
    /// 4. ~/.tollgate/
    pub fn resolve_config_dir(explicit: Option<&Path>) -> StorageResult<PathBuf> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::resolve_config_dir_from(
            explicit,
            std::env::var(CONFIG_DIR_ENV).ok(),
            &cwd,
            dirs::home_dir(),
        )
    }

    fn resolve_config_dir_from(
        explicit: Option<&Path>,
        env_override: Option<String>,
        cwd: &Path,
        home: Option<PathBuf>,
    ) -> StorageResult<PathBuf> {
        if let Some(path) = explicit {
            return Self::expand_home(path);
        }

        if let Some(value) = env_override.filter(|v| !v.trim().is_empty()) {
            return Self::expand_home(Path::new(&value));
        }

        let project = cwd.join(DIR_NAME);
        if project.is_dir() {
            return Ok(project);
        }

        home.map(|h| h.join(DIR_NAME))
            .ok_or_else(|| StorageError::path_resolution("Could not determine home directory"))
    }

    /// Resolve the state directory
    ///
    /// Priority:
    /// 1. TOLLGATE_STATE_DIR environment variable
    /// 2. Configured path (settings file)
    /// 3. <config dir>/state
    pub fn resolve_state_dir(config_dir: &Path, configured: Option<&Path>) -> StorageResult<PathBuf> {
        Self::resolve_state_dir_from(config_dir, configured, std::env::var(STATE_DIR_ENV).ok())
    }

    fn resolve_state_dir_from(
        config_dir: &Path,
        configured: Option<&Path>,
        env_override: Option<String>,
    ) -> StorageResult<PathBuf> {
        if let Some(value) = env_override.filter(|v| !v.trim().is_empty()) {
            return Self::expand_home(Path::new(&value));
        }

        match configured {
            Some(path) if path.is_relative() && !path.starts_with("~") => Ok(config_dir.join(path)),
            Some(path) => Self::expand_home(path),
            None => Ok(config_dir.join("state")),
        }
    }

    /// Expand ~ in paths to home directory
    pub fn expand_home(path: &Path) -> StorageResult<PathBuf> {
        let path_str = path
            .to_str()
            .ok_or_else(|| StorageError::path_resolution("Invalid path encoding"))?;

        if path_str == "~" || path_str.starts_with("~/") {
            let home_dir = dirs::home_dir()
                .ok_or_else(|| StorageError::path_resolution("Could not determine home directory"))?;
            return Ok(match path_str.strip_prefix("~/") {
                Some(rest) => home_dir.join(rest),
                None => home_dir,
            });
        }

        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_config_dir_wins() {
        let cwd = TempDir::new().unwrap();
        let path = PathResolver::resolve_config_dir_from(
            Some(Path::new("/etc/tollgate")),
            Some("/from/env".to_string()),
            cwd.path(),
            Some(PathBuf::from("/home/u")),
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/etc/tollgate"));
    }

    #[test]
    fn test_env_config_dir_beats_project() {
        let cwd = TempDir::new().unwrap();
        std::fs::create_dir(cwd.path().join(DIR_NAME)).unwrap();
        let path = PathResolver::resolve_config_dir_from(
            None,
            Some("/from/env".to_string()),
            cwd.path(),
            None,
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/from/env"));
    }

    #[test]
    fn test_project_dir_used_when_present() {
        let cwd = TempDir::new().unwrap();
        std::fs::create_dir(cwd.path().join(DIR_NAME)).unwrap();
        let path =
            PathResolver::resolve_config_dir_from(None, None, cwd.path(), Some(PathBuf::from("/h")))
                .unwrap();
        assert_eq!(path, cwd.path().join(DIR_NAME));
    }

    #[test]
    fn test_falls_back_to_home() {
        let cwd = TempDir::new().unwrap();
        let path = PathResolver::resolve_config_dir_from(
            None,
            Some("  ".to_string()),
            cwd.path(),
            Some(PathBuf::from("/home/u")),
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/home/u/.tollgate"));
    }

    #[test]
    fn test_no_home_is_an_error() {
        let cwd = TempDir::new().unwrap();
        let result = PathResolver::resolve_config_dir_from(None, None, cwd.path(), None);
        assert!(matches!(result, Err(StorageError::PathResolution { .. })));
    }

    #[test]
    fn test_state_dir_defaults_under_config() {
        let path =
            PathResolver::resolve_state_dir_from(Path::new("/cfg"), None, None).unwrap();
        assert_eq!(path, PathBuf::from("/cfg/state"));
    }

    #[test]
    fn test_state_dir_relative_setting_joins_config() {
        let path = PathResolver::resolve_state_dir_from(
            Path::new("/cfg"),
            Some(Path::new("counters")),
            None,
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/cfg/counters"));
    }

    #[test]
    fn test_state_dir_env_wins() {
        let path = PathResolver::resolve_state_dir_from(
            Path::new("/cfg"),
            Some(Path::new("/abs")),
            Some("/env/state".to_string()),
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/env/state"));
    }

    #[test]
    fn test_expand_home_without_tilde() {
        let path = PathBuf::from("/tmp/tollgate");
        let expanded = PathResolver::expand_home(&path).expect("Should expand");
        assert_eq!(expanded, path);
    }

    #[test]
    fn test_expand_home_with_tilde() {
        let expanded = PathResolver::expand_home(Path::new("~/.tollgate")).expect("Should expand");
        assert!(!expanded.to_string_lossy().contains('~'));
    }
}
