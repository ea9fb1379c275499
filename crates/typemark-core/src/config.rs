//! Resolver configuration and config file discovery.
//!
//! Configuration lives in the `[resolver]` table of a `typemark.toml`
//! manifest. [`ResolverConfig::discover`] finds that file with the same
//! resolution order for every caller:
//!
//! 1. `TYPEMARK_CONFIG` environment variable
//! 2. Current directory
//! 3. Parent directories (walk up to filesystem root)
//! 4. XDG config directory (`~/.config/typemark/`)
//!
//! A missing file is not an error; defaults apply.
//!
//! ```toml
//! [resolver]
//! unresolvable = "warn"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::manifest::{Manifest, ManifestError};

/// File name looked up in each candidate directory.
pub const CONFIG_FILE_NAME: &str = "typemark.toml";

/// Environment variable that points at an explicit config file.
pub const CONFIG_ENV_VAR: &str = "TYPEMARK_CONFIG";

/// Errors that can occur while locating or loading configuration.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// Could not determine the current directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file was found but is not a valid manifest.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// An explicitly requested config file does not exist.
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
}

/// How the resolver reports markers that do not resolve to a usable type.
///
/// Either way the marker only disqualifies its own slot; the search goes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvablePolicy {
    /// Skip the marker, logging at debug level.
    #[default]
    Skip,
    /// Skip the marker, logging a warning.
    Warn,
}

/// Settings for [`MetadataResolver`](crate::MetadataResolver).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    /// Reporting of unresolvable markers.
    pub unresolvable: UnresolvablePolicy,
}

impl ResolverConfig {
    /// Loads the `[resolver]` table from an explicit manifest path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if the file does not exist, or
    /// [`ConfigError::Manifest`] if it cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Ok(Manifest::load(path)?.resolver)
    }

    /// Finds and loads configuration using the unified resolution order.
    ///
    /// # Errors
    ///
    /// Returns an error if a found file cannot be read or parsed, or if the
    /// current directory is not accessible.
    pub fn discover() -> Result<Self, ConfigError> {
        match locate()? {
            Some(path) => {
                debug!(path = %path.display(), "loading resolver config");
                Ok(Manifest::load(&path)?.resolver)
            }
            None => Ok(Self::default()),
        }
    }
}

/// Finds the config file path, if any, using the unified resolution order.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the current directory is not accessible.
pub fn locate() -> Result<Option<PathBuf>, ConfigError> {
    // Step 1: Environment variable override
    if let Some(path) = env_override()
        && path.exists()
    {
        return Ok(Some(path));
    }

    // Steps 2 and 3: current directory, then its ancestors
    let current = std::env::current_dir()?;
    if let Some(path) = locate_from(&current) {
        return Ok(Some(path));
    }

    // Step 4: XDG config directory
    Ok(xdg_config_path().filter(|path| path.exists()))
}

/// Walks from `start` up to the filesystem root looking for
/// [`CONFIG_FILE_NAME`].
pub fn locate_from(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|path| path.exists())
}

fn env_override() -> Option<PathBuf> {
    std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from)
}

fn xdg_config_path() -> Option<PathBuf> {
    Some(dirs::config_dir()?.join("typemark").join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use std::{
        ffi::OsString,
        fs,
        sync::{Mutex, MutexGuard, PoisonError},
    };

    use tempfile::TempDir;

    use super::*;

    /// Serializes tests that touch the process environment or working directory.
    static PROCESS_LOCK: Mutex<()> = Mutex::new(());

    /// Points [`CONFIG_ENV_VAR`] and the working directory somewhere else,
    /// restoring both on drop.
    struct ProcessState {
        original_dir: PathBuf,
        original_env: Option<OsString>,
        _guard: MutexGuard<'static, ()>,
    }

    impl ProcessState {
        fn enter(dir: &Path, env: Option<&Path>) -> Self {
            let guard = PROCESS_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
            let original_dir = std::env::current_dir().unwrap();
            let original_env = std::env::var_os(CONFIG_ENV_VAR);

            std::env::set_current_dir(dir).unwrap();
            unsafe {
                match env {
                    Some(path) => std::env::set_var(CONFIG_ENV_VAR, path),
                    None => std::env::remove_var(CONFIG_ENV_VAR),
                }
            }

            Self {
                original_dir,
                original_env,
                _guard: guard,
            }
        }
    }

    impl Drop for ProcessState {
        fn drop(&mut self) {
            unsafe {
                match &self.original_env {
                    Some(value) => std::env::set_var(CONFIG_ENV_VAR, value),
                    None => std::env::remove_var(CONFIG_ENV_VAR),
                }
            }
            let _ = std::env::set_current_dir(&self.original_dir);
        }
    }

    #[test]
    fn test_default_config_skips_unresolvable_markers() {
        assert_eq!(ResolverConfig::default().unresolvable, UnresolvablePolicy::Skip);
    }

    #[test]
    fn test_load_reads_resolver_table() {
        // Arrange
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[resolver]\nunresolvable = \"warn\"\n").unwrap();

        // Act
        let config = ResolverConfig::load(&path).unwrap();

        // Assert
        assert_eq!(config.unresolvable, UnresolvablePolicy::Warn);
    }

    #[test]
    fn test_load_without_resolver_table_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "").unwrap();

        let config = ResolverConfig::load(&path).unwrap();

        assert_eq!(config, ResolverConfig::default());
    }

    #[test]
    fn test_load_missing_file_is_not_found() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing.toml");

        let err = ResolverConfig::load(&path).unwrap_err();

        assert!(matches!(err, ConfigError::NotFound(p) if p == path));
    }

    #[test]
    fn test_load_rejects_unknown_policy() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[resolver]\nunresolvable = \"explode\"\n").unwrap();

        let err = ResolverConfig::load(&path).unwrap_err();

        assert!(matches!(err, ConfigError::Manifest(ManifestError::Parse(_))));
    }

    #[test]
    fn test_locate_from_walks_up_directories() {
        // Arrange
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "").unwrap();
        let nested = temp.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        // Act
        let found = locate_from(&nested);

        // Assert
        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn test_locate_from_prefers_closest_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CONFIG_FILE_NAME), "").unwrap();
        let nested = temp.path().join("inner");
        fs::create_dir_all(&nested).unwrap();
        let inner_path = nested.join(CONFIG_FILE_NAME);
        fs::write(&inner_path, "").unwrap();

        assert_eq!(locate_from(&nested), Some(inner_path));
    }

    #[test]
    fn test_env_var_overrides_current_directory_config() {
        // Arrange
        let temp = TempDir::new().unwrap();
        let custom_dir = temp.path().join("custom");
        fs::create_dir_all(&custom_dir).unwrap();
        let custom_config = custom_dir.join(CONFIG_FILE_NAME);
        fs::write(&custom_config, "[resolver]\nunresolvable = \"warn\"\n").unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "[resolver]\nunresolvable = \"skip\"\n",
        )
        .unwrap();
        let state = ProcessState::enter(temp.path(), Some(custom_config.as_path()));

        // Act
        let located = locate();
        let config = ResolverConfig::discover();
        drop(state);

        // Assert
        assert_eq!(located.unwrap(), Some(custom_config));
        assert_eq!(config.unwrap().unresolvable, UnresolvablePolicy::Warn);
    }

    #[test]
    fn test_env_var_pointing_at_missing_file_falls_back_to_directories() {
        let temp = TempDir::new().unwrap();
        let local_config = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&local_config, "").unwrap();
        let missing = temp.path().join("missing.toml");
        let state = ProcessState::enter(temp.path(), Some(missing.as_path()));

        let located = locate();
        drop(state);

        assert_eq!(
            located.unwrap().map(|path| path.ends_with(CONFIG_FILE_NAME)),
            Some(true)
        );
    }

    #[test]
    fn test_discover_reads_config_from_parent_of_current_directory() {
        // Arrange
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "[resolver]\nunresolvable = \"warn\"\n",
        )
        .unwrap();
        let nested = temp.path().join("src").join("bin");
        fs::create_dir_all(&nested).unwrap();
        let state = ProcessState::enter(&nested, None);

        // Act
        let config = ResolverConfig::discover();
        drop(state);

        // Assert
        assert_eq!(config.unwrap().unresolvable, UnresolvablePolicy::Warn);
    }

    #[test]
    fn test_discover_reports_invalid_config_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CONFIG_FILE_NAME), "[resolver]\nstrict = true\n").unwrap();
        let state = ProcessState::enter(temp.path(), None);

        let result = ResolverConfig::discover();
        drop(state);

        assert!(matches!(result, Err(ConfigError::Manifest(ManifestError::Parse(_)))));
    }
}
