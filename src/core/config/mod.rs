//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! Two configuration scopes:
//! - **Global**: User-level settings
//! - **Repo**: Per-repository overrides, shared by all linked work trees
//!
//! # Precedence
//!
//! Values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Repo config file
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$GITWORK_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/gitwork/config.toml`
//! 3. `~/.gitwork/config.toml` (canonical write location)
//!
//! # Example
//!
//! ```no_run
//! use gitwork::core::config::Config;
//!
//! let config = Config::load(None).unwrap();
//! println!("reflog shortcut: {}", config.reflog_shortcut());
//! println!("remote branches: {}", config.remote_branches());
//! ```

pub mod schema;

pub use schema::{EmptyCheckSettings, GlobalConfig, RepoConfig, ResolverSettings};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::core::paths::RepoPaths;

/// Environment variable naming an explicit global config file.
pub const CONFIG_ENV: &str = "GITWORK_CONFIG";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Merged configuration from all sources.
///
/// Accessors apply precedence: repo overrides global overrides default.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub global: GlobalConfig,
    pub repo: Option<RepoConfig>,
    global_path: Option<PathBuf>,
    repo_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default locations.
    ///
    /// If `paths` is provided, also loads that repository's config.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read or parsed.
    /// Missing files are not an error.
    pub fn load(paths: Option<&RepoPaths>) -> Result<Self, ConfigError> {
        Self::load_with_env(paths, |key| std::env::var(key).ok())
    }

    fn load_with_env(
        paths: Option<&RepoPaths>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let (global, global_path) = Self::load_global(&env)?;

        let (repo, repo_path) = match paths {
            Some(paths) => {
                let path = paths.repo_config_path();
                if path.exists() {
                    (Some(read_toml::<RepoConfig>(&path)?), Some(path))
                } else {
                    (None, None)
                }
            }
            None => (None, None),
        };

        tracing::trace!(
            global = ?global_path,
            repo = ?repo_path,
            "loaded configuration"
        );

        Ok(Config {
            global,
            repo,
            global_path,
            repo_path,
        })
    }

    fn load_global(
        env: &impl Fn(&str) -> Option<String>,
    ) -> Result<(GlobalConfig, Option<PathBuf>), ConfigError> {
        let mut candidates = Vec::new();
        if let Some(path) = env(CONFIG_ENV) {
            candidates.push(PathBuf::from(path));
        }
        if let Some(xdg_home) = env("XDG_CONFIG_HOME") {
            candidates.push(PathBuf::from(xdg_home).join("gitwork/config.toml"));
        }
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".gitwork/config.toml"));
        }

        for path in candidates {
            if path.exists() {
                let config = read_toml::<GlobalConfig>(&path)?;
                return Ok((config, Some(path)));
            }
        }

        Ok((GlobalConfig::default(), None))
    }

    /// Canonical path for global config: `~/.gitwork/config.toml`.
    pub fn global_config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".gitwork/config.toml"))
    }

    /// Write global config atomically.
    pub fn write_global(config: &GlobalConfig) -> Result<PathBuf, ConfigError> {
        let path = Self::global_config_path()?;
        write_toml_atomic(&path, config)?;
        Ok(path)
    }

    /// Write repo config atomically to `<common_dir>/gitwork/config.toml`.
    pub fn write_repo(paths: &RepoPaths, config: &RepoConfig) -> Result<PathBuf, ConfigError> {
        let path = paths.repo_config_path();
        write_toml_atomic(&path, config)?;
        Ok(path)
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Whether bare repositories may be opened. Defaults to `true`.
    pub fn allow_bare(&self) -> bool {
        self.global.allow_bare.unwrap_or(true)
    }

    /// Whether the resolver consults the HEAD reflog first. Defaults to `true`.
    pub fn reflog_shortcut(&self) -> bool {
        self.resolver_value(|r| r.reflog_shortcut).unwrap_or(true)
    }

    /// Whether the resolver falls back to remote-tracking branches. Defaults to `true`.
    pub fn remote_branches(&self) -> bool {
        self.resolver_value(|r| r.remote_branches).unwrap_or(true)
    }

    /// Executable-bit comparison override; `None` follows `core.fileMode`.
    pub fn respect_filemode(&self) -> Option<bool> {
        let repo = self
            .repo
            .as_ref()
            .and_then(|r| r.empty_check.as_ref())
            .and_then(|e| e.respect_filemode);
        repo.or_else(|| {
            self.global
                .empty_check
                .as_ref()
                .and_then(|e| e.respect_filemode)
        })
    }

    fn resolver_value(&self, get: impl Fn(&ResolverSettings) -> Option<bool>) -> Option<bool> {
        let repo = self
            .repo
            .as_ref()
            .and_then(|r| r.resolver.as_ref())
            .and_then(&get);
        repo.or_else(|| self.global.resolver.as_ref().and_then(&get))
    }

    /// Path the global config was loaded from, if any.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Path the repo config was loaded from, if any.
    pub fn repo_config_loaded_from(&self) -> Option<&Path> {
        self.repo_path.as_deref()
    }
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Write to a temp file in the same directory, then rename over the target.
fn write_toml_atomic<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err(path))?;
    }

    let contents =
        toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

    let temp_path = path.with_extension("toml.tmp");
    let mut file = fs::File::create(&temp_path).map_err(write_err(&temp_path))?;
    file.write_all(contents.as_bytes())
        .map_err(write_err(&temp_path))?;
    file.sync_all().map_err(write_err(&temp_path))?;

    fs::rename(&temp_path, path).map_err(write_err(path))?;
    Ok(())
}

fn write_err(path: &Path) -> impl FnOnce(std::io::Error) -> ConfigError {
    let path = path.to_path_buf();
    move |source| ConfigError::WriteError { path, source }
}
