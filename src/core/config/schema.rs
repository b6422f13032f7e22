//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$GITWORK_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/gitwork/config.toml`
//! 3. `~/.gitwork/config.toml` (canonical write location)
//!
//! # Repo Config
//!
//! Located at `<common_dir>/gitwork/config.toml`.

use serde::{Deserialize, Serialize};

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// allow_bare = false
///
/// [resolver]
/// reflog_shortcut = true
/// remote_branches = false
///
/// [empty_check]
/// respect_filemode = false
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Whether the handle cache opens bare repositories.
    pub allow_bare: Option<bool>,

    pub resolver: Option<ResolverSettings>,

    pub empty_check: Option<EmptyCheckSettings>,
}

/// Repository configuration. Overrides [`GlobalConfig`] key by key.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RepoConfig {
    pub resolver: Option<ResolverSettings>,

    pub empty_check: Option<EmptyCheckSettings>,
}

/// Commit-to-ref resolver settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverSettings {
    /// Consult the HEAD reflog for a checked-out branch first.
    pub reflog_shortcut: Option<bool>,

    /// Fall back to remote-tracking branches when no tag or local branch matches.
    pub remote_branches: Option<bool>,
}

/// Empty-commit detection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EmptyCheckSettings {
    /// Compare the executable bit of working-tree files. Unset follows the
    /// repository's `core.fileMode`.
    pub respect_filemode: Option<bool>,
}
