//! core::paths
//!
//! Path routing for files this crate reads or creates inside a git directory.
//!
//! # Layout
//!
//! - `<git_dir>/index` - The index of this work tree
//! - `<git_dir>/index.lock` - Exclusive index lock (engine convention)
//! - `<common_dir>/gitwork/config.toml` - Repository configuration
//!
//! The index and its lock are per work tree, so they hang off `git_dir`.
//! Configuration is shared by all linked work trees, so it hangs off
//! `common_dir`. For a normal repository the two are equal.
//!
//! # Example
//!
//! ```
//! use gitwork::core::paths::RepoPaths;
//! use std::path::PathBuf;
//!
//! let paths = RepoPaths::new(
//!     PathBuf::from("/repo/.git/worktrees/feature"),
//!     PathBuf::from("/repo/.git"),
//! );
//!
//! assert_eq!(paths.index_lock_path(), PathBuf::from("/repo/.git/worktrees/feature/index.lock"));
//! assert_eq!(paths.repo_config_path(), PathBuf::from("/repo/.git/gitwork/config.toml"));
//! ```

use std::path::{Path, PathBuf};

use crate::git::RepoInfo;

/// Paths derived from a repository's git and common directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoPaths {
    /// Per-work-tree git directory.
    pub git_dir: PathBuf,

    /// Shared git directory (refs, objects, config).
    pub common_dir: PathBuf,
}

impl RepoPaths {
    pub fn new(git_dir: PathBuf, common_dir: PathBuf) -> Self {
        Self {
            git_dir,
            common_dir,
        }
    }

    /// Build from a [`RepoInfo`] read off an open repository.
    pub fn from_repo_info(info: &RepoInfo) -> Self {
        Self {
            git_dir: info.git_dir.clone(),
            common_dir: info.common_dir.clone(),
        }
    }

    /// `<git_dir>/index`
    pub fn index_path(&self) -> PathBuf {
        self.git_dir.join("index")
    }

    /// `<git_dir>/index.lock`
    pub fn index_lock_path(&self) -> PathBuf {
        self.git_dir.join("index.lock")
    }

    /// `<common_dir>/gitwork`
    pub fn repo_gitwork_dir(&self) -> PathBuf {
        self.common_dir.join("gitwork")
    }

    /// `<common_dir>/gitwork/config.toml`
    pub fn repo_config_path(&self) -> PathBuf {
        self.repo_gitwork_dir().join("config.toml")
    }

    /// Check if this is a linked work tree (common_dir != git_dir).
    pub fn is_worktree(&self) -> bool {
        self.git_dir != self.common_dir
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }
}
