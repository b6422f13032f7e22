//! repo::empty
//!
//! Decide whether committing the current index would record no change.
//!
//! # Algorithm
//!
//! A three-way walk over the locked index, the working tree and HEAD's
//! tree, path by path (sorted). For every path in the filter:
//!
//! - absent from both index and HEAD: untracked, ignored
//! - tracked but absent from HEAD: not empty
//! - tracked, present in HEAD, and the working tree is missing it or
//!   differs from HEAD's in content id or mode: not empty
//!
//! The working-tree side comes from the engine's HEAD-to-workdir diff, so
//! `core.autocrlf`, `.gitattributes` filters and symlink handling match
//! `git status`. The walk stops at the first difference. Submodule entries
//! (gitlinks) are never reported as differences.
//!
//! # Locking
//!
//! [`EmptyCommitDetector::would_be_empty`] takes the index lock for the
//! duration of the walk and releases it on every exit path. Callers that go
//! on to commit can hold the lock themselves and use
//! [`EmptyCommitDetector::would_be_empty_locked`].

use std::collections::{BTreeMap, BTreeSet};

use crate::core::config::Config;
use crate::core::ops::lock::IndexLock;
use crate::git::{mode, GitError, TreeEntry};

use super::{RepoError, RepositoryHandle};

/// Repository-relative paths a check is restricted to (`--only` style).
///
/// An empty filter matches everything. A filter path matches itself and
/// everything below it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathFilter(Vec<String>);

impl PathFilter {
    /// Match every path.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            paths
                .into_iter()
                .map(|p| p.into().trim_end_matches('/').to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        )
    }

    pub fn matches(&self, path: &str) -> bool {
        self.0.is_empty()
            || self.0.iter().any(|p| {
                path == p
                    || path
                        .strip_prefix(p.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            })
    }
}

/// Checks whether a pending commit would be empty.
#[derive(Debug, Clone, Default)]
pub struct EmptyCommitDetector {
    /// `None` follows the repository's `core.fileMode`.
    respect_filemode: Option<bool>,
}

impl EmptyCommitDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            respect_filemode: config.respect_filemode(),
        }
    }

    /// Whether committing now would change nothing under `filter`.
    ///
    /// # Errors
    ///
    /// [`RepoError::Access`] if the index is already locked, the repository
    /// is bare, or the index, HEAD tree or a working-tree file cannot be
    /// read. The index lock is released before any error is returned.
    pub fn would_be_empty(
        &self,
        repo: &RepositoryHandle,
        filter: &PathFilter,
    ) -> Result<bool, RepoError> {
        if repo.is_bare() {
            return Err(GitError::BareRepo.into());
        }

        let mut lock = IndexLock::acquire(&repo.paths())?;
        let result = self.would_be_empty_locked(repo, &lock, filter);
        let released = lock.release();

        let empty = result?;
        released?;
        Ok(empty)
    }

    /// Like [`would_be_empty`](Self::would_be_empty) under a caller-held lock.
    pub fn would_be_empty_locked(
        &self,
        repo: &RepositoryHandle,
        lock: &IndexLock,
        filter: &PathFilter,
    ) -> Result<bool, RepoError> {
        if repo.is_bare() {
            return Err(GitError::BareRepo.into());
        }

        let empty = repo.with_git(|git| -> Result<bool, GitError> {
            let index = git.read_index_entries(lock)?;
            let head = git.head_tree_entries()?.unwrap_or_default();
            let filemode = self
                .respect_filemode
                .unwrap_or_else(|| git.core_filemode());
            let changed = git.workdir_changes(!filemode)?;

            Ok(compare(&index, &head, filter, &changed))
        })?;

        tracing::debug!(repo = %repo.name(), empty, "checked for empty commit");
        Ok(empty)
    }
}

/// The three-way walk. `changed` holds the paths whose working-tree state
/// differs from HEAD.
fn compare(
    index: &BTreeMap<String, TreeEntry>,
    head: &BTreeMap<String, TreeEntry>,
    filter: &PathFilter,
    changed: &BTreeSet<String>,
) -> bool {
    let tracked: BTreeSet<&String> = index.keys().chain(head.keys()).collect();

    for path in tracked.into_iter().filter(|p| filter.matches(p)) {
        let Some(head_entry) = head.get(path) else {
            tracing::trace!(%path, "tracked path missing from HEAD");
            return false;
        };
        if head_entry.mode == mode::COMMIT {
            continue;
        }
        if changed.contains(path) {
            tracing::trace!(%path, "working tree differs from HEAD");
            return false;
        }
    }

    true
}
