//! repo
//!
//! Repository services built on top of [`crate::git`].
//!
//! # Modules
//!
//! - [`handle`] - Open repository handle and its metadata
//! - [`cache`] - Weakly-held, liveness-pruned handle cache
//! - [`resolver`] - Commit id to "best" ref name, memoized per repository
//! - [`empty`] - Would a commit of the current index change anything?
//! - [`storage`] - File content as stored in a commit or in the index
//!
//! # Control Flow
//!
//! Callers get an `Arc<RepositoryHandle>` from [`RepositoryHandleCache`]
//! and pass it to the services, which hold no per-call state of their own.

pub mod cache;
pub mod empty;
pub mod handle;
pub mod resolver;
pub mod storage;

pub use cache::RepositoryHandleCache;
pub use empty::{EmptyCommitDetector, PathFilter};
pub use handle::RepositoryHandle;
pub use resolver::RefResolver;
pub use storage::{BlobRevision, BlobSource};

use std::path::PathBuf;

use thiserror::Error;

use crate::core::ops::lock::LockError;
use crate::git::{CommitInfo, GitError};

/// Errors surfaced by the repository services.
#[derive(Debug, Error)]
pub enum RepoError {
    /// Directory missing, not a repository, or corrupt.
    ///
    /// Fatal to the single lookup; the cache stores nothing.
    #[error("cannot open repository at {path}: {message}")]
    Open { path: PathBuf, message: String },

    /// I/O failure reading refs, trees or the index mid-operation.
    #[error("repository access error: {0}")]
    Access(String),
}

impl From<GitError> for RepoError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::NotARepo { path, message } => RepoError::Open { path, message },
            other => RepoError::Access(other.to_string()),
        }
    }
}

impl From<LockError> for RepoError {
    fn from(err: LockError) -> Self {
        RepoError::Access(err.to_string())
    }
}

/// Commit info for HEAD, or `None` when HEAD is unborn or unreadable.
pub fn parse_head_commit(repo: &RepositoryHandle) -> Option<CommitInfo> {
    repo.with_git(|git| {
        let head = git.try_head_oid().ok().flatten()?;
        git.commit_info(&head).ok()
    })
}
