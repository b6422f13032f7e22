//! repo::handle
//!
//! An open repository plus the metadata callers ask for most.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::core::paths::RepoPaths;
use crate::git::{Git, GitError, RefEntry, RefStore, ReflogEntry, RepoInfo, TagEntry};

use super::RepoError;

/// Handle to an on-disk repository.
///
/// Identified by the canonical path it was opened from. `git2` repositories
/// are not `Sync`, so the connection sits behind a mutex and is reached
/// through [`RepositoryHandle::with_git`].
#[derive(Debug)]
pub struct RepositoryHandle {
    key: PathBuf,
    info: RepoInfo,
    name: String,
    git: Mutex<Git>,
}

impl RepositoryHandle {
    /// Open the repository at `path` (a work tree or a git directory).
    ///
    /// # Errors
    ///
    /// [`RepoError::Open`] if the directory is missing, not a repository, or corrupt.
    pub fn open(path: &Path) -> Result<Self, RepoError> {
        let key = path.canonicalize().map_err(|e| RepoError::Open {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let git = Git::open(&key)?;
        let info = git.info();
        let name = display_name(&info);

        Ok(Self {
            key,
            info,
            name,
            git: Mutex::new(git),
        })
    }

    /// Canonical path the handle was opened from.
    pub fn key(&self) -> &Path {
        &self.key
    }

    pub fn git_dir(&self) -> &Path {
        &self.info.git_dir
    }

    /// Work-tree root; `None` when bare.
    pub fn work_dir(&self) -> Option<&Path> {
        self.info.work_dir.as_deref()
    }

    pub fn is_bare(&self) -> bool {
        self.info.bare
    }

    /// Work-tree directory name, or the git directory name when bare.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn info(&self) -> &RepoInfo {
        &self.info
    }

    pub fn paths(&self) -> RepoPaths {
        RepoPaths::from_repo_info(&self.info)
    }

    /// Whether the backing git directory still exists.
    pub fn is_live(&self) -> bool {
        self.info.git_dir.exists()
    }

    /// Run `f` with exclusive access to the underlying connection.
    pub fn with_git<T>(&self, f: impl FnOnce(&Git) -> T) -> T {
        let git = self.git.lock().unwrap_or_else(PoisonError::into_inner);
        f(&git)
    }
}

impl RefStore for RepositoryHandle {
    fn reflog(&self, refname: &str) -> Result<Vec<ReflogEntry>, GitError> {
        self.with_git(|git| git.reflog(refname))
    }

    fn find_ref(&self, name: &str) -> Result<Option<RefEntry>, GitError> {
        self.with_git(|git| git.find_ref(name))
    }

    fn list_tags(&self) -> Result<Vec<TagEntry>, GitError> {
        self.with_git(|git| git.list_tags())
    }

    fn list_refs_by_prefix(&self, prefix: &str) -> Result<Vec<RefEntry>, GitError> {
        self.with_git(|git| git.list_refs_by_prefix(prefix))
    }
}

fn display_name(info: &RepoInfo) -> String {
    let dir = match (&info.work_dir, info.bare) {
        (Some(work_dir), false) => work_dir.as_path(),
        _ => info.git_dir.as_path(),
    };
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
