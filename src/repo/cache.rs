//! repo::cache
//!
//! Process-wide cache of open repository handles.
//!
//! # Ownership
//!
//! The cache holds [`Weak`] references only. A handle stays cached while
//! some caller holds an `Arc` to it; once the last one is dropped the entry
//! is dead and pruned on the next call.
//!
//! # Invariants
//!
//! - Entries whose handle was dropped or whose git directory no longer
//!   exists are pruned before any lookup returns
//! - At most one live handle per repository is visible at a time; opens
//!   happen under the cache lock, so concurrent lookups of one path share
//!   a single open
//! - A failed open stores nothing

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::core::config::Config;

use super::{RepoError, RepositoryHandle};

type Entries = HashMap<PathBuf, Weak<RepositoryHandle>>;

/// Maps directory paths to lazily-opened, weakly-held repository handles.
#[derive(Debug)]
pub struct RepositoryHandleCache {
    entries: Mutex<Entries>,
    allow_bare: bool,
}

impl Default for RepositoryHandleCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryHandleCache {
    /// An empty cache that opens bare repositories.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            allow_bare: true,
        }
    }

    /// An empty cache honouring the `allow_bare` setting.
    pub fn with_config(config: &Config) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            allow_bare: config.allow_bare(),
        }
    }

    /// Return the live handle for `path`, opening one on a miss.
    ///
    /// `path` may be a work tree or a git directory. Two paths naming the
    /// same git directory share one handle.
    ///
    /// # Errors
    ///
    /// [`RepoError::Open`] if `path` is missing, not a repository, corrupt,
    /// or bare while bare repositories are disallowed.
    pub fn lookup(&self, path: &Path) -> Result<Arc<RepositoryHandle>, RepoError> {
        let key = path.canonicalize().map_err(|e| RepoError::Open {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut entries = self.lock();
        prune(&mut entries);

        if let Some(handle) = entries.get(&key).and_then(Weak::upgrade) {
            tracing::trace!(path = %key.display(), "repository cache hit");
            return Ok(handle);
        }

        let opened = RepositoryHandle::open(&key)?;
        if opened.is_bare() && !self.allow_bare {
            return Err(RepoError::Open {
                path: key,
                message: "bare repositories are not allowed".to_string(),
            });
        }

        // Another key may already reach the same git directory.
        let existing = entries
            .values()
            .filter_map(Weak::upgrade)
            .find(|h| h.git_dir() == opened.git_dir());

        let handle = match existing {
            Some(handle) => handle,
            None => {
                tracing::debug!(
                    path = %key.display(),
                    git_dir = %opened.git_dir().display(),
                    "opened repository"
                );
                Arc::new(opened)
            }
        };

        entries.insert(key, Arc::downgrade(&handle));
        Ok(handle)
    }

    /// Snapshot of all live handles, after pruning.
    ///
    /// A handle reachable from several keys appears once.
    pub fn all_handles(&self) -> Vec<Arc<RepositoryHandle>> {
        let mut entries = self.lock();
        prune(&mut entries);

        let mut handles: Vec<Arc<RepositoryHandle>> = Vec::new();
        for handle in entries.values().filter_map(Weak::upgrade) {
            if !handles.iter().any(|h| Arc::ptr_eq(h, &handle)) {
                handles.push(handle);
            }
        }
        handles
    }

    /// The cached non-bare repository whose work tree most closely encloses
    /// `location`, if any.
    pub fn repository_for_path(&self, location: &Path) -> Option<Arc<RepositoryHandle>> {
        let location = location
            .canonicalize()
            .unwrap_or_else(|_| location.to_path_buf());

        self.all_handles()
            .into_iter()
            .filter_map(|handle| {
                let depth = {
                    let work_dir = handle.work_dir()?;
                    if handle.is_bare() || !location.starts_with(work_dir) {
                        return None;
                    }
                    work_dir.components().count()
                };
                Some((depth, handle))
            })
            .max_by_key(|(depth, _)| *depth)
            .map(|(_, handle)| handle)
    }

    /// Drop all entries unconditionally.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn prune(entries: &mut Entries) {
    let before = entries.len();
    entries.retain(|_, weak| weak.upgrade().is_some_and(|h| h.is_live()));
    let pruned = before - entries.len();
    if pruned > 0 {
        tracing::debug!(pruned, "pruned repository cache");
    }
}
