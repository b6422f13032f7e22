//! repo::resolver
//!
//! Map a commit id to the "best" symbolic ref pointing at it.
//!
//! # Precedence
//!
//! Resolution short-circuits on the first step that produces a name:
//!
//! 1. **Reflog shortcut**: the newest-first HEAD reflog is searched for a
//!    checkout to a branch that still points at the commit (directly or
//!    through one level of tag peeling). Never cached, always re-evaluated.
//! 2. **Memo**: unless `refresh` is set, a cached answer for the commit is
//!    returned, including a cached "no match".
//! 3. **Tags** naming the commit: latest timestamp wins; if none has a
//!    timestamp, the greatest name wins.
//! 4. **Local branches** pointing exactly at the commit: greatest name.
//! 5. **Remote-tracking branches**, same rule.
//!
//! A scan that fails at the storage layer contributes no candidates and is
//! logged; it never aborts resolution.
//!
//! # Concurrency
//!
//! Each repository has its own memo table behind its own mutex. Scans for
//! one repository are serialized by that mutex; different repositories
//! resolve in parallel.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};

use crate::core::config::Config;
use crate::core::types::{Oid, RefName, HEADS_PREFIX, REMOTES_PREFIX};
use crate::git::{GitError, RefStore};

use super::RepositoryHandle;

/// Marker returned by [`RefResolver::short_branch`] when HEAD is unborn.
pub const NO_HEAD: &str = "NO-HEAD";

/// A memoized resolution result.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CachedRef {
    Hit(RefName),
    Miss,
}

impl CachedRef {
    fn into_option(self) -> Option<RefName> {
        match self {
            CachedRef::Hit(name) => Some(name),
            CachedRef::Miss => None,
        }
    }
}

impl From<Option<RefName>> for CachedRef {
    fn from(value: Option<RefName>) -> Self {
        match value {
            Some(name) => CachedRef::Hit(name),
            None => CachedRef::Miss,
        }
    }
}

type CommitRefTable = HashMap<Oid, CachedRef>;

/// Commit-to-ref resolver with a per-repository memo cache.
#[derive(Debug)]
pub struct RefResolver {
    tables: Mutex<HashMap<PathBuf, Arc<Mutex<CommitRefTable>>>>,
    reflog_shortcut: bool,
    remote_branches: bool,
}

impl Default for RefResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl RefResolver {
    /// Resolver with every step enabled.
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            reflog_shortcut: true,
            remote_branches: true,
        }
    }

    /// Resolver honouring the `[resolver]` settings.
    pub fn from_config(config: &Config) -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            reflog_shortcut: config.reflog_shortcut(),
            remote_branches: config.remote_branches(),
        }
    }

    /// Best ref name for `commit` in `repo`, or `None`.
    ///
    /// With `refresh`, the memo table for `repo` is discarded and the scan
    /// result stored afresh.
    pub fn resolve(&self, repo: &RepositoryHandle, commit: &Oid, refresh: bool) -> Option<RefName> {
        self.resolve_in(repo.git_dir(), repo, commit, refresh)
    }

    /// Like [`resolve`](Self::resolve), for text that may not be an object id.
    ///
    /// Returns `None` without scanning when `text` is not a valid id.
    pub fn resolve_str(&self, repo: &RepositoryHandle, text: &str, refresh: bool) -> Option<RefName> {
        let commit = Oid::new(text).ok()?;
        self.resolve(repo, &commit, refresh)
    }

    /// Resolve against any [`RefStore`], memoizing under `key`.
    pub fn resolve_in<S: RefStore + ?Sized>(
        &self,
        key: &Path,
        store: &S,
        commit: &Oid,
        refresh: bool,
    ) -> Option<RefName> {
        if self.reflog_shortcut {
            if let Some(name) = checked_out_branch(store, commit) {
                tracing::trace!(commit = %commit.short(7), %name, "resolved via reflog");
                return Some(name);
            }
        }

        let table = self.table_for(key);
        let mut table = table.lock().unwrap_or_else(PoisonError::into_inner);

        if !refresh {
            if let Some(cached) = table.get(commit) {
                tracing::trace!(commit = %commit.short(7), "resolver cache hit");
                return cached.clone().into_option();
            }
        }

        // Invalidate wholesale on refresh or miss.
        table.clear();

        let result = self.scan(store, commit);
        tracing::debug!(
            commit = %commit.short(7),
            resolved = ?result.as_ref().map(RefName::as_str),
            "resolved commit"
        );
        table.insert(commit.clone(), CachedRef::from(result.clone()));
        result
    }

    /// Short description of HEAD for display.
    ///
    /// - [`NO_HEAD`] when HEAD is unborn
    /// - the branch name when HEAD is a branch
    /// - `"<short ref> <7-char id>"` for a detached HEAD that resolves
    /// - the 7-char id otherwise
    pub fn short_branch(&self, repo: &RepositoryHandle) -> Result<String, GitError> {
        let (branch, head) = repo.with_git(|git| -> Result<_, GitError> {
            let head = git.try_head_oid()?;
            let branch = match head {
                Some(_) if !git.is_detached_head()? => git.current_branch()?,
                _ => None,
            };
            Ok((branch, head))
        })?;

        let Some(head) = head else {
            return Ok(NO_HEAD.to_string());
        };
        if let Some(branch) = branch {
            return Ok(branch.as_str().to_string());
        }

        let id = head.short(7).to_string();
        Ok(match self.resolve(repo, &head, false) {
            Some(name) => format!("{} {}", name.shorthand(), id),
            None => id,
        })
    }

    /// Drop the memo table of one repository.
    pub fn invalidate(&self, repo: &RepositoryHandle) {
        self.invalidate_key(repo.git_dir());
    }

    /// Drop the memo table stored under `key`.
    pub fn invalidate_key(&self, key: &Path) {
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        tables.remove(key);
    }

    /// Drop every memo table.
    pub fn dispose(&self) {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn table_for(&self, key: &Path) -> Arc<Mutex<CommitRefTable>> {
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(tables.entry(key.to_path_buf()).or_default())
    }

    fn scan<S: RefStore + ?Sized>(&self, store: &S, commit: &Oid) -> Option<RefName> {
        if let Some(tag) = best_tag(store, commit) {
            return Some(tag);
        }
        if let Some(branch) = best_branch(store, HEADS_PREFIX, commit) {
            return Some(branch);
        }
        if self.remote_branches {
            return best_branch(store, REMOTES_PREFIX, commit);
        }
        None
    }
}

fn checked_out_branch<S: RefStore + ?Sized>(store: &S, commit: &Oid) -> Option<RefName> {
    let entries = swallow("HEAD reflog", store.reflog("HEAD"))?;

    entries
        .iter()
        .filter(|entry| &entry.new_id == commit)
        .filter_map(|entry| entry.checkout_target())
        .find_map(|branch| match store.find_ref(branch) {
            Ok(Some(r)) if r.points_at(commit) => Some(r.name),
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(%branch, error = %err, "reflog branch lookup failed");
                None
            }
        })
}

fn best_tag<S: RefStore + ?Sized>(store: &S, commit: &Oid) -> Option<RefName> {
    let tags = swallow("tags", store.list_tags())?;

    let candidates: Vec<(RefName, Option<DateTime<Utc>>)> = tags
        .into_iter()
        .filter(|tag| &tag.target == commit)
        .map(|tag| (tag.name, tag.timestamp))
        .collect();

    let newest = candidates
        .iter()
        .filter_map(|(name, ts)| ts.map(|ts| (ts, name)))
        .max()
        .map(|(_, name)| name.clone());

    newest.or_else(|| candidates.into_iter().map(|(name, _)| name).max())
}

fn best_branch<S: RefStore + ?Sized>(store: &S, prefix: &str, commit: &Oid) -> Option<RefName> {
    let refs = swallow(prefix, store.list_refs_by_prefix(prefix))?;

    let names: BTreeSet<RefName> = refs
        .into_iter()
        .filter(|r| &r.target == commit)
        .map(|r| r.name)
        .collect();

    names.into_iter().next_back()
}

fn swallow<T>(scan: &str, result: Result<T, GitError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(scan, error = %err, "ref scan failed; treating as no candidates");
            None
        }
    }
}
