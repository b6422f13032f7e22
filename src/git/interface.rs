//! git::interface
//!
//! Git interface implementation using git2.
//!
//! This module is the **single doorway** to the object store, the ref
//! database and the index. Everything above it sees strong types
//! ([`Oid`], [`RefName`], [`TreeEntry`]) and typed [`GitError`]s.
//!
//! # Error Handling
//!
//! git2 errors are categorized into:
//! - [`GitError::NotARepo`]: Path is missing or not a repository
//! - [`GitError::BareRepo`]: Operation needs a working tree
//! - [`GitError::RefNotFound`]: Requested ref does not exist
//! - [`GitError::ObjectNotFound`]: Requested object does not exist
//! - [`GitError::AccessError`]: Locked or unreadable storage
//! - [`GitError::Internal`]: Anything else
//!
//! # Example
//!
//! ```ignore
//! use gitwork::git::Git;
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! let tags = git.list_tags()?;
//! let reflog = git.reflog("HEAD")?;
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::core::ops::lock::IndexLock;
use crate::core::types::{BranchName, Oid, RefName, TypeError};

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Path is missing, not a repository, or unreadable as one.
    #[error("not a git repository: {path}: {message}")]
    NotARepo {
        /// The path that was opened
        path: PathBuf,
        /// Why opening failed
        message: String,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository has no working tree")]
    BareRepo,

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Object not found in repository.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID that was not found
        oid: String,
    },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid {
        /// The invalid OID string
        oid: String,
    },

    /// Invalid ref name format.
    #[error("invalid ref name: {message}")]
    InvalidRefName {
        /// Description of the problem
        message: String,
    },

    /// Permission, lock or filesystem error.
    #[error("repository access error: {message}")]
    AccessError {
        /// Description of the error
        message: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => {
                if context.starts_with("refs/") || context == "HEAD" || context.contains("ref") {
                    GitError::RefNotFound {
                        refname: context.to_string(),
                    }
                } else {
                    GitError::ObjectNotFound {
                        oid: context.to_string(),
                    }
                }
            }
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: context.to_string(),
            },
            git2::ErrorCode::Locked => GitError::AccessError {
                message: format!("repository is locked: {}", err.message()),
            },
            _ if err.class() == git2::ErrorClass::Os || err.class() == git2::ErrorClass::Index => {
                GitError::AccessError {
                    message: format!("{}: {}", context, err.message()),
                }
            }
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }

}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        GitError::from_git2(err, "git")
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(msg) => GitError::InvalidOid { oid: msg },
            TypeError::InvalidRefName(msg) => GitError::InvalidRefName { message: msg },
            TypeError::InvalidBranchName(msg) => GitError::InvalidRefName { message: msg },
        }
    }
}

/// Information about an open repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoInfo {
    /// Path to the (per-work-tree) git directory
    pub git_dir: PathBuf,
    /// Path to the shared git directory
    pub common_dir: PathBuf,
    /// Working tree root; `None` for bare repositories
    pub work_dir: Option<PathBuf>,
    /// Whether the repository is bare
    pub bare: bool,
}

/// A ref with its direct target and, for annotated tags, the peeled target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefEntry {
    /// The full ref name
    pub name: RefName,
    /// The object the ref points at (symbolic refs resolved)
    pub target: Oid,
    /// The object behind one level of tag peeling, if the target is a tag
    pub peeled: Option<Oid>,
}

impl RefEntry {
    /// Whether the ref names `oid` directly or through one tag level.
    pub fn points_at(&self, oid: &Oid) -> bool {
        &self.target == oid || self.peeled.as_ref() == Some(oid)
    }
}

/// A tag with the object it names and its best-known date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEntry {
    /// `refs/tags/<name>`
    pub name: RefName,
    /// Object the tag names (annotated tags peeled by one level)
    pub target: Oid,
    /// Tagger date if annotated with a tagger, else the tagged commit's
    /// committer date, else `None`
    pub timestamp: Option<DateTime<Utc>>,
}

/// One reflog record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflogEntry {
    pub old_id: Oid,
    pub new_id: Oid,
    pub message: String,
}

impl ReflogEntry {
    /// Destination of a checkout recorded as `checkout: moving from A to B`.
    ///
    /// # Example
    ///
    /// ```
    /// use gitwork::core::types::Oid;
    /// use gitwork::git::ReflogEntry;
    ///
    /// let entry = ReflogEntry {
    ///     old_id: Oid::zero(),
    ///     new_id: Oid::zero(),
    ///     message: "checkout: moving from main to feature/x".into(),
    /// };
    /// assert_eq!(entry.checkout_target(), Some("feature/x"));
    /// ```
    pub fn checkout_target(&self) -> Option<&str> {
        let rest = self.message.strip_prefix("checkout: moving from ")?;
        let (_, to) = rest.rsplit_once(" to ")?;
        let to = to.trim();
        (!to.is_empty()).then_some(to)
    }
}

/// File mode bits as stored in trees and the index.
pub mod mode {
    pub const TREE: u32 = 0o040000;
    pub const BLOB: u32 = 0o100644;
    pub const BLOB_EXECUTABLE: u32 = 0o100755;
    pub const LINK: u32 = 0o120000;
    pub const COMMIT: u32 = 0o160000;
}

/// A path in a tree, the index, or the working tree.
///
/// Compared structurally: two entries are equal when path, mode and id are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Repository-relative path with `/` separators
    pub path: String,
    pub mode: u32,
    pub id: Oid,
}

impl TreeEntry {
    /// Same content and mode, ignoring the path.
    pub fn same_content(&self, other: &TreeEntry) -> bool {
        self.mode == other.mode && self.id == other.id
    }
}

/// Information about a commit.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    /// The commit OID
    pub oid: Oid,
    /// Tree the commit records
    pub tree: Oid,
    /// First line of the commit message
    pub summary: String,
    /// Full commit message
    pub message: String,
    /// Author name
    pub author_name: String,
    /// Author email
    pub author_email: String,
    /// Author timestamp
    pub author_time: DateTime<Utc>,
    /// Committer timestamp
    pub committer_time: DateTime<Utc>,
}

/// The Git interface.
///
/// This is the **single point of interaction** with git2. No other module
/// imports `git2` directly.
pub struct Git {
    repo: git2::Repository,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl Git {
    // =========================================================================
    // Repository Opening and Info
    // =========================================================================

    /// Open the repository at exactly `path` (a work tree or a git directory).
    ///
    /// Unlike discovery, parent directories are not searched.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if `path` is missing, not a repository, or corrupt
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::open(path).map_err(|e| GitError::NotARepo {
            path: path.to_path_buf(),
            message: e.message().to_string(),
        })?;
        Ok(Self { repo })
    }

    /// Get repository information.
    pub fn info(&self) -> RepoInfo {
        RepoInfo {
            git_dir: self.repo.path().to_path_buf(),
            common_dir: self.repo.commondir().to_path_buf(),
            work_dir: self.repo.workdir().map(Path::to_path_buf),
            bare: self.repo.is_bare(),
        }
    }

    /// Get direct access to the .git directory path.
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    /// Value of `core.fileMode` (defaults to `true`).
    pub fn core_filemode(&self) -> bool {
        self.repo
            .config()
            .and_then(|c| c.get_bool("core.filemode"))
            .unwrap_or(true)
    }

    // =========================================================================
    // Ref Resolution
    // =========================================================================

    /// Look up a ref by full name (`refs/heads/x`) or short name (`x`).
    ///
    /// Short names are expanded with the engine's usual rules (heads, tags,
    /// remotes). Returns `None` when nothing matches.
    pub fn find_ref(&self, name: &str) -> Result<Option<RefEntry>, GitError> {
        let reference = match self.repo.resolve_reference_from_short_name(name) {
            Ok(r) => r,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) if e.code() == git2::ErrorCode::InvalidSpec => return Ok(None),
            Err(e) => return Err(GitError::from_git2(e, name)),
        };
        self.ref_entry(&reference)
    }

    /// HEAD commit OID, or `None` if HEAD is unborn.
    pub fn try_head_oid(&self) -> Result<Option<Oid>, GitError> {
        let head = match self.repo.head() {
            Ok(h) => h,
            Err(e)
                if e.code() == git2::ErrorCode::UnbornBranch
                    || e.code() == git2::ErrorCode::NotFound =>
            {
                return Ok(None)
            }
            Err(e) => return Err(GitError::from_git2(e, "HEAD")),
        };

        let commit = head
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;
        Ok(Some(to_oid(commit.id())?))
    }

    /// Get HEAD commit OID.
    ///
    /// # Errors
    ///
    /// - [`GitError::RefNotFound`] if HEAD is unborn (new repository)
    pub fn head_oid(&self) -> Result<Oid, GitError> {
        self.try_head_oid()?.ok_or_else(|| GitError::RefNotFound {
            refname: "HEAD".to_string(),
        })
    }

    /// Get the current branch name, if on a branch.
    ///
    /// Returns the branch even when it is unborn; `None` when HEAD is detached.
    pub fn current_branch(&self) -> Result<Option<BranchName>, GitError> {
        let head = self
            .repo
            .find_reference("HEAD")
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;

        match head.symbolic_target() {
            Some(target) => match target.strip_prefix("refs/heads/") {
                Some(name) => Ok(Some(BranchName::new(name)?)),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    /// Whether HEAD points directly at a commit rather than at a branch.
    pub fn is_detached_head(&self) -> Result<bool, GitError> {
        self.repo
            .head_detached()
            .map_err(|e| GitError::from_git2(e, "HEAD"))
    }

    // =========================================================================
    // Ref Enumeration
    // =========================================================================

    /// List all refs whose full name starts with `prefix`.
    ///
    /// Refs with non-UTF-8 or invalid names are skipped.
    pub fn list_refs_by_prefix(&self, prefix: &str) -> Result<Vec<RefEntry>, GitError> {
        let pattern = format!("{}*", prefix);
        let refs = self
            .repo
            .references_glob(&pattern)
            .map_err(|e| GitError::from_git2(e, prefix))?;

        let mut entries = Vec::new();
        for reference in refs {
            let reference = reference.map_err(|e| GitError::from_git2(e, prefix))?;
            if let Some(entry) = self.ref_entry(&reference)? {
                entries.push(entry);
            }
        }

        Ok(entries)
    }

    /// List all tags with the object each names and its date.
    ///
    /// Tags pointing at trees or blobs are skipped.
    pub fn list_tags(&self) -> Result<Vec<TagEntry>, GitError> {
        let refs = self
            .repo
            .references_glob("refs/tags/*")
            .map_err(|e| GitError::from_git2(e, "refs/tags/"))?;

        let mut tags = Vec::new();
        for reference in refs {
            let reference = reference.map_err(|e| GitError::from_git2(e, "refs/tags/"))?;
            let Some(name) = reference.name().and_then(|n| RefName::new(n).ok()) else {
                continue;
            };
            let Some(direct) = reference.resolve().ok().and_then(|r| r.target()) else {
                continue;
            };

            let object = self
                .repo
                .find_object(direct, None)
                .map_err(|e| GitError::from_git2(e, name.as_str()))?;

            let entry = if let Some(tag) = object.as_tag() {
                let timestamp = match tag.tagger() {
                    Some(tagger) => Some(to_datetime(tagger.when())),
                    None => self
                        .repo
                        .find_commit(tag.target_id())
                        .ok()
                        .map(|c| to_datetime(c.committer().when())),
                };
                TagEntry {
                    name,
                    target: to_oid(tag.target_id())?,
                    timestamp,
                }
            } else if let Some(commit) = object.as_commit() {
                TagEntry {
                    name,
                    target: to_oid(commit.id())?,
                    timestamp: Some(to_datetime(commit.committer().when())),
                }
            } else {
                continue;
            };

            tags.push(entry);
        }

        Ok(tags)
    }

    /// Read a ref's reflog, newest entry first.
    ///
    /// A ref without a reflog yields an empty list.
    pub fn reflog(&self, refname: &str) -> Result<Vec<ReflogEntry>, GitError> {
        let reflog = self
            .repo
            .reflog(refname)
            .map_err(|e| GitError::from_git2(e, refname))?;

        let mut entries = Vec::with_capacity(reflog.len());
        for entry in reflog.iter() {
            entries.push(ReflogEntry {
                old_id: to_oid(entry.id_old())?,
                new_id: to_oid(entry.id_new())?,
                message: entry.message().unwrap_or("").to_string(),
            });
        }
        Ok(entries)
    }

    fn ref_entry(&self, reference: &git2::Reference<'_>) -> Result<Option<RefEntry>, GitError> {
        let Some(name) = reference.name().and_then(|n| RefName::new(n).ok()) else {
            return Ok(None);
        };

        let resolved = match reference.resolve() {
            Ok(r) => r,
            // Dangling symbolic ref
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(GitError::from_git2(e, name.as_str())),
        };
        let Some(target) = resolved.target() else {
            return Ok(None);
        };

        let peeled = match self.repo.find_tag(target) {
            Ok(tag) => Some(to_oid(tag.target_id())?),
            Err(_) => None,
        };

        Ok(Some(RefEntry {
            name,
            target: to_oid(target)?,
            peeled,
        }))
    }

    // =========================================================================
    // Trees, Index and Working Tree
    // =========================================================================

    /// All non-tree entries of HEAD's tree keyed by path, or `None` if HEAD is unborn.
    pub fn head_tree_entries(&self) -> Result<Option<BTreeMap<String, TreeEntry>>, GitError> {
        match self.try_head_oid()? {
            Some(head) => Ok(Some(self.commit_tree_entries(&head)?)),
            None => Ok(None),
        }
    }

    /// All non-tree entries of a commit's tree keyed by path.
    pub fn commit_tree_entries(&self, commit: &Oid) -> Result<BTreeMap<String, TreeEntry>, GitError> {
        let commit = self
            .repo
            .find_commit(to_git2(commit)?)
            .map_err(|e| GitError::from_git2(e, commit.as_str()))?;
        let tree = commit
            .tree()
            .map_err(|e| GitError::from_git2(e, "commit tree"))?;

        let mut entries = BTreeMap::new();
        let mut bad_id = None;
        tree.walk(git2::TreeWalkMode::PreOrder, |root, entry| {
            if entry.kind() == Some(git2::ObjectType::Tree) {
                return git2::TreeWalkResult::Ok;
            }
            let Some(name) = entry.name() else {
                return git2::TreeWalkResult::Skip;
            };
            let path = format!("{root}{name}");
            match to_oid(entry.id()) {
                Ok(id) => {
                    entries.insert(
                        path.clone(),
                        TreeEntry {
                            path,
                            mode: entry.filemode() as u32,
                            id,
                        },
                    );
                    git2::TreeWalkResult::Ok
                }
                Err(e) => {
                    bad_id = Some(e);
                    git2::TreeWalkResult::Abort
                }
            }
        })
        .or_else(|e| {
            // Abort is reported as an error; the real cause is in bad_id.
            if bad_id.is_some() {
                Ok(())
            } else {
                Err(GitError::from_git2(e, "tree walk"))
            }
        })?;

        match bad_id {
            Some(e) => Err(e),
            None => Ok(entries),
        }
    }

    /// Read the index file guarded by `lock`, keyed by path.
    ///
    /// Unmerged paths are reported once, preferring the stage-0 entry, then
    /// the lowest stage present.
    pub fn read_index_entries(
        &self,
        lock: &IndexLock,
    ) -> Result<BTreeMap<String, TreeEntry>, GitError> {
        let index = git2::Index::open(lock.index_path())
            .map_err(|e| GitError::from_git2(e, "index"))?;

        let mut entries: BTreeMap<String, (u16, TreeEntry)> = BTreeMap::new();
        for entry in index.iter() {
            let Ok(path) = String::from_utf8(entry.path) else {
                continue;
            };
            let stage = (entry.flags >> 12) & 0x3;
            let candidate = TreeEntry {
                path: path.clone(),
                mode: entry.mode,
                id: to_oid(entry.id)?,
            };
            let keep_existing = entries
                .get(&path)
                .is_some_and(|(existing, _)| *existing <= stage);
            if !keep_existing {
                entries.insert(path, (stage, candidate));
            }
        }

        Ok(entries.into_iter().map(|(k, (_, e))| (k, e)).collect())
    }

    /// Paths whose working-tree state differs from HEAD's tree.
    ///
    /// Working-tree content goes through the repository's filters
    /// (`core.autocrlf`, `.gitattributes`) and symlink rules before it is
    /// compared, as `git status` does. Untracked files and submodules are
    /// never reported. With `ignore_filemode`, executable-bit changes are
    /// not reported either; without it, `core.fileMode` still decides.
    pub fn workdir_changes(&self, ignore_filemode: bool) -> Result<BTreeSet<String>, GitError> {
        if self.repo.is_bare() {
            return Err(GitError::BareRepo);
        }

        let head_tree = match self.try_head_oid()? {
            Some(head) => Some(
                self.repo
                    .find_commit(to_git2(&head)?)
                    .and_then(|commit| commit.tree())
                    .map_err(|e| GitError::from_git2(e, "HEAD tree"))?,
            ),
            None => None,
        };

        let mut opts = git2::DiffOptions::new();
        opts.include_untracked(false)
            .include_ignored(false)
            .ignore_submodules(true)
            .ignore_filemode(ignore_filemode);

        let diff = self
            .repo
            .diff_tree_to_workdir(head_tree.as_ref(), Some(&mut opts))
            .map_err(|e| GitError::from_git2(e, "working tree diff"))?;

        let mut changed = BTreeSet::new();
        for delta in diff.deltas() {
            if matches!(
                delta.status(),
                git2::Delta::Unmodified | git2::Delta::Untracked | git2::Delta::Ignored
            ) {
                continue;
            }
            let path = delta
                .old_file()
                .path()
                .or_else(|| delta.new_file().path())
                .and_then(|p| p.to_str());
            if let Some(path) = path {
                changed.insert(path.to_string());
            }
        }

        Ok(changed)
    }

    // =========================================================================
    // Blob Operations
    // =========================================================================

    /// Read a blob by OID.
    ///
    /// # Errors
    ///
    /// - [`GitError::ObjectNotFound`] if the blob doesn't exist
    pub fn read_blob(&self, oid: &Oid) -> Result<Vec<u8>, GitError> {
        let blob = self
            .repo
            .find_blob(to_git2(oid)?)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?;

        Ok(blob.content().to_vec())
    }

    /// Blob id recorded for `path` in `commit`'s tree, if any.
    pub fn blob_at_path(&self, commit: &Oid, path: &str) -> Result<Option<Oid>, GitError> {
        let commit_obj = self
            .repo
            .find_commit(to_git2(commit)?)
            .map_err(|e| GitError::from_git2(e, commit.as_str()))?;
        let tree = commit_obj
            .tree()
            .map_err(|e| GitError::from_git2(e, "commit tree"))?;

        match tree.get_path(Path::new(path)) {
            Ok(entry) => Ok(Some(to_oid(entry.id())?)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::from_git2(e, path)),
        }
    }

    /// Blob id staged for `path` (stage 0) in the repository's index, if any.
    pub fn index_blob_at_path(&self, path: &str) -> Result<Option<Oid>, GitError> {
        let index = self
            .repo
            .index()
            .map_err(|e| GitError::from_git2(e, "index"))?;
        match index.get_path(Path::new(path), 0) {
            Some(entry) => Ok(Some(to_oid(entry.id)?)),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Commit Information
    // =========================================================================

    /// Get information about a commit.
    ///
    /// # Errors
    ///
    /// - [`GitError::ObjectNotFound`] if the commit doesn't exist
    pub fn commit_info(&self, oid: &Oid) -> Result<CommitInfo, GitError> {
        let commit = self
            .repo
            .find_commit(to_git2(oid)?)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?;

        let author = commit.author();
        let committer = commit.committer();
        Ok(CommitInfo {
            oid: oid.clone(),
            tree: to_oid(commit.tree_id())?,
            summary: commit.summary().unwrap_or("").to_string(),
            message: commit.message().unwrap_or("").to_string(),
            author_name: author.name().unwrap_or("").to_string(),
            author_email: author.email().unwrap_or("").to_string(),
            author_time: to_datetime(author.when()),
            committer_time: to_datetime(committer.when()),
        })
    }
}

fn to_oid(id: git2::Oid) -> Result<Oid, GitError> {
    Oid::new(id.to_string()).map_err(GitError::from)
}

fn to_git2(oid: &Oid) -> Result<git2::Oid, GitError> {
    git2::Oid::from_str(oid.as_str()).map_err(|e| GitError::from_git2(e, oid.as_str()))
}

fn to_datetime(time: git2::Time) -> DateTime<Utc> {
    DateTime::from_timestamp(time.seconds(), 0).unwrap_or(DateTime::UNIX_EPOCH)
}
