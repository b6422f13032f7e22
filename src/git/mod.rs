//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to Git. Object lookup, tree walking,
//! ref enumeration, reflog reads and index reads all flow through [`Git`].
//! No other module imports `git2`.
//!
//! # Responsibilities
//!
//! - Repository opening and metadata
//! - Ref lookup and enumeration (tags, local and remote branches)
//! - Reflog reads
//! - HEAD tree, index and working-tree entries for emptiness checks
//! - Blob and commit reads
//!
//! # Invariants
//!
//! - Read-only: nothing here writes refs, objects or the index
//! - All operations return strong types (Oid, RefName, TreeEntry)
//!
//! The ref-reading subset is also exposed as the [`RefStore`] trait so the
//! resolver can be driven by a test double that counts scans.

mod interface;

pub use interface::{
    mode, CommitInfo, Git, GitError, RefEntry, ReflogEntry, RepoInfo, TagEntry, TreeEntry,
};

/// Read access to refs, as needed by commit-to-ref resolution.
pub trait RefStore {
    /// Reflog of `refname`, newest first.
    fn reflog(&self, refname: &str) -> Result<Vec<ReflogEntry>, GitError>;

    /// Look up a ref by full or short name.
    fn find_ref(&self, name: &str) -> Result<Option<RefEntry>, GitError>;

    /// All tags with their peeled targets and dates.
    fn list_tags(&self) -> Result<Vec<TagEntry>, GitError>;

    /// All refs under `prefix` (e.g. `refs/heads/`).
    fn list_refs_by_prefix(&self, prefix: &str) -> Result<Vec<RefEntry>, GitError>;
}

impl RefStore for Git {
    fn reflog(&self, refname: &str) -> Result<Vec<ReflogEntry>, GitError> {
        Git::reflog(self, refname)
    }

    fn find_ref(&self, name: &str) -> Result<Option<RefEntry>, GitError> {
        Git::find_ref(self, name)
    }

    fn list_tags(&self) -> Result<Vec<TagEntry>, GitError> {
        Git::list_tags(self)
    }

    fn list_refs_by_prefix(&self, prefix: &str) -> Result<Vec<RefEntry>, GitError> {
        Git::list_refs_by_prefix(self, prefix)
    }
}
