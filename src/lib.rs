//! gitwork - Working-copy services over a local Git repository
//!
//! Resolves object ids to symbolic names, caches open repository handles,
//! decides whether a pending commit would change anything, and splits or
//! rejoins two-way conflict text. Everything else (fetch, push, merge,
//! rebase, credentials) is left to the Git engine itself.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`core`] - Domain types, configuration, path routing, index locking,
//!   and the conflict-marker codec
//! - [`git`] - Single interface for all Git operations
//! - [`repo`] - Handle cache, ref resolver, and empty-commit detector
//!
//! # Example
//!
//! ```no_run
//! use gitwork::repo::{EmptyCommitDetector, PathFilter, RefResolver, RepositoryHandleCache};
//! use std::path::Path;
//!
//! let cache = RepositoryHandleCache::new();
//! let repo = cache.lookup(Path::new("."))?;
//!
//! let resolver = RefResolver::new();
//! println!("{}", resolver.short_branch(&repo)?);
//!
//! let empty = EmptyCommitDetector::new().would_be_empty(&repo, &PathFilter::all())?;
//! println!("nothing to commit: {empty}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod core;
pub mod git;
pub mod repo;
