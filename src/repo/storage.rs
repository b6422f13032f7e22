//! repo::storage
//!
//! File content as recorded in a commit or staged in the index.

use std::path::PathBuf;

use crate::core::types::Oid;

use super::{RepoError, RepositoryHandle};

/// Content identifier used for index revisions.
pub const INDEX: &str = "Index";

/// Where a revision's blob comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobSource {
    /// The tree of this commit.
    Commit(Oid),
    /// The stage-0 entry of the index.
    Index,
}

/// One revision of a file: a repository-relative path plus the blob holding
/// its content, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRevision {
    path: String,
    blob: Option<Oid>,
    source: BlobSource,
}

impl BlobRevision {
    /// The revision of `path` in `commit`. The blob is looked up now; a
    /// path absent from the commit has no blob.
    pub fn in_commit(
        repo: &RepositoryHandle,
        commit: &Oid,
        path: &str,
    ) -> Result<Self, RepoError> {
        let blob = repo.with_git(|git| git.blob_at_path(commit, path))?;
        Ok(Self::with_blob(path, blob, BlobSource::Commit(commit.clone())))
    }

    /// The revision of `path` staged in the index.
    pub fn in_index(repo: &RepositoryHandle, path: &str) -> Result<Self, RepoError> {
        let blob = repo.with_git(|git| git.index_blob_at_path(path))?;
        Ok(Self::with_blob(path, blob, BlobSource::Index))
    }

    /// A revision with an already-known blob.
    pub fn with_blob(path: impl Into<String>, blob: Option<Oid>, source: BlobSource) -> Self {
        Self {
            path: path.into(),
            blob,
            source,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn blob(&self) -> Option<&Oid> {
        self.blob.as_ref()
    }

    pub fn source(&self) -> &BlobSource {
        &self.source
    }

    /// Last path component.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Commit id for commit revisions, [`INDEX`] for index revisions.
    pub fn content_identifier(&self) -> &str {
        match &self.source {
            BlobSource::Commit(id) => id.as_str(),
            BlobSource::Index => INDEX,
        }
    }

    /// Where this file lives in the working tree; `None` when bare.
    pub fn absolute_path(&self, repo: &RepositoryHandle) -> Option<PathBuf> {
        repo.work_dir().map(|dir| dir.join(&self.path))
    }

    /// Raw blob content. A revision without a blob is empty.
    ///
    /// # Errors
    ///
    /// [`RepoError::Access`] if the blob cannot be read.
    pub fn content(&self, repo: &RepositoryHandle) -> Result<Vec<u8>, RepoError> {
        let Some(blob) = &self.blob else {
            return Ok(Vec::new());
        };
        repo.with_git(|git| git.read_blob(blob)).map_err(|e| {
            RepoError::Access(format!("reading blob {} at {}: {}", blob, self.path, e))
        })
    }
}
