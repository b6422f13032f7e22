//! core::ops::lock
//!
//! Exclusive lock on a work tree's index.
//!
//! # Architecture
//!
//! The lock follows the engine's own convention: holding it means owning
//! `<git_dir>/index.lock`, created exclusively. Any other mutator of the
//! index (a `git commit`, `git add`, another `IndexLock`) fails while the
//! file exists. On top of the file's existence we also take an OS-level
//! exclusive lock via `fs2`, so two handles in one process cannot both
//! believe they own it.
//!
//! # Invariants
//!
//! - Acquisition is non-blocking (fails fast if locked)
//! - The lock file is removed on release or drop (RAII)
//! - A lock that was never acquired never removes someone else's lock file
//!
//! # Example
//!
//! ```ignore
//! use gitwork::core::ops::lock::IndexLock;
//! use gitwork::core::paths::RepoPaths;
//! use std::path::PathBuf;
//!
//! let paths = RepoPaths::new(PathBuf::from("/repo/.git"), PathBuf::from("/repo/.git"));
//! let lock = IndexLock::acquire(&paths)?;
//! // read the index while no one else can write it
//! drop(lock);
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

use crate::core::paths::RepoPaths;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another holder already owns the index lock.
    #[error("index is locked: {0}")]
    AlreadyLocked(PathBuf),

    /// Failed to create the lock file.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// Failed to release the lock.
    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),
}

/// An exclusive lock on the index of one work tree.
///
/// Released when dropped, including during unwinding.
#[derive(Debug)]
pub struct IndexLock {
    path: PathBuf,
    index_path: PathBuf,
    /// Some while the lock is held.
    file: Option<File>,
}

impl IndexLock {
    /// Attempt to acquire the index lock.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if `index.lock` already exists or is OS-locked
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be taken
    pub fn acquire(paths: &RepoPaths) -> Result<Self, LockError> {
        let path = paths.index_lock_path();

        let file = match OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(LockError::AlreadyLocked(path));
            }
            Err(e) => {
                return Err(LockError::CreateFailed(format!(
                    "cannot create {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        if let Err(e) = file.try_lock_exclusive() {
            // We created the file, so it is ours to clean up.
            let _ = fs::remove_file(&path);
            return Err(if e.kind() == ErrorKind::WouldBlock {
                LockError::AlreadyLocked(path)
            } else {
                LockError::AcquireFailed(e.to_string())
            });
        }

        tracing::debug!(lock = %path.display(), "acquired index lock");

        Ok(Self {
            path,
            index_path: paths.index_path(),
            file: Some(file),
        })
    }

    /// Try to acquire the lock, returning `None` if it is already held.
    pub fn try_acquire(paths: &RepoPaths) -> Result<Option<Self>, LockError> {
        match Self::acquire(paths) {
            Ok(lock) => Ok(Some(lock)),
            Err(LockError::AlreadyLocked(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Check if the lock is currently held.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path to the index this lock protects.
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Release the lock explicitly. Calling it again is a no-op.
    pub fn release(&mut self) -> Result<(), LockError> {
        if let Some(file) = self.file.take() {
            let unlocked = file.unlock();
            drop(file);
            self.remove_lock_file(unlocked)?;
        }
        Ok(())
    }

    /// Delete the lock file even when unlocking failed, then report the
    /// first failure.
    fn remove_lock_file(&self, unlocked: std::io::Result<()>) -> Result<(), LockError> {
        let removed = fs::remove_file(&self.path);
        unlocked
            .and(removed)
            .map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
        tracing::debug!(lock = %self.path.display(), "released index lock");
        Ok(())
    }
}

impl Drop for IndexLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
            drop(file);
            let _ = fs::remove_file(&self.path);
            tracing::debug!(lock = %self.path.display(), "released index lock on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_paths(dir: &Path) -> RepoPaths {
        RepoPaths::new(dir.to_path_buf(), dir.to_path_buf())
    }

    #[test]
    fn acquire_creates_lock_file() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(temp.path());

        let lock = IndexLock::acquire(&paths).expect("acquire lock");
        assert!(lock.is_held());
        assert!(lock.path().exists());
        assert_eq!(lock.path(), paths.index_lock_path());
        assert_eq!(lock.index_path(), paths.index_path());
    }

    #[test]
    fn second_acquire_fails() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(temp.path());

        let _lock = IndexLock::acquire(&paths).expect("first acquire");
        let result = IndexLock::acquire(&paths);
        assert!(matches!(result, Err(LockError::AlreadyLocked(_))));
    }

    #[test]
    fn foreign_lock_file_blocks_acquire_and_survives() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(temp.path());
        fs::write(paths.index_lock_path(), b"").unwrap();

        assert!(IndexLock::try_acquire(&paths).unwrap().is_none());
        assert!(paths.index_lock_path().exists());
    }

    #[test]
    fn released_on_drop() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(temp.path());

        {
            let _lock = IndexLock::acquire(&paths).expect("first acquire");
        }
        assert!(!paths.index_lock_path().exists());

        let lock2 = IndexLock::acquire(&paths).expect("second acquire");
        assert!(lock2.is_held());
    }

    #[test]
    fn released_during_unwind() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(temp.path());

        let result = std::panic::catch_unwind(|| {
            let _lock = IndexLock::acquire(&paths).expect("acquire");
            panic!("boom");
        });
        assert!(result.is_err());
        assert!(IndexLock::acquire(&paths).is_ok());
    }

    #[test]
    fn explicit_release_is_idempotent() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(temp.path());

        let mut lock = IndexLock::acquire(&paths).expect("acquire");
        lock.release().expect("first release");
        lock.release().expect("second release");
        assert!(!lock.is_held());
        assert!(!paths.index_lock_path().exists());
    }

    #[test]
    fn failed_unlock_still_removes_lock_file() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(temp.path());

        let mut lock = IndexLock::acquire(&paths).expect("acquire");
        drop(lock.file.take());
        let unlock_failure = std::io::Error::new(ErrorKind::Other, "unlock failed");
        let result = lock.remove_lock_file(Err(unlock_failure));

        assert!(matches!(result, Err(LockError::ReleaseFailed(msg)) if msg.contains("unlock failed")));
        assert!(!paths.index_lock_path().exists());
        assert!(IndexLock::acquire(&paths).is_ok());
    }

    #[test]
    fn error_display_formatting() {
        let err = LockError::AlreadyLocked(PathBuf::from("/repo/.git/index.lock"));
        assert!(err.to_string().contains("index.lock"));
        assert!(LockError::CreateFailed("x".into()).to_string().contains("create"));
        assert!(LockError::ReleaseFailed("x".into()).to_string().contains("release"));
    }
}
