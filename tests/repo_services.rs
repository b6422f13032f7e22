//! Integration tests for the repository services.
//!
//! Real repositories are built with the git CLI in temp directories, then
//! driven through the handle cache, the ref resolver, the empty-commit
//! detector and blob revisions.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use tempfile::TempDir;

use gitwork::core::config::{Config, EmptyCheckSettings, GlobalConfig};
use gitwork::core::ops::IndexLock;
use gitwork::core::types::{Oid, RefName};
use gitwork::repo::resolver::NO_HEAD;
use gitwork::repo::{
    parse_head_commit, BlobRevision, EmptyCommitDetector, PathFilter, RefResolver, RepoError,
    RepositoryHandleCache,
};

struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    fn new() -> Self {
        let repo = Self::empty();
        repo.commit_file("README.md", "# Test Repo\n", "Initial commit");
        repo
    }

    /// Initialized, no commits.
    fn empty() -> Self {
        init_tracing();
        let dir = TempDir::new().expect("failed to create temp dir");
        run_git(dir.path(), &["init", "-b", "main"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        run_git(dir.path(), &["config", "user.name", "Test User"]);
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn write(&self, path: &str, content: &str) {
        let full = self.path().join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full, content).unwrap();
    }

    fn commit_file(&self, path: &str, content: &str, message: &str) -> Oid {
        self.write(path, content);
        run_git(self.path(), &["add", path]);
        run_git(self.path(), &["commit", "-m", message]);
        self.head()
    }

    fn head(&self) -> Oid {
        Oid::new(git_output(self.path(), &["rev-parse", "HEAD"])).unwrap()
    }

    fn git(&self, args: &[&str]) {
        run_git(self.path(), args);
    }
}

/// Route library logs through the test harness; later calls are no-ops.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

fn run_git(dir: &Path, args: &[&str]) {
    git_output(dir, args);
}

fn git_output(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_COMMITTER_DATE", "2024-01-01T00:00:00Z")
        .output()
        .expect("git command failed");

    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn refname(s: &str) -> RefName {
    RefName::new(s).unwrap()
}

mod handle_cache {
    use super::*;

    #[test]
    fn lookup_deduplicates() {
        let repo = TestRepo::new();
        let cache = RepositoryHandleCache::new();

        let a = cache.lookup(repo.path()).unwrap();
        let b = cache.lookup(repo.path()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn work_tree_and_git_dir_share_handle() {
        let repo = TestRepo::new();
        let cache = RepositoryHandleCache::new();

        let a = cache.lookup(repo.path()).unwrap();
        let b = cache.lookup(&repo.path().join(".git")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.all_handles().len(), 1);
    }

    #[test]
    fn dropped_handles_are_pruned() {
        let repo = TestRepo::new();
        let cache = RepositoryHandleCache::new();

        let handle = cache.lookup(repo.path()).unwrap();
        assert_eq!(cache.all_handles().len(), 1);
        drop(handle);
        assert!(cache.all_handles().is_empty());
    }

    #[test]
    fn deleted_repository_is_pruned() {
        let repo = TestRepo::new();
        let cache = RepositoryHandleCache::new();

        let handle = cache.lookup(repo.path()).unwrap();
        std::fs::remove_dir_all(handle.git_dir()).unwrap();

        assert!(cache.all_handles().is_empty());
        // A fresh lookup does not hand back the stale handle.
        assert!(matches!(cache.lookup(repo.path()), Err(RepoError::Open { .. })));
    }

    #[test]
    fn clear_drops_entries() {
        let repo = TestRepo::new();
        let cache = RepositoryHandleCache::new();

        let a = cache.lookup(repo.path()).unwrap();
        cache.clear();
        assert!(cache.all_handles().is_empty());

        let b = cache.lookup(repo.path()).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn concurrent_lookups_share_one_handle() {
        let repo = TestRepo::new();
        let cache = RepositoryHandleCache::new();
        let path = repo.path().to_path_buf();

        let handles: Vec<_> = std::thread::scope(|s| {
            let workers: Vec<_> = (0..8)
                .map(|_| s.spawn(|| cache.lookup(&path).unwrap()))
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert!(handles.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn handle_metadata() {
        let repo = TestRepo::new();
        let cache = RepositoryHandleCache::new();
        let handle = cache.lookup(repo.path()).unwrap();

        assert!(!handle.is_bare());
        let dir_name = repo.path().file_name().unwrap().to_string_lossy();
        assert_eq!(handle.name(), dir_name);
        assert!(handle.work_dir().is_some());
    }

    #[test]
    fn bare_repositories_can_be_refused() {
        let dir = TempDir::new().unwrap();
        run_git(dir.path(), &["init", "--bare"]);

        let mut config = Config::default();
        config.global = GlobalConfig {
            allow_bare: Some(false),
            ..Default::default()
        };
        let strict = RepositoryHandleCache::with_config(&config);
        assert!(matches!(strict.lookup(dir.path()), Err(RepoError::Open { .. })));
        assert!(strict.all_handles().is_empty());

        let lenient = RepositoryHandleCache::new();
        let handle = lenient.lookup(dir.path()).unwrap();
        assert!(handle.is_bare());
        assert!(handle.work_dir().is_none());
    }

    #[test]
    fn repository_for_path_picks_closest_work_tree() {
        let outer = TestRepo::new();
        let inner_path = outer.path().join("vendor/inner");
        std::fs::create_dir_all(&inner_path).unwrap();
        run_git(&inner_path, &["init"]);

        let cache = RepositoryHandleCache::new();
        let outer_handle = cache.lookup(outer.path()).unwrap();
        let inner_handle = cache.lookup(&inner_path).unwrap();

        std::fs::create_dir_all(inner_path.join("src")).unwrap();
        let found = cache.repository_for_path(&inner_path.join("src")).unwrap();
        assert!(Arc::ptr_eq(&found, &inner_handle));

        let found = cache.repository_for_path(&outer.path().join("README.md")).unwrap();
        assert!(Arc::ptr_eq(&found, &outer_handle));

        let elsewhere = TempDir::new().unwrap();
        assert!(cache.repository_for_path(elsewhere.path()).is_none());
    }
}

mod resolver {
    use super::*;

    #[test]
    fn tag_beats_branch() {
        let repo = TestRepo::new();
        let head = repo.head();
        repo.git(&["tag", "-a", "v1.0", "-m", "release"]);
        repo.git(&["branch", "zzz"]);

        let cache = RepositoryHandleCache::new();
        let handle = cache.lookup(repo.path()).unwrap();
        let resolver = RefResolver::from_config(&no_shortcut());

        assert_eq!(
            resolver.resolve(&handle, &head, false),
            Some(refname("refs/tags/v1.0"))
        );
    }

    #[test]
    fn same_date_tags_use_greatest_name() {
        let repo = TestRepo::new();
        let head = repo.head();
        // Lightweight tags take the commit's committer date, so they tie.
        repo.git(&["tag", "alpha"]);
        repo.git(&["tag", "beta"]);

        let cache = RepositoryHandleCache::new();
        let handle = cache.lookup(repo.path()).unwrap();
        let resolver = RefResolver::new();

        assert_eq!(
            resolver.resolve(&handle, &head, false),
            Some(refname("refs/tags/beta"))
        );
    }

    #[test]
    fn local_branch_then_remote() {
        let repo = TestRepo::new();
        let first = repo.head();
        repo.commit_file("a.txt", "a\n", "second");
        repo.git(&["update-ref", "refs/remotes/origin/old", first.as_str()]);

        let cache = RepositoryHandleCache::new();
        let handle = cache.lookup(repo.path()).unwrap();
        let resolver = RefResolver::from_config(&no_shortcut());

        assert_eq!(
            resolver.resolve(&handle, &first, false),
            Some(refname("refs/remotes/origin/old"))
        );

        repo.git(&["branch", "keep", first.as_str()]);
        assert_eq!(
            resolver.resolve(&handle, &first, false),
            Some(refname("refs/remotes/origin/old")),
            "memoized until refresh"
        );
        assert_eq!(
            resolver.resolve(&handle, &first, true),
            Some(refname("refs/heads/keep"))
        );
    }

    #[test]
    fn reflog_shortcut_prefers_checked_out_branch() {
        let repo = TestRepo::new();
        let head = repo.head();
        repo.git(&["tag", "v1"]);
        repo.git(&["checkout", "-b", "feature"]);

        let cache = RepositoryHandleCache::new();
        let handle = cache.lookup(repo.path()).unwrap();

        assert_eq!(
            RefResolver::new().resolve(&handle, &head, false),
            Some(refname("refs/heads/feature"))
        );
        assert_eq!(
            RefResolver::from_config(&no_shortcut()).resolve(&handle, &head, false),
            Some(refname("refs/tags/v1"))
        );
    }

    #[test]
    fn resolve_str_rejects_non_ids() {
        let repo = TestRepo::new();
        let cache = RepositoryHandleCache::new();
        let handle = cache.lookup(repo.path()).unwrap();
        let resolver = RefResolver::new();

        assert_eq!(resolver.resolve_str(&handle, "main", false), None);
        assert_eq!(
            resolver.resolve_str(&handle, repo.head().as_str(), false),
            Some(refname("refs/heads/main"))
        );
    }

    #[test]
    fn short_branch_forms() {
        let empty = TestRepo::empty();
        let cache = RepositoryHandleCache::new();
        let resolver = RefResolver::new();

        let handle = cache.lookup(empty.path()).unwrap();
        assert_eq!(resolver.short_branch(&handle).unwrap(), NO_HEAD);

        let repo = TestRepo::new();
        let handle = cache.lookup(repo.path()).unwrap();
        assert_eq!(resolver.short_branch(&handle).unwrap(), "main");

        let head = repo.head();
        repo.git(&["tag", "v2"]);
        repo.git(&["checkout", "--detach"]);
        assert_eq!(
            resolver.short_branch(&handle).unwrap(),
            format!("v2 {}", head.short(7))
        );
    }

    fn no_shortcut() -> Config {
        let mut config = Config::default();
        config.global.resolver = Some(gitwork::core::config::ResolverSettings {
            reflog_shortcut: Some(false),
            ..Default::default()
        });
        config
    }
}

mod empty_commit {
    use super::*;

    fn check(repo: &TestRepo, filter: &PathFilter) -> bool {
        let cache = RepositoryHandleCache::new();
        let handle = cache.lookup(repo.path()).unwrap();
        EmptyCommitDetector::new()
            .would_be_empty(&handle, filter)
            .unwrap()
    }

    #[test]
    fn clean_tree_is_empty() {
        let repo = TestRepo::new();
        assert!(check(&repo, &PathFilter::all()));
    }

    #[test]
    fn modified_tracked_file_is_not_empty() {
        let repo = TestRepo::new();
        repo.write("README.md", "changed\n");
        assert!(!check(&repo, &PathFilter::all()));
    }

    #[test]
    fn untracked_file_is_ignored() {
        let repo = TestRepo::new();
        repo.write("scratch.txt", "anything\n");
        assert!(check(&repo, &PathFilter::all()));
    }

    #[test]
    fn staged_new_file_is_not_empty() {
        let repo = TestRepo::new();
        repo.write("new.txt", "new\n");
        repo.git(&["add", "new.txt"]);
        assert!(!check(&repo, &PathFilter::all()));
    }

    #[test]
    fn filter_limits_the_walk() {
        let repo = TestRepo::new();
        repo.commit_file("docs/guide.md", "guide\n", "docs");
        repo.write("README.md", "changed\n");

        assert!(check(&repo, &PathFilter::new(["docs"])));
        assert!(!check(&repo, &PathFilter::new(["README.md"])));
    }

    #[test]
    fn no_head_with_empty_index_is_empty() {
        let repo = TestRepo::empty();
        repo.write("untracked.txt", "x\n");
        assert!(check(&repo, &PathFilter::all()));
    }

    #[test]
    fn autocrlf_checkout_is_empty() {
        let repo = TestRepo::new();
        repo.git(&["config", "core.autocrlf", "true"]);
        repo.commit_file("notes.txt", "one\r\ntwo\r\n", "crlf notes");
        assert_eq!(git_output(repo.path(), &["status", "--porcelain"]), "");

        assert!(check(&repo, &PathFilter::all()));

        repo.write("notes.txt", "one\r\nthree\r\n");
        assert!(!check(&repo, &PathFilter::all()));
    }

    #[test]
    fn gitattributes_eol_checkout_is_empty() {
        let repo = TestRepo::new();
        repo.commit_file(".gitattributes", "*.txt text eol=crlf\n", "attributes");
        repo.commit_file("notes.txt", "one\ntwo\n", "notes");
        std::fs::remove_file(repo.path().join("notes.txt")).unwrap();
        repo.git(&["checkout", "--", "notes.txt"]);

        let on_disk = std::fs::read(repo.path().join("notes.txt")).unwrap();
        assert_eq!(on_disk, b"one\r\ntwo\r\n");
        assert_eq!(git_output(repo.path(), &["status", "--porcelain"]), "");
        assert!(check(&repo, &PathFilter::all()));
    }

    #[cfg(unix)]
    #[test]
    fn executable_bit_follows_filemode_setting() {
        use std::os::unix::fs::PermissionsExt;

        let repo = TestRepo::new();
        repo.git(&["config", "core.fileMode", "true"]);
        let readme = repo.path().join("README.md");
        std::fs::set_permissions(&readme, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(!check(&repo, &PathFilter::all()));

        let mut config = Config::default();
        config.global = GlobalConfig {
            empty_check: Some(EmptyCheckSettings {
                respect_filemode: Some(false),
            }),
            ..Default::default()
        };
        let cache = RepositoryHandleCache::new();
        let handle = cache.lookup(repo.path()).unwrap();
        let lenient = EmptyCommitDetector::from_config(&config)
            .would_be_empty(&handle, &PathFilter::all())
            .unwrap();
        assert!(lenient);
    }

    #[test]
    fn lock_released_after_success() {
        let repo = TestRepo::new();
        let cache = RepositoryHandleCache::new();
        let handle = cache.lookup(repo.path()).unwrap();

        EmptyCommitDetector::new()
            .would_be_empty(&handle, &PathFilter::all())
            .unwrap();

        assert!(IndexLock::acquire(&handle.paths()).is_ok());
    }

    #[test]
    fn lock_released_after_error() {
        let repo = TestRepo::new();
        std::fs::write(repo.path().join(".git/index"), b"not an index").unwrap();

        let cache = RepositoryHandleCache::new();
        let handle = cache.lookup(repo.path()).unwrap();

        let result = EmptyCommitDetector::new().would_be_empty(&handle, &PathFilter::all());
        assert!(matches!(result, Err(RepoError::Access(_))));
        assert!(IndexLock::acquire(&handle.paths()).is_ok());
    }

    #[test]
    fn locked_index_is_access_error() {
        let repo = TestRepo::new();
        let cache = RepositoryHandleCache::new();
        let handle = cache.lookup(repo.path()).unwrap();

        let _held = IndexLock::acquire(&handle.paths()).unwrap();
        let result = EmptyCommitDetector::new().would_be_empty(&handle, &PathFilter::all());
        assert!(matches!(result, Err(RepoError::Access(_))));
    }

    #[test]
    fn caller_held_lock_is_reused() {
        let repo = TestRepo::new();
        let cache = RepositoryHandleCache::new();
        let handle = cache.lookup(repo.path()).unwrap();

        let lock = IndexLock::acquire(&handle.paths()).unwrap();
        let empty = EmptyCommitDetector::new()
            .would_be_empty_locked(&handle, &lock, &PathFilter::all())
            .unwrap();
        assert!(empty);
        assert!(lock.is_held());
    }

    #[test]
    fn bare_repository_is_access_error() {
        let dir = TempDir::new().unwrap();
        run_git(dir.path(), &["init", "--bare"]);
        let cache = RepositoryHandleCache::new();
        let handle = cache.lookup(dir.path()).unwrap();

        let result = EmptyCommitDetector::new().would_be_empty(&handle, &PathFilter::all());
        assert!(matches!(result, Err(RepoError::Access(_))));
    }
}

mod storage {
    use super::*;

    #[test]
    fn commit_and_index_revisions() {
        let repo = TestRepo::new();
        let commit = repo.commit_file("src/lib.rs", "pub fn v1() {}\n", "v1");
        repo.write("src/lib.rs", "pub fn v2() {}\n");
        repo.git(&["add", "src/lib.rs"]);

        let cache = RepositoryHandleCache::new();
        let handle = cache.lookup(repo.path()).unwrap();

        let committed = BlobRevision::in_commit(&handle, &commit, "src/lib.rs").unwrap();
        assert_eq!(committed.content(&handle).unwrap(), b"pub fn v1() {}\n");
        assert_eq!(committed.name(), "lib.rs");
        assert_eq!(
            committed.absolute_path(&handle).unwrap(),
            handle.work_dir().unwrap().join("src/lib.rs")
        );

        let staged = BlobRevision::in_index(&handle, "src/lib.rs").unwrap();
        assert_eq!(staged.content(&handle).unwrap(), b"pub fn v2() {}\n");
    }

    #[test]
    fn missing_path_has_empty_content() {
        let repo = TestRepo::new();
        let cache = RepositoryHandleCache::new();
        let handle = cache.lookup(repo.path()).unwrap();

        let rev = BlobRevision::in_commit(&handle, &repo.head(), "nope.txt").unwrap();
        assert!(rev.blob().is_none());
        assert!(rev.content(&handle).unwrap().is_empty());
    }

    #[test]
    fn head_commit_parsed() {
        let repo = TestRepo::new();
        let cache = RepositoryHandleCache::new();
        let handle = cache.lookup(repo.path()).unwrap();

        let info = parse_head_commit(&handle).unwrap();
        assert_eq!(info.oid, repo.head());
        assert_eq!(info.summary, "Initial commit");

        let empty = TestRepo::empty();
        let handle = cache.lookup(empty.path()).unwrap();
        assert!(parse_head_commit(&handle).is_none());
    }
}
