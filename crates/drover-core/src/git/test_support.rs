//! Shared git fixtures for tests.
//!
//! Fixtures shell out to the real `git` binary — the code under test does
//! the same, so there is no value in a second git implementation here.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

/// Run git in `dir`, panicking on failure. Test setup only.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run git {args:?}: {e}"));
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Initialize a repo on branch `main` with one initial commit.
pub fn init_repo() -> TempDir {
    let dir = TempDir::new().expect("create temp dir");
    init_repo_at(dir.path());
    dir
}

/// Initialize a repo at an existing path.
pub fn init_repo_at(path: &Path) {
    git(path, &["init", "-q", "-b", "main"]);
    git(path, &["config", "user.email", "test@example.com"]);
    git(path, &["config", "user.name", "Test"]);
    git(path, &["config", "commit.gpgsign", "false"]);
    std::fs::write(path.join("README.md"), "# test\n").unwrap();
    git(path, &["add", "-A"]);
    git(path, &["commit", "-q", "-m", "Initial commit"]);
}

/// Write a file and commit it.
pub fn commit_file(dir: &Path, name: &str, contents: &str, message: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    git(dir, &["add", "-A"]);
    git(dir, &["commit", "-q", "-m", message]);
}

/// A repo pair: `upstream` (bare, acts as `origin`) and `clone` tracking it.
///
/// Commits pushed to `upstream` through a second checkout simulate a remote
/// that advances underneath the clone.
pub struct RemotePair {
    _root: TempDir,
    pub upstream: PathBuf,
    pub clone: PathBuf,
    pub publisher: PathBuf,
}

/// Build a bare upstream with an initial `main` commit, a working clone, and
/// a `publisher` checkout for advancing the upstream independently.
pub fn remote_pair() -> RemotePair {
    let root = TempDir::new().expect("create temp dir");
    let upstream = root.path().join("upstream.git");
    let publisher = root.path().join("publisher");
    let clone = root.path().join("clone");

    std::fs::create_dir_all(&upstream).unwrap();
    git(&upstream, &["init", "-q", "--bare", "-b", "main"]);

    std::fs::create_dir_all(&publisher).unwrap();
    git(
        root.path(),
        &["clone", "-q", upstream.to_str().unwrap(), "publisher"],
    );
    git(&publisher, &["config", "user.email", "test@example.com"]);
    git(&publisher, &["config", "user.name", "Test"]);
    git(&publisher, &["config", "commit.gpgsign", "false"]);
    std::fs::write(publisher.join("README.md"), "# upstream\n").unwrap();
    git(&publisher, &["add", "-A"]);
    git(&publisher, &["commit", "-q", "-m", "Initial commit"]);
    git(&publisher, &["push", "-q", "-u", "origin", "main"]);

    git(
        root.path(),
        &["clone", "-q", upstream.to_str().unwrap(), "clone"],
    );
    git(&clone, &["config", "user.email", "test@example.com"]);
    git(&clone, &["config", "user.name", "Test"]);
    git(&clone, &["config", "commit.gpgsign", "false"]);

    RemotePair {
        _root: root,
        upstream,
        clone,
        publisher,
    }
}

/// Advance the upstream `main` by one commit via the publisher checkout.
pub fn advance_upstream(pair: &RemotePair, name: &str, contents: &str) {
    commit_file(&pair.publisher, name, contents, &format!("Add {name}"));
    git(&pair.publisher, &["push", "-q", "origin", "main"]);
}
