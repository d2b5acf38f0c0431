//! High-level git contracts used by the commit and rebase pipelines.
//!
//! Callers receive parsed types and error categories; raw stdout/stderr
//! never leaves this module.

use std::path::Path;

use tracing::{info, warn};

use super::classify::{classify_failure, is_clean_noop};
use super::errors::GitError;
use super::runner::{GitOptions, run_git, run_git_raw, validate_git_arg};
use super::types::{ChangeEntry, CommitInfo, CommitOutcome, GitStatus, RemoteDelta};

/// Working-tree status from `git status --porcelain=v2 --branch`.
pub fn status(repo: &Path) -> Result<GitStatus, GitError> {
    let output = run_git(
        repo,
        &["status", "--porcelain=v2", "--branch"],
        &GitOptions::default(),
    )?;
    Ok(parse_porcelain_v2(&output.stdout))
}

fn parse_porcelain_v2(stdout: &str) -> GitStatus {
    let mut branch = String::new();
    let mut ahead = 0;
    let mut behind = 0;
    let mut changes = Vec::new();

    for line in stdout.lines() {
        if let Some(rest) = line.strip_prefix("# branch.head ") {
            branch = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("# branch.ab ") {
            for part in rest.split_whitespace() {
                if let Some(n) = part.strip_prefix('+') {
                    ahead = n.parse().unwrap_or(0);
                } else if let Some(n) = part.strip_prefix('-') {
                    behind = n.parse().unwrap_or(0);
                }
            }
        } else if line.starts_with("1 ") {
            // 1 XY sub mH mI mW hH hI path
            let status = line.get(2..4).unwrap_or("").to_string();
            if let Some(path) = line.splitn(9, ' ').nth(8) {
                changes.push(ChangeEntry {
                    status,
                    path: path.to_string(),
                });
            }
        } else if line.starts_with("2 ") {
            // 2 XY sub mH mI mW hH hI Xscore path<TAB>origPath
            let status = line.get(2..4).unwrap_or("").to_string();
            if let Some(rest) = line.splitn(10, ' ').nth(9) {
                let path = rest.split('\t').next().unwrap_or(rest);
                changes.push(ChangeEntry {
                    status,
                    path: path.to_string(),
                });
            }
        } else if line.starts_with("u ") {
            // u XY sub m1 m2 m3 mW h1 h2 h3 path
            let status = line.get(2..4).unwrap_or("").to_string();
            if let Some(path) = line.splitn(11, ' ').nth(10) {
                changes.push(ChangeEntry {
                    status,
                    path: path.to_string(),
                });
            }
        } else if let Some(path) = line.strip_prefix("? ") {
            changes.push(ChangeEntry {
                status: "??".to_string(),
                path: path.to_string(),
            });
        }
    }

    GitStatus {
        branch,
        ahead,
        behind,
        clean: changes.is_empty(),
        changes,
    }
}

/// Stage every change in the working tree (`git add -A`).
pub fn stage_all(repo: &Path) -> Result<(), GitError> {
    run_git(repo, &["add", "-A"], &GitOptions::default())?;
    Ok(())
}

/// Stage only the given repo-relative paths.
///
/// A pathspec that matches nothing (file created and deleted within one
/// burst, never tracked) is tolerated, not an error.
pub fn stage_paths(repo: &Path, paths: &[&str]) -> Result<(), GitError> {
    if paths.is_empty() {
        return Ok(());
    }
    let mut args = vec!["add", "-A", "--"];
    args.extend_from_slice(paths);
    let output = run_git_raw(repo, &args, &GitOptions::default())?;
    if output.success() || output.stderr.contains("did not match any files") {
        return Ok(());
    }
    Err(classify_failure("add", output.exit_code, &output.stderr))
}

/// Commit staged changes. A clean index yields
/// [`CommitOutcome::NothingToCommit`], not an error.
pub fn commit(repo: &Path, message: &str) -> Result<CommitOutcome, GitError> {
    let output = run_git_raw(repo, &["commit", "-m", message], &GitOptions::default())?;

    if output.success() {
        let hash = run_git(repo, &["rev-parse", "HEAD"], &GitOptions::default())?
            .stdout
            .trim()
            .to_string();
        info!(
            event = "core.git.ops.commit_created",
            path = %repo.display(),
            hash = %hash,
        );
        return Ok(CommitOutcome::Committed { hash });
    }

    if is_clean_noop(&output.stdout, &output.stderr) {
        return Ok(CommitOutcome::NothingToCommit);
    }

    Err(classify_failure("commit", output.exit_code, &output.stderr))
}

/// Push the current branch to its upstream.
pub fn push(repo: &Path) -> Result<(), GitError> {
    run_git(repo, &["push"], &GitOptions::slow())?;
    Ok(())
}

/// Fetch a remote (all branches).
pub fn fetch(repo: &Path, remote: &str) -> Result<(), GitError> {
    validate_git_arg(remote, "remote name")?;
    run_git(repo, &["fetch", remote], &GitOptions::slow())?;
    Ok(())
}

/// Commit deltas between the checked-out HEAD and `origin/<branch>`.
///
/// `ahead` counts commits only on HEAD, `behind` commits only on the remote
/// branch. Measured from HEAD so that rebasing the session branch onto the
/// remote base drives `behind` back to zero. Requires a prior [`fetch`] to
/// be meaningful.
pub fn check_remote_changes(repo: &Path, branch: &str) -> Result<RemoteDelta, GitError> {
    validate_git_arg(branch, "branch name")?;
    let range = format!("HEAD...origin/{branch}");
    let output = run_git(
        repo,
        &["rev-list", "--left-right", "--count", &range],
        &GitOptions::default(),
    )?;

    let mut parts = output.stdout.split_whitespace();
    let ahead = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    let behind = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    Ok(RemoteDelta { ahead, behind })
}

/// Rebase the checked-out branch onto `base_branch`.
///
/// On conflict the rebase is auto-aborted so the worktree stays clean, then
/// [`GitError::RebaseConflict`] is returned for the caller to surface.
pub fn rebase(dir: &Path, base_branch: &str) -> Result<(), GitError> {
    validate_git_arg(base_branch, "base branch")?;

    info!(
        event = "core.git.ops.rebase_started",
        base = base_branch,
        path = %dir.display(),
    );

    let output = run_git_raw(dir, &["rebase", base_branch], &GitOptions::slow())?;
    if output.success() {
        info!(
            event = "core.git.ops.rebase_completed",
            base = base_branch,
            path = %dir.display(),
        );
        return Ok(());
    }

    let classified = classify_failure("rebase", output.exit_code, &output.stderr);
    if !classified.is_conflict() {
        // Some conflict wording lands on stdout depending on git version.
        if !is_rebase_conflict_output(&output.stdout) {
            return Err(classified);
        }
    }

    // Auto-abort to leave the worktree clean
    let abort = run_git_raw(dir, &["rebase", "--abort"], &GitOptions::default())?;
    if !abort.success() {
        warn!(
            event = "core.git.ops.rebase_abort_failed",
            base = base_branch,
            path = %dir.display(),
            stderr = %abort.stderr.trim(),
        );
        return Err(GitError::RebaseAbortFailed {
            worktree_path: dir.to_path_buf(),
            message: abort.stderr.trim().to_string(),
        });
    }

    warn!(
        event = "core.git.ops.rebase_conflicts",
        base = base_branch,
        path = %dir.display(),
    );
    Err(GitError::RebaseConflict {
        base_branch: base_branch.to_string(),
        worktree_path: dir.to_path_buf(),
    })
}

fn is_rebase_conflict_output(stdout: &str) -> bool {
    let lowered = stdout.to_lowercase();
    lowered.contains("conflict") || lowered.contains("could not apply")
}

/// Make sure `patterns` are in the repo's `info/exclude`.
///
/// Coordination bookkeeping (the state directory, agent commit-message
/// files) must never ride along in auto-commits, and touching the repo's
/// own `.gitignore` is not ours to do. `info/exclude` lives in the common
/// dir, so one write covers every worktree.
pub fn ensure_excluded(repo: &Path, patterns: &[&str]) -> Result<(), GitError> {
    let output = run_git(
        repo,
        &["rev-parse", "--git-common-dir"],
        &GitOptions::default(),
    )?;
    let raw = output.stdout.trim();
    let git_dir = if Path::new(raw).is_absolute() {
        std::path::PathBuf::from(raw)
    } else {
        repo.join(raw)
    };
    let exclude_file = git_dir.join("info").join("exclude");

    let existing = std::fs::read_to_string(&exclude_file).unwrap_or_default();
    let missing: Vec<&str> = patterns
        .iter()
        .copied()
        .filter(|p| !existing.lines().any(|line| line.trim() == *p))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }

    if let Some(parent) = exclude_file.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let mut contents = existing;
    if !contents.is_empty() && !contents.ends_with('\n') {
        contents.push('\n');
    }
    for pattern in &missing {
        contents.push_str(pattern);
        contents.push('\n');
    }
    std::fs::write(&exclude_file, contents).map_err(|e| GitError::CommandFailed {
        command: "exclude".to_string(),
        code: -1,
        message: format!("failed to write {}: {e}", exclude_file.display()),
    })?;
    Ok(())
}

/// Name of the checked-out branch.
pub fn current_branch(repo: &Path) -> Result<String, GitError> {
    let output = run_git(
        repo,
        &["rev-parse", "--abbrev-ref", "HEAD"],
        &GitOptions::default(),
    )?;
    Ok(output.stdout.trim().to_string())
}

/// All local branch names.
pub fn list_branches(repo: &Path) -> Result<Vec<String>, GitError> {
    let output = run_git(
        repo,
        &["branch", "--format=%(refname:short)"],
        &GitOptions::default(),
    )?;
    Ok(output
        .stdout
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect())
}

/// Local branches fully merged into `base`, excluding `base` itself.
pub fn merged_branches(repo: &Path, base: &str) -> Result<Vec<String>, GitError> {
    validate_git_arg(base, "base branch")?;
    let output = run_git(
        repo,
        &["branch", "--merged", base, "--format=%(refname:short)"],
        &GitOptions::default(),
    )?;
    Ok(output
        .stdout
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty() && l != base)
        .collect())
}

/// Delete a local branch. `force` uses `-D`.
pub fn delete_branch(repo: &Path, branch: &str, force: bool) -> Result<(), GitError> {
    validate_git_arg(branch, "branch name")?;
    let flag = if force { "-D" } else { "-d" };
    run_git(repo, &["branch", flag, branch], &GitOptions::default())?;
    Ok(())
}

/// The most recent `count` commits on the checked-out branch.
pub fn commit_history(repo: &Path, count: usize) -> Result<Vec<CommitInfo>, GitError> {
    let limit = format!("-{count}");
    let output = run_git(
        repo,
        &["log", &limit, "--pretty=format:%H%x09%an%x09%aI%x09%s"],
        &GitOptions::default(),
    )?;

    Ok(output
        .stdout
        .lines()
        .filter_map(|line| {
            let mut fields = line.splitn(4, '\t');
            Some(CommitInfo {
                hash: fields.next()?.to_string(),
                author: fields.next()?.to_string(),
                timestamp: fields.next()?.to_string(),
                subject: fields.next().unwrap_or("").to_string(),
            })
        })
        .collect())
}

/// Stat + patch for one commit.
pub fn commit_diff(repo: &Path, hash: &str) -> Result<String, GitError> {
    validate_git_arg(hash, "commit hash")?;
    let output = run_git(
        repo,
        &["show", "--stat", "--patch", hash],
        &GitOptions::default(),
    )?;
    Ok(output.stdout)
}
