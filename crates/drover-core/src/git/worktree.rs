//! Worktree management for isolated session checkouts.

use std::path::{Path, PathBuf};

use tracing::info;

use super::errors::GitError;
use super::runner::{GitOptions, run_git, run_git_raw, validate_git_arg};
use super::types::WorktreeInfo;

/// Create a worktree at `worktree_path` on `branch`.
///
/// Creates the branch from `base_branch` when it does not exist yet; reuses
/// the existing branch otherwise.
pub fn create_worktree(
    repo: &Path,
    worktree_path: &Path,
    branch: &str,
    base_branch: &str,
) -> Result<(), GitError> {
    validate_git_arg(branch, "branch name")?;
    validate_git_arg(base_branch, "base branch")?;

    let path_str = worktree_path.to_string_lossy();
    let with_new_branch = run_git_raw(
        repo,
        &["worktree", "add", "-b", branch, &path_str, base_branch],
        &GitOptions::default(),
    )?;

    if with_new_branch.success() {
        info!(
            event = "core.git.worktree.created",
            branch = branch,
            path = %worktree_path.display(),
        );
        return Ok(());
    }

    if with_new_branch.stderr.contains("already exists") {
        // Branch exists from a previous session — check it out as-is.
        run_git(
            repo,
            &["worktree", "add", &path_str, branch],
            &GitOptions::default(),
        )?;
        info!(
            event = "core.git.worktree.created_existing_branch",
            branch = branch,
            path = %worktree_path.display(),
        );
        return Ok(());
    }

    Err(super::classify::classify_failure(
        "worktree",
        with_new_branch.exit_code,
        &with_new_branch.stderr,
    ))
}

/// Remove a worktree. `force` discards uncommitted changes.
pub fn remove_worktree(repo: &Path, worktree_path: &Path, force: bool) -> Result<(), GitError> {
    let path_str = worktree_path.to_string_lossy();
    let mut args = vec!["worktree", "remove"];
    if force {
        args.push("--force");
    }
    args.push(&path_str);
    run_git(repo, &args, &GitOptions::default())?;
    info!(
        event = "core.git.worktree.removed",
        path = %worktree_path.display(),
    );
    Ok(())
}

/// Parse `git worktree list --porcelain`.
pub fn list_worktrees(repo: &Path) -> Result<Vec<WorktreeInfo>, GitError> {
    let output = run_git(
        repo,
        &["worktree", "list", "--porcelain"],
        &GitOptions::default(),
    )?;

    let mut worktrees = Vec::new();
    let mut path: Option<PathBuf> = None;
    let mut head = String::new();
    let mut branch: Option<String> = None;

    for line in output.stdout.lines().chain(std::iter::once("")) {
        if line.is_empty() {
            if let Some(p) = path.take() {
                worktrees.push(WorktreeInfo {
                    path: p,
                    head: std::mem::take(&mut head),
                    branch: branch.take(),
                });
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix("worktree ") {
            path = Some(PathBuf::from(rest));
        } else if let Some(rest) = line.strip_prefix("HEAD ") {
            head = rest.to_string();
        } else if let Some(rest) = line.strip_prefix("branch ") {
            branch = Some(
                rest.strip_prefix("refs/heads/")
                    .unwrap_or(rest)
                    .to_string(),
            );
        }
    }

    Ok(worktrees)
}

/// Drop stale worktree bookkeeping for deleted checkouts.
pub fn prune_worktrees(repo: &Path) -> Result<(), GitError> {
    run_git(repo, &["worktree", "prune"], &GitOptions::default())?;
    Ok(())
}
