use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Raw result of one git subprocess invocation.
#[derive(Debug, Clone)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
}

impl GitOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// One changed path from `git status --porcelain=v2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    /// Two-character XY status (`"M."`, `".M"`, `"??"`, `"UU"`, ...).
    pub status: String,
    pub path: String,
}

/// Parsed working-tree status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitStatus {
    pub branch: String,
    pub ahead: u32,
    pub behind: u32,
    pub clean: bool,
    pub changes: Vec<ChangeEntry>,
}

/// Commit counts between a branch and its remote counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDelta {
    pub ahead: u32,
    pub behind: u32,
}

/// Outcome of a commit attempt. "Nothing to commit" is a clean no-op, not
/// an error — callers drop the pending commit and move on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed { hash: String },
    NothingToCommit,
}

/// One line of `git log` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub hash: String,
    pub author: String,
    pub timestamp: String,
    pub subject: String,
}

/// One block of `git worktree list --porcelain` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorktreeInfo {
    pub path: PathBuf,
    pub head: String,
    /// `None` for a detached worktree.
    pub branch: Option<String>,
}
