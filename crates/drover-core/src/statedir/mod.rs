//! On-disk state directory layout.
//!
//! Every coordinated repository carries a `.S9N_KIT_DevOpsAgent/` directory
//! at its root; it is the coordination medium between drover and independent
//! agent processes. All subdirectories are optional and created lazily.
//! Writes to individual files are atomic (tmp + rename) so readers never
//! observe half-written JSON.

pub mod category;
pub mod errors;
pub mod io;

pub use category::PathCategory;
pub use errors::StateDirError;

use std::path::{Path, PathBuf};

/// Name of the per-repository state directory.
pub const STATE_DIR_NAME: &str = ".S9N_KIT_DevOpsAgent";

pub const AGENTS_DIR: &str = "agents";
pub const SESSIONS_DIR: &str = "sessions";
pub const ACTIVITY_DIR: &str = "activity";
pub const HEARTBEATS_DIR: &str = "heartbeats";
pub const COMMANDS_DIR: &str = "commands";
pub const COORDINATION_DIR: &str = "coordination";
pub const ACTIVE_EDITS_DIR: &str = "active-edits";
pub const COMPLETED_EDITS_DIR: &str = "completed-edits";
pub const LOCKS_FILE: &str = "locks.json";
pub const CONFIG_FILE: &str = "config.json";

/// Path helpers for one repository's state directory.
///
/// Holds no open handles — purely path arithmetic plus lazy `ensure_*`
/// directory creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateDir {
    repo_path: PathBuf,
    root: PathBuf,
}

impl StateDir {
    pub fn for_repo(repo_path: impl Into<PathBuf>) -> Self {
        let repo_path = repo_path.into();
        let root = repo_path.join(STATE_DIR_NAME);
        Self { repo_path, root }
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    pub fn agents_dir(&self) -> PathBuf {
        self.root.join(AGENTS_DIR)
    }

    pub fn agent_file(&self, agent_id: &str) -> PathBuf {
        self.agents_dir().join(format!("{agent_id}.json"))
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.root.join(SESSIONS_DIR)
    }

    pub fn session_file(&self, session_id: &str) -> PathBuf {
        self.sessions_dir().join(format!("{session_id}.json"))
    }

    pub fn activity_dir(&self) -> PathBuf {
        self.root.join(ACTIVITY_DIR)
    }

    pub fn activity_log(&self, session_id: &str) -> PathBuf {
        self.activity_dir().join(format!("{session_id}.log"))
    }

    pub fn heartbeats_dir(&self) -> PathBuf {
        self.root.join(HEARTBEATS_DIR)
    }

    pub fn heartbeat_file(&self, agent_id: &str) -> PathBuf {
        self.heartbeats_dir().join(format!("{agent_id}.beat"))
    }

    pub fn commands_dir(&self) -> PathBuf {
        self.root.join(COMMANDS_DIR)
    }

    pub fn command_file(&self, session_id: &str) -> PathBuf {
        self.commands_dir().join(format!("{session_id}.cmd"))
    }

    pub fn active_edits_dir(&self) -> PathBuf {
        self.root.join(COORDINATION_DIR).join(ACTIVE_EDITS_DIR)
    }

    pub fn completed_edits_dir(&self) -> PathBuf {
        self.root.join(COORDINATION_DIR).join(COMPLETED_EDITS_DIR)
    }

    pub fn locks_file(&self) -> PathBuf {
        self.root.join(LOCKS_FILE)
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// `.devops-commit-<shortSessionId>.msg` lives at the *worktree* root,
    /// next to the agent's working files, not inside the state directory.
    pub fn commit_msg_file(worktree_path: &Path, short_session_id: &str) -> PathBuf {
        worktree_path.join(format!(".devops-commit-{short_session_id}.msg"))
    }

    pub fn ensure_dir(&self, dir: &Path) -> Result<(), StateDirError> {
        std::fs::create_dir_all(dir).map_err(|e| StateDirError::CreateFailed {
            path: dir.to_path_buf(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let sd = StateDir::for_repo("/tmp/repoA");
        assert_eq!(
            sd.root(),
            Path::new("/tmp/repoA/.S9N_KIT_DevOpsAgent")
        );
        assert_eq!(
            sd.agent_file("claude-1234"),
            Path::new("/tmp/repoA/.S9N_KIT_DevOpsAgent/agents/claude-1234.json")
        );
        assert_eq!(
            sd.session_file("sess_abcdef12"),
            Path::new("/tmp/repoA/.S9N_KIT_DevOpsAgent/sessions/sess_abcdef12.json")
        );
        assert_eq!(
            sd.heartbeat_file("claude-1234"),
            Path::new("/tmp/repoA/.S9N_KIT_DevOpsAgent/heartbeats/claude-1234.beat")
        );
        assert_eq!(
            sd.active_edits_dir(),
            Path::new("/tmp/repoA/.S9N_KIT_DevOpsAgent/coordination/active-edits")
        );
        assert_eq!(
            sd.locks_file(),
            Path::new("/tmp/repoA/.S9N_KIT_DevOpsAgent/locks.json")
        );
    }

    #[test]
    fn test_commit_msg_file_lives_in_worktree() {
        let path = StateDir::commit_msg_file(Path::new("/tmp/wt"), "abcdef12");
        assert_eq!(path, Path::new("/tmp/wt/.devops-commit-abcdef12.msg"));
    }

    #[test]
    fn test_ensure_dir_creates_nested() {
        let tmp = tempfile::TempDir::new().unwrap();
        let sd = StateDir::for_repo(tmp.path());
        sd.ensure_dir(&sd.active_edits_dir()).unwrap();
        assert!(sd.active_edits_dir().is_dir());
    }
}
