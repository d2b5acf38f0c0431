use std::path::PathBuf;

use crate::errors::DroverError;

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("git binary not found on PATH: {message}")]
    GitNotFound { message: String },

    #[error("Invalid {label}: {message}")]
    InvalidArgument { label: String, message: String },

    #[error("Failed to spawn git {command}: {source}")]
    SpawnFailed {
        command: String,
        source: std::io::Error,
    },

    #[error("git {command} timed out after {timeout_ms} ms in {path}")]
    Timeout {
        command: String,
        timeout_ms: u64,
        path: PathBuf,
    },

    #[error("Authentication required for git {command}: {message}")]
    AuthRequired { command: String, message: String },

    #[error("Network failure during git {command}: {message}")]
    Network { command: String, message: String },

    #[error("Index lock contention during git {command}: {message}")]
    IndexLocked { command: String, message: String },

    #[error("Merge conflict during git {command}: {message}")]
    Conflict { command: String, message: String },

    #[error("Rebase onto '{base_branch}' hit conflicts in {worktree_path} (aborted)")]
    RebaseConflict {
        base_branch: String,
        worktree_path: PathBuf,
    },

    #[error("git rebase --abort failed in {worktree_path}: {message}")]
    RebaseAbortFailed {
        worktree_path: PathBuf,
        message: String,
    },

    #[error("git {command} failed (exit {code}): {message}")]
    CommandFailed {
        command: String,
        code: i32,
        message: String,
    },
}

impl GitError {
    /// Transient failures are retried by the runner with backoff; everything
    /// else is returned to the caller immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, GitError::Network { .. } | GitError::IndexLocked { .. })
    }

    /// Whether the failure represents a merge/rebase conflict of any shape.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            GitError::Conflict { .. } | GitError::RebaseConflict { .. }
        )
    }
}

impl DroverError for GitError {
    fn error_code(&self) -> &'static str {
        match self {
            GitError::GitNotFound { .. } => "GIT_NOT_FOUND",
            GitError::InvalidArgument { .. } => "GIT_INVALID_ARGUMENT",
            GitError::SpawnFailed { .. } => "GIT_SPAWN_FAILED",
            GitError::Timeout { .. } => "GIT_TIMEOUT",
            GitError::AuthRequired { .. } => "GIT_AUTH_REQUIRED",
            GitError::Network { .. } => "GIT_NETWORK_FAILURE",
            GitError::IndexLocked { .. } => "GIT_INDEX_LOCKED",
            GitError::Conflict { .. } => "GIT_CONFLICT",
            GitError::RebaseConflict { .. } => "GIT_REBASE_CONFLICT",
            GitError::RebaseAbortFailed { .. } => "GIT_REBASE_ABORT_FAILED",
            GitError::CommandFailed { .. } => "GIT_COMMAND_FAILED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let network = GitError::Network {
            command: "fetch".to_string(),
            message: "could not resolve host".to_string(),
        };
        assert!(network.is_transient());

        let conflict = GitError::Conflict {
            command: "rebase".to_string(),
            message: "CONFLICT".to_string(),
        };
        assert!(!conflict.is_transient());
        assert!(conflict.is_conflict());
    }

    #[test]
    fn test_error_codes_are_stable() {
        let err = GitError::Timeout {
            command: "fetch".to_string(),
            timeout_ms: 120_000,
            path: PathBuf::from("/tmp/repo"),
        };
        assert_eq!(err.error_code(), "GIT_TIMEOUT");
    }
}
