use crate::errors::DroverError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Not a git repository: {path}")]
    RepoInvalid { path: std::path::PathBuf },

    #[error("Session '{session_id}' not found")]
    SessionNotFound { session_id: String },

    #[error("Instance '{instance_id}' not found")]
    InstanceNotFound { instance_id: String },

    #[error("Branch '{branch}' is already used by live session '{session_id}'")]
    BranchInUse { branch: String, session_id: String },

    #[error("Failed to prepare branch/worktree: {source}")]
    Prepare {
        #[from]
        source: crate::git::GitError,
    },

    #[error("Settings store failure: {source}")]
    Store {
        #[from]
        source: crate::instances::InstanceError,
    },

    #[error("Watcher failure: {source}")]
    Watcher {
        #[from]
        source: crate::watcher::WatcherError,
    },

    #[error("Rebase watcher failure: {source}")]
    Rebase {
        #[from]
        source: crate::rebase::RebaseError,
    },
}

impl DroverError for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            SessionError::RepoInvalid { .. } => "REPO_INVALID",
            SessionError::SessionNotFound { .. } => "SESSION_NOT_FOUND",
            SessionError::InstanceNotFound { .. } => "INSTANCE_NOT_FOUND",
            SessionError::BranchInUse { .. } => "BRANCH_IN_USE",
            SessionError::Prepare { source } => source.error_code(),
            SessionError::Store { source } => source.error_code(),
            SessionError::Watcher { source } => source.error_code(),
            SessionError::Rebase { source } => source.error_code(),
        }
    }

    fn is_user_error(&self) -> bool {
        matches!(
            self,
            SessionError::RepoInvalid { .. }
                | SessionError::SessionNotFound { .. }
                | SessionError::InstanceNotFound { .. }
                | SessionError::BranchInUse { .. }
        )
    }
}
