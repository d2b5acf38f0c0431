use crate::errors::DroverError;

#[derive(Debug, thiserror::Error)]
pub enum RebaseError {
    #[error("No rebase watcher running for session '{session_id}'")]
    NotWatching { session_id: String },

    #[error("Rebase watcher for '{session_id}' did not answer: {message}")]
    WorkerUnresponsive { session_id: String, message: String },

    #[error("Force check failed for '{session_id}': {message}")]
    ForceCheckFailed { session_id: String, message: String },
}

impl DroverError for RebaseError {
    fn error_code(&self) -> &'static str {
        match self {
            RebaseError::NotWatching { .. } => "REBASE_WATCHER_NOT_RUNNING",
            RebaseError::WorkerUnresponsive { .. } => "REBASE_WORKER_UNRESPONSIVE",
            RebaseError::ForceCheckFailed { .. } => "REBASE_FORCE_CHECK_FAILED",
        }
    }
}
