use std::path::PathBuf;

use crate::errors::DroverError;

#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    #[error("Worktree path does not exist: {path}")]
    WorktreeMissing { path: PathBuf },

    #[error("Failed to watch '{path}': {message}")]
    WatchFailed { path: PathBuf, message: String },

    #[error("No watcher running for session '{session_id}'")]
    NotWatching { session_id: String },
}

impl DroverError for WatcherError {
    fn error_code(&self) -> &'static str {
        match self {
            WatcherError::WorktreeMissing { .. } => "WATCHER_WORKTREE_MISSING",
            WatcherError::WatchFailed { .. } => "WATCHER_START_FAILED",
            WatcherError::NotWatching { .. } => "WATCHER_NOT_RUNNING",
        }
    }
}
