use std::path::PathBuf;

use crate::errors::DroverError;

#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("Failed to watch '{path}': {message}")]
    WatchFailed { path: PathBuf, message: String },

    #[error("Listener is not running")]
    NotRunning,
}

impl DroverError for ListenerError {
    fn error_code(&self) -> &'static str {
        match self {
            ListenerError::WatchFailed { .. } => "LISTENER_WATCH_FAILED",
            ListenerError::NotRunning => "LISTENER_NOT_RUNNING",
        }
    }
}
