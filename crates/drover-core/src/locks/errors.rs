use crate::errors::DroverError;

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("Failed to persist lock table: {source}")]
    PersistFailed {
        #[from]
        source: crate::statedir::StateDirError,
    },

    #[error("Failed to declare files for session '{session_id}': {message}")]
    DeclareFailed { session_id: String, message: String },

    #[error("Failed to release declaration for session '{session_id}': {message}")]
    ReleaseFailed { session_id: String, message: String },
}

impl DroverError for LockError {
    fn error_code(&self) -> &'static str {
        match self {
            LockError::PersistFailed { .. } => "LOCK_PERSIST_FAILED",
            LockError::DeclareFailed { .. } => "LOCK_DECLARE_FAILED",
            LockError::ReleaseFailed { .. } => "LOCK_RELEASE_FAILED",
        }
    }
}
