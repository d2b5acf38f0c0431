use std::path::PathBuf;

use crate::errors::DroverError;

#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    #[error("Cannot recover session '{session_id}': {message}")]
    RecoverFailed { session_id: String, message: String },

    #[error("Failed to delete orphaned session '{session_id}' at '{path}': {message}")]
    DeleteFailed {
        session_id: String,
        path: PathBuf,
        message: String,
    },

    #[error("Settings store error: {source}")]
    Store {
        #[from]
        source: crate::instances::InstanceError,
    },
}

impl DroverError for RecoveryError {
    fn error_code(&self) -> &'static str {
        match self {
            RecoveryError::RecoverFailed { .. } => "RECOVER_SESSION_FAILED",
            RecoveryError::DeleteFailed { .. } => "DELETE_ORPHAN_FAILED",
            RecoveryError::Store { .. } => "INSTANCE_STORE_PERSIST_FAILED",
        }
    }
}
