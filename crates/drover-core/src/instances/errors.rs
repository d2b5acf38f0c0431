use std::path::PathBuf;

use crate::errors::DroverError;

#[derive(Debug, thiserror::Error)]
pub enum InstanceError {
    /// Fatal at startup: coordination cannot run without the settings store.
    #[error("Settings store at '{path}' is unreadable: {message}")]
    StoreUnreadable { path: PathBuf, message: String },

    #[error("Failed to persist settings store at '{path}': {message}")]
    PersistFailed { path: PathBuf, message: String },

    #[error("Instance '{id}' not found")]
    NotFound { id: String },

    #[error("Could not resolve a home directory for the settings store")]
    NoHomeDirectory,
}

impl DroverError for InstanceError {
    fn error_code(&self) -> &'static str {
        match self {
            InstanceError::StoreUnreadable { .. } => "INSTANCE_STORE_UNREADABLE",
            InstanceError::PersistFailed { .. } => "INSTANCE_STORE_PERSIST_FAILED",
            InstanceError::NotFound { .. } => "INSTANCE_NOT_FOUND",
            InstanceError::NoHomeDirectory => "INSTANCE_STORE_NO_HOME",
        }
    }
}
