use std::path::PathBuf;

use crate::errors::DroverError;

#[derive(Debug, thiserror::Error)]
pub enum StateDirError {
    #[error("Failed to create state directory '{path}': {source}")]
    CreateFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize value for '{path}': {message}")]
    SerializeFailed { path: PathBuf, message: String },
}

impl DroverError for StateDirError {
    fn error_code(&self) -> &'static str {
        match self {
            StateDirError::CreateFailed { .. } => "STATE_DIR_CREATE_FAILED",
            StateDirError::WriteFailed { .. } => "STATE_DIR_WRITE_FAILED",
            StateDirError::ReadFailed { .. } => "STATE_DIR_READ_FAILED",
            StateDirError::SerializeFailed { .. } => "STATE_DIR_SERIALIZE_FAILED",
        }
    }
}
