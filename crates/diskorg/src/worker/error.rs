use std::path::PathBuf;

use thiserror::Error;

use crate::db::DatabaseError;
use crate::error::{ConfigError, StorageError};

/// Errors returned to whoever triggers or inspects runs.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("A run is already in progress ({label})")]
    AlreadyRunning { label: String },

    #[error("Disk '{0}' not found")]
    DiskNotFound(String),

    #[error("Run {0} not found")]
    RunNotFound(i64),

    #[error("A disk name or source path is required")]
    SourceRequired,

    #[error("Path rejected: {0}")]
    Containment(StorageError),

    #[error("Storage error: {0}")]
    Storage(StorageError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Failed to create run log '{path}': {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Log file '{0}' not found")]
    LogNotFound(PathBuf),
}

impl From<StorageError> for RunError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::OutsideRoot { .. } => RunError::Containment(err),
            other => RunError::Storage(other),
        }
    }
}

impl RunError {
    /// Whether the caller asked for something that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RunError::DiskNotFound(_) | RunError::RunNotFound(_) | RunError::LogNotFound(_)
        )
    }
}
