use std::path::PathBuf;

use thiserror::Error;

/// Failures that abort a move run before any file is touched.
///
/// Per-file problems (unwritable destination, failed move) are reported
/// through the progress reporter and never surface here.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to load category rules: {0}")]
    Config(#[from] crate::error::ConfigError),

    #[error("Failed to read category rules from database: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Source directory '{path}' is not readable: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Source path '{0}' is not a directory")]
    SourceNotDirectory(PathBuf),
}
