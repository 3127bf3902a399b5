//! Process-wide logging setup.
//!
//! Logs go to stderr and are appended to `<log_dir>/organize_files.log`,
//! the file the process-log tailer follows. Records from the `log` facade
//! are forwarded into tracing.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Layer};

use crate::config::AppConfig;

const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Failed to open log file '{path}': {source}")]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Logging is already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Installs the global subscriber. `RUST_LOG` overrides the default `info`
/// filter. A second call returns [`LoggingError::AlreadyInitialized`].
pub fn init(config: &AppConfig) -> Result<(), LoggingError> {
    let log_path = config.process_log_path();
    std::fs::create_dir_all(&config.log_dir).map_err(|e| LoggingError::OpenFile {
        path: config.log_dir.clone(),
        source: e,
    })?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| LoggingError::OpenFile {
            path: log_path.clone(),
            source: e,
        })?;

    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    let subscriber = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_filter(filter()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(filter()),
        );

    tracing_log::LogTracer::init().map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    tracing::info!(log_file = %log_path.display(), "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_second_init_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let config = AppConfig {
            database_path: tmp.path().join("config.db"),
            log_dir: tmp.path().join("logs"),
            allowed_root: tmp.path().to_path_buf(),
        };

        // Another test binary may already own the global subscriber, so the
        // first call is allowed to fail too; the second never succeeds.
        let _ = init(&config);
        assert!(matches!(
            init(&config),
            Err(LoggingError::AlreadyInitialized(_))
        ));
        assert!(config.process_log_path().exists());
    }
}
