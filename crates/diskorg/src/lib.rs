pub mod broadcast;
pub mod categorizer;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod storage;
pub mod worker;

pub use broadcast::{LogBroadcaster, LogEvent, TailEvent, TailOptions};
pub use categorizer::{resolve_target, CategorizationResult, Categorizer};
pub use config::{load_rules_file, AppConfig, Category, Disk};
pub use db::Database;
pub use error::{ConfigError, DiskorgError, Result, StorageError};
pub use pipeline::{MoveEngine, MoveEvent, MoveOptions, PipelineError, ProgressReporter};
pub use storage::{CleanupReport, PathGuard};
pub use worker::{RunError, RunHandle, RunOrchestrator, RunOutcome, RunRequest, TaskStatus};
