pub mod config;
pub mod error;
pub mod progress;
pub mod runner;

pub use config::MoveOptions;
pub use error::PipelineError;
pub use progress::{
    CollectingProgress, EventLevel, MoveEvent, NoopProgress, ProgressReporter,
};
pub use runner::{move_files, MoveEngine, SORTED_SEGMENT};
