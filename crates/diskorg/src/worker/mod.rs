pub mod error;
pub mod orchestrator;
pub mod run_log;
pub mod task_status;

pub use error::RunError;
pub use orchestrator::{RunHandle, RunOrchestrator, RunOutcome, RunRequest, CUSTOM_RUN_LABEL};
pub use run_log::RunLog;
pub use task_status::{RunPermit, TaskPhase, TaskState, TaskStatus};
