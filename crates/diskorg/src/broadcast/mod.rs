//! Live streaming of log output.
//!
//! `LogBroadcaster` pushes run log lines to in-process subscribers as they
//! are written; the tailers follow log files on disk for subscribers that
//! attach later.

pub mod log_broadcaster;
pub mod log_tailer;

pub use log_broadcaster::{LogBroadcaster, LogEvent, RUN_LOG_TARGET};
pub use log_tailer::{tail_process_log, tail_run_log, TailEvent, TailOptions};
