//! Log broadcasting for real-time log streaming.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// Target used for lines written to a run log.
pub const RUN_LOG_TARGET: &str = "diskorg::run";

#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub target: String,
    /// Set when the line belongs to a run log.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<i64>,
    pub message: String,
}

impl LogEvent {
    pub fn new(level: &str, target: &str, message: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            level: level.to_string(),
            target: target.to_string(),
            run_id: None,
            message: message.to_string(),
        }
    }

    pub fn for_run(run_id: i64, level: &str, message: &str) -> Self {
        Self {
            run_id: Some(run_id),
            ..Self::new(level, RUN_LOG_TARGET, message)
        }
    }
}

#[derive(Clone)]
pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEvent>,
}

impl LogBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn send(&self, event: LogEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn log(&self, level: &str, target: &str, message: &str) {
        self.send(LogEvent::new(level, target, message));
    }

    pub fn run_line(&self, run_id: i64, level: &str, message: &str) {
        self.send(LogEvent::for_run(run_id, level, message));
    }

    pub fn info(&self, target: &str, message: &str) {
        self.log("INFO", target, message);
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new(1000)
    }
}
