//! Per-run log file.
//!
//! Lines look like `<RFC3339 local time> - <LEVEL> - <message>`. Each line
//! is also emitted as a tracing event and pushed to live subscribers.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Local, SecondsFormat};
use tracing::{debug, error, info, warn};

use crate::broadcast::LogBroadcaster;
use crate::pipeline::{EventLevel, MoveEvent, ProgressReporter};

pub struct RunLog {
    run_id: i64,
    path: PathBuf,
    file: Mutex<File>,
    broadcaster: Option<LogBroadcaster>,
}

impl RunLog {
    /// Creates (or appends to) the log file at `path`.
    pub fn open(path: &Path) -> std::io::Result<File> {
        OpenOptions::new().create(true).append(true).open(path)
    }

    pub fn new(run_id: i64, path: &Path, file: File, broadcaster: Option<LogBroadcaster>) -> Self {
        Self {
            run_id,
            path: path.to_path_buf(),
            file: Mutex::new(file),
            broadcaster,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self, message: &str) {
        self.write(EventLevel::Info, message);
    }

    pub fn error(&self, message: &str) {
        self.write(EventLevel::Error, message);
    }

    pub fn write(&self, level: EventLevel, message: &str) {
        let run_id = self.run_id;
        match level {
            EventLevel::Debug => {
                debug!(run_id, "{}", message);
                return;
            }
            EventLevel::Info => info!(run_id, "{}", message),
            EventLevel::Warning => warn!(run_id, "{}", message),
            EventLevel::Error => error!(run_id, "{}", message),
        }

        let line = format_line(level, message);
        let mut file = match self.file.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = file.write_all(line.as_bytes()).and_then(|_| file.flush()) {
            warn!(run_id, path = %self.path.display(), error = %e, "Failed to write run log");
        }
        drop(file);

        if let Some(broadcaster) = &self.broadcaster {
            broadcaster.run_line(run_id, level.as_str(), message);
        }
    }
}

impl ProgressReporter for RunLog {
    fn report(&self, event: MoveEvent) {
        self.write(event.level(), &event.message());
    }
}

/// Formats one run log line, newline included.
pub fn format_line(level: EventLevel, message: &str) -> String {
    format!(
        "{} - {} - {}\n",
        Local::now().to_rfc3339_opts(SecondsFormat::Millis, false),
        level.as_str(),
        message
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn open_log(dir: &TempDir, broadcaster: Option<LogBroadcaster>) -> RunLog {
        let path = dir.path().join("run.log");
        let file = RunLog::open(&path).unwrap();
        RunLog::new(1, &path, file, broadcaster)
    }

    #[test]
    fn test_line_format() {
        let line = format_line(EventLevel::Warning, "careful");
        let mut parts = line.trim_end().splitn(3, " - ");
        let ts = parts.next().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
        assert_eq!(parts.next(), Some("WARNING"));
        assert_eq!(parts.next(), Some("careful"));
        assert!(line.ends_with('\n'));
    }

    #[test]
    fn test_events_are_written_in_order() {
        let dir = TempDir::new().unwrap();
        let log = open_log(&dir, None);

        log.info("starting");
        log.report(MoveEvent::Moved {
            from: PathBuf::from("/a/x.mkv"),
            to: PathBuf::from("/b/x.mkv"),
        });
        log.report(MoveEvent::Unmatched {
            file: PathBuf::from("/a/y.txt"),
        });
        log.error("boom");

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with(" - INFO - starting"));
        assert!(lines[1].ends_with(" - INFO - Moved: /a/x.mkv -> /b/x.mkv"));
        assert!(lines[2].ends_with(" - ERROR - boom"));
    }

    #[test]
    fn test_lines_are_broadcast() {
        let dir = TempDir::new().unwrap();
        let broadcaster = LogBroadcaster::new(16);
        let mut rx = broadcaster.subscribe();
        let log = open_log(&dir, Some(broadcaster));

        log.info("hello");

        let event = rx.try_recv().unwrap();
        assert_eq!(event.run_id, Some(1));
        assert_eq!(event.level, "INFO");
        assert_eq!(event.message, "hello");
    }
}
