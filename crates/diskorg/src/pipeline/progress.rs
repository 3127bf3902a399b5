use std::path::PathBuf;
use std::sync::Mutex;

/// Severity of a progress event, mirrored into run log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl EventLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventLevel::Debug => "DEBUG",
            EventLevel::Info => "INFO",
            EventLevel::Warning => "WARNING",
            EventLevel::Error => "ERROR",
        }
    }
}

/// Decisions made by the move engine, one per file plus run boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveEvent {
    Started {
        source: PathBuf,
        dry_run: bool,
        categories: usize,
    },
    /// No category matched and no fallback exists.
    Unmatched { file: PathBuf },
    /// The file already lives in the directory it would be moved to.
    AlreadyInPlace { file: PathBuf },
    /// The target directory could not be created or is outside the root.
    DestinationFailed {
        file: PathBuf,
        directory: PathBuf,
        error: String,
    },
    WouldMove { from: PathBuf, to: PathBuf },
    Moved { from: PathBuf, to: PathBuf },
    MoveFailed { from: PathBuf, error: String },
    Completed { moved: u64, dry_run: bool },
}

impl MoveEvent {
    pub fn level(&self) -> EventLevel {
        match self {
            MoveEvent::Unmatched { .. } | MoveEvent::AlreadyInPlace { .. } => EventLevel::Debug,
            MoveEvent::DestinationFailed { .. } | MoveEvent::MoveFailed { .. } => EventLevel::Error,
            _ => EventLevel::Info,
        }
    }

    /// Human-readable line for the run log.
    pub fn message(&self) -> String {
        match self {
            MoveEvent::Started {
                source,
                dry_run,
                categories,
            } => format!(
                "Starting {}run in {} with {} categories",
                if *dry_run { "dry " } else { "" },
                source.display(),
                categories
            ),
            MoveEvent::Unmatched { file } => format!("No category for {}", file.display()),
            MoveEvent::AlreadyInPlace { file } => {
                format!("Already in place: {}", file.display())
            }
            MoveEvent::DestinationFailed {
                file,
                directory,
                error,
            } => format!(
                "Skipping {}: cannot use destination {}: {}",
                file.display(),
                directory.display(),
                error
            ),
            MoveEvent::WouldMove { from, to } => {
                format!("[DRY-RUN] Would move: {} -> {}", from.display(), to.display())
            }
            MoveEvent::Moved { from, to } => {
                format!("Moved: {} -> {}", from.display(), to.display())
            }
            MoveEvent::MoveFailed { from, error } => {
                format!("Failed to move {}: {}", from.display(), error)
            }
            MoveEvent::Completed { moved, dry_run } => {
                if *dry_run {
                    format!("Dry run complete: {} files would be moved", moved)
                } else {
                    format!("Run complete: {} files moved", moved)
                }
            }
        }
    }
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: MoveEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: MoveEvent) {}
}

/// Keeps every event in memory. Used by tests and callers that want the
/// full decision list after a run.
#[derive(Default)]
pub struct CollectingProgress {
    events: Mutex<Vec<MoveEvent>>,
}

impl CollectingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MoveEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ProgressReporter for CollectingProgress {
    fn report(&self, event: MoveEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
