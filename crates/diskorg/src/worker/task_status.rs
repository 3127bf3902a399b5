//! Shared status of the single run slot.
//!
//! The status lives behind one mutex for the life of the process. A run is
//! admitted by an atomic check-and-set that hands back a [`RunPermit`]; the
//! permit returns the slot to idle when it is dropped, whatever happened to
//! the run in between.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::error::RunError;
use crate::db::run_repo::RunStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    #[default]
    Idle,
    Running,
}

/// Snapshot of the run slot, suitable for a status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TaskStatus {
    pub status: TaskPhase,
    /// Label of the active run: a disk name or `Custom Run`.
    pub disk: Option<String>,
    pub last_run_ts: Option<DateTime<Utc>>,
    pub last_run_status: Option<RunStatus>,
}

impl TaskStatus {
    pub fn is_running(&self) -> bool {
        self.status == TaskPhase::Running
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskState {
    inner: Arc<Mutex<TaskStatus>>,
}

impl TaskState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> TaskStatus {
        self.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.lock().is_running()
    }

    /// Claims the run slot for `label`, or fails if a run is active.
    pub fn try_admit(&self, label: &str) -> Result<RunPermit, RunError> {
        let mut status = self.lock();
        if status.is_running() {
            return Err(RunError::AlreadyRunning {
                label: status.disk.clone().unwrap_or_default(),
            });
        }
        status.status = TaskPhase::Running;
        status.disk = Some(label.to_string());
        Ok(RunPermit {
            state: self.clone(),
            outcome: None,
            cancelled: false,
        })
    }

    // A poisoned lock still holds a usable status.
    fn lock(&self) -> MutexGuard<'_, TaskStatus> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Holds the run slot. Dropping it resets the slot to idle.
///
/// A permit dropped without [`finish`](Self::finish) records the run as
/// failed; one released with [`cancel`](Self::cancel) leaves the last-run
/// fields untouched.
#[derive(Debug)]
pub struct RunPermit {
    state: TaskState,
    outcome: Option<RunStatus>,
    cancelled: bool,
}

impl RunPermit {
    pub fn finish(mut self, status: RunStatus) {
        self.outcome = Some(status);
    }

    /// Releases a slot whose run never started.
    pub fn cancel(mut self) {
        self.cancelled = true;
    }
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        let mut status = self.state.lock();
        status.status = TaskPhase::Idle;
        status.disk = None;
        if !self.cancelled {
            status.last_run_status = Some(self.outcome.unwrap_or(RunStatus::Error));
            status.last_run_ts = Some(Utc::now());
        }
    }
}
