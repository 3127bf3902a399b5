//! Run orchestration: admission, background execution and completion.
//!
//! At most one run is in flight per process. A trigger is resolved and
//! checked on the caller's thread, then the move itself runs on tokio's
//! blocking pool. The run record is completed before the slot is released,
//! so a tailer that sees `running` flip to a terminal status has already
//! been handed every log line.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::error::RunError;
use super::run_log::RunLog;
use super::task_status::{RunPermit, TaskState, TaskStatus};
use crate::broadcast::{self, LogBroadcaster, TailEvent, TailOptions};
use crate::config::{validate_disk, validate_disk_paths, AppConfig, Disk};
use crate::db::run_repo::{self, RunRecord, RunStatus};
use crate::db::{disk_repo, Database};
use crate::pipeline::{MoveEngine, MoveOptions, PipelineError};
use crate::storage::{self, CleanupReport, PathGuard};

/// Label used for runs against an explicit source path.
pub const CUSTOM_RUN_LABEL: &str = "Custom Run";

const COMPLETE_ATTEMPTS: u32 = 3;
const COMPLETE_RETRY_DELAY: Duration = Duration::from_millis(100);

/// A request to start a run. `disk` wins over `source` when both are set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub disk: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
}

impl RunRequest {
    pub fn for_disk(name: &str, dry_run: bool) -> Self {
        Self {
            disk: Some(name.to_string()),
            source: None,
            dry_run,
        }
    }

    pub fn for_source(source: &str, dry_run: bool) -> Self {
        Self {
            disk: None,
            source: Some(source.to_string()),
            dry_run,
        }
    }
}

/// Final state of a run as seen by the task that executed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub run_id: i64,
    pub status: RunStatus,
    pub files_moved: u64,
}

/// Returned by an accepted trigger.
#[derive(Debug)]
pub struct RunHandle {
    pub run_id: i64,
    pub log_file: PathBuf,
    task: JoinHandle<RunOutcome>,
}

impl RunHandle {
    /// Waits for the run to finish. Dropping the handle instead leaves the
    /// run going in the background.
    pub async fn wait(self) -> RunOutcome {
        let run_id = self.run_id;
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(run_id, error = %e, "Run task did not complete");
                RunOutcome {
                    run_id,
                    status: RunStatus::Error,
                    files_moved: 0,
                }
            }
        }
    }
}

/// Source and destination a trigger resolved to.
struct RunTarget {
    label: String,
    disk_name: Option<String>,
    source: PathBuf,
    sorted_root: Option<PathBuf>,
}

/// Everything the background task owns.
struct RunJob {
    db: Database,
    run_id: i64,
    source: PathBuf,
    options: MoveOptions,
    log: RunLog,
    permit: RunPermit,
}

#[derive(Clone)]
pub struct RunOrchestrator {
    db: Database,
    config: Arc<AppConfig>,
    guard: PathGuard,
    state: TaskState,
    broadcaster: LogBroadcaster,
}

impl RunOrchestrator {
    /// Fails if the configured allowed root does not exist.
    pub fn new(db: Database, config: AppConfig) -> Result<Self, RunError> {
        let guard = PathGuard::new(&config.allowed_root)?;
        info!(
            allowed_root = %guard.root().display(),
            log_dir = %config.log_dir.display(),
            "Run orchestrator ready"
        );
        Ok(Self {
            db,
            config: Arc::new(config),
            guard,
            state: TaskState::new(),
            broadcaster: LogBroadcaster::default(),
        })
    }

    /// Opens the configured database and builds an orchestrator over it.
    pub fn open(config: AppConfig) -> crate::error::Result<Self> {
        let db = Database::open(&config.database_path)?;
        Ok(Self::new(db, config)?)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn guard(&self) -> &PathGuard {
        &self.guard
    }

    pub fn broadcaster(&self) -> &LogBroadcaster {
        &self.broadcaster
    }

    pub fn task_state(&self) -> &TaskState {
        &self.state
    }

    pub fn status(&self) -> TaskStatus {
        self.state.snapshot()
    }

    /// Admits and launches a run, returning as soon as it is recorded.
    ///
    /// Must be called from within a tokio runtime. Rejections (unknown
    /// disk, missing source, path outside the root, run already active)
    /// happen before anything is written.
    pub fn start_run(&self, request: RunRequest) -> Result<RunHandle, RunError> {
        let target = self.resolve_target(&request)?;

        self.guard.check(&target.source)?;
        if let Some(sorted_root) = &target.sorted_root {
            self.guard.check(sorted_root)?;
        }

        let permit = self.state.try_admit(&target.label)?;

        let log_path = self.allocate_log_path(&target.label);
        let log_file = match self.create_log_file(&log_path) {
            Ok(file) => file,
            Err(e) => {
                permit.cancel();
                return Err(e);
            }
        };

        let run_id = match run_repo::create(
            &self.db,
            target.disk_name.as_deref(),
            &target.source.to_string_lossy(),
            &log_path.to_string_lossy(),
        ) {
            Ok(id) => id,
            Err(e) => {
                permit.cancel();
                drop(log_file);
                let _ = std::fs::remove_file(&log_path);
                return Err(e.into());
            }
        };

        info!(
            run_id,
            label = %target.label,
            source = %target.source.display(),
            dry_run = request.dry_run,
            "Run started"
        );

        let mut options = MoveOptions::new(request.dry_run).with_guard(self.guard.clone());
        options.sorted_root = target.sorted_root;

        let job = RunJob {
            db: self.db.clone(),
            run_id,
            source: target.source,
            options,
            log: RunLog::new(run_id, &log_path, log_file, Some(self.broadcaster.clone())),
            permit,
        };
        let task = tokio::task::spawn_blocking(move || {
            execute_run(job, |db, source, options, log| {
                MoveEngine::from_database(db)?.run(source, options, log)
            })
        });

        Ok(RunHandle {
            run_id,
            log_file: log_path,
            task,
        })
    }

    pub fn list_runs(&self) -> Result<Vec<RunRecord>, RunError> {
        Ok(run_repo::list(&self.db)?)
    }

    pub fn get_run(&self, run_id: i64) -> Result<RunRecord, RunError> {
        run_repo::find_by_id(&self.db, run_id)?.ok_or(RunError::RunNotFound(run_id))
    }

    /// Whole contents of a run's log file.
    pub async fn read_run_log(&self, run_id: i64) -> Result<String, RunError> {
        let run = self.get_run(run_id)?;
        let path = PathBuf::from(run.log_file);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RunError::LogNotFound(path)),
            Err(e) => Err(RunError::LogFile { path, source: e }),
        }
    }

    /// Follows a run's log from the start until the run finishes.
    pub fn tail_run(&self, run_id: i64) -> Result<mpsc::Receiver<TailEvent>, RunError> {
        broadcast::tail_run_log(&self.db, run_id, TailOptions::default())
    }

    /// Follows the process-wide log from its current end.
    pub fn tail_process_log(&self) -> mpsc::Receiver<String> {
        broadcast::tail_process_log(&self.config.process_log_path(), TailOptions::default())
    }

    /// Validates and stores a disk. Both directories must exist, be usable
    /// and lie inside the allowed root.
    pub fn save_disk(&self, disk: &Disk) -> Result<(), RunError> {
        validate_disk(disk)?;
        let mut paths = vec![disk.source_dir.trim()];
        if !disk.sorted_dir.trim().is_empty() {
            paths.push(disk.sorted_dir.trim());
        }
        self.guard.check_all(&paths)?;
        validate_disk_paths(&paths)?;
        disk_repo::upsert(&self.db, disk)?;
        info!(disk = %disk.name, "Disk saved");
        Ok(())
    }

    /// Empty directories under `path`.
    pub fn find_empty_dirs(&self, path: &Path) -> Result<Vec<PathBuf>, RunError> {
        Ok(storage::find_empty_dirs(&self.guard, path)?)
    }

    /// Empty directories under a disk's source and sorted trees, sorted and
    /// de-duplicated.
    pub fn empty_dirs_for_disk(&self, name: &str) -> Result<Vec<PathBuf>, RunError> {
        let disk = disk_repo::find_by_name(&self.db, name)?
            .ok_or_else(|| RunError::DiskNotFound(name.to_string()))?;

        let mut roots = vec![disk.source_path()];
        if let Some(sorted_root) = disk.sorted_root() {
            roots.push(sorted_root);
        }
        Ok(storage::find_empty_dirs_in(&self.guard, &roots)?)
    }

    pub fn cleanup_empty_dirs<P: AsRef<Path>>(
        &self,
        paths: &[P],
    ) -> Result<CleanupReport, RunError> {
        let report = storage::delete_empty_dirs(&self.guard, paths)?;
        info!(
            deleted = report.deleted,
            errors = report.errors.len(),
            "Empty directory cleanup finished"
        );
        self.broadcaster.info(
            module_path!(),
            &format!(
                "Deleted {} empty directories ({} errors)",
                report.deleted,
                report.errors.len()
            ),
        );
        Ok(report)
    }

    fn resolve_target(&self, request: &RunRequest) -> Result<RunTarget, RunError> {
        let disk_name = request
            .disk
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty());

        if let Some(name) = disk_name {
            let disk = disk_repo::find_by_name(&self.db, name)?
                .ok_or_else(|| RunError::DiskNotFound(name.to_string()))?;
            return Ok(RunTarget {
                label: disk.name.clone(),
                disk_name: Some(disk.name.clone()),
                source: disk.source_path().to_path_buf(),
                sorted_root: disk.sorted_root().map(Path::to_path_buf),
            });
        }

        let source = request
            .source
            .as_deref()
            .map(str::trim)
            .filter(|source| !source.is_empty())
            .ok_or(RunError::SourceRequired)?;

        Ok(RunTarget {
            label: CUSTOM_RUN_LABEL.to_string(),
            disk_name: None,
            source: PathBuf::from(source),
            sorted_root: None,
        })
    }

    fn allocate_log_path(&self, label: &str) -> PathBuf {
        let token = Uuid::new_v4().simple().to_string();
        self.config
            .log_dir
            .join(format!("run-{}-{}.log", label.replace(' ', "_"), &token[..8]))
    }

    fn create_log_file(&self, path: &Path) -> Result<std::fs::File, RunError> {
        std::fs::create_dir_all(&self.config.log_dir).map_err(|e| RunError::LogFile {
            path: self.config.log_dir.clone(),
            source: e,
        })?;
        RunLog::open(path).map_err(|e| RunError::LogFile {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Runs `work` for an admitted job, then completes the record and releases
/// the slot whatever `work` did, panics included.
fn execute_run<F>(job: RunJob, work: F) -> RunOutcome
where
    F: FnOnce(&Database, &Path, &MoveOptions, &RunLog) -> Result<u64, PipelineError>,
{
    let RunJob {
        db,
        run_id,
        source,
        options,
        log,
        permit,
    } = job;

    log.info(&format!(
        "Starting run for {} (dry_run={})",
        source.display(),
        options.dry_run
    ));

    let result = catch_unwind(AssertUnwindSafe(|| work(&db, &source, &options, &log)));

    let (status, files_moved) = match result {
        Ok(Ok(moved)) => {
            log.info(&format!(
                "Completed run for {}: moved={}",
                source.display(),
                moved
            ));
            (RunStatus::Success, moved)
        }
        Ok(Err(e)) => {
            log.error(&format!("Error during run for {}: {}", source.display(), e));
            (RunStatus::Error, 0)
        }
        Err(panic) => {
            log.error(&format!(
                "Run for {} aborted: {}",
                source.display(),
                panic_message(panic.as_ref())
            ));
            (RunStatus::Error, 0)
        }
    };

    let recorded_count = i64::try_from(files_moved).unwrap_or(i64::MAX);
    complete_record(&db, run_id, status, recorded_count);

    permit.finish(status);
    info!(run_id, status = %status, files_moved, "Run finished");

    RunOutcome {
        run_id,
        status,
        files_moved,
    }
}

fn complete_record(db: &Database, run_id: i64, status: RunStatus, files_moved: i64) {
    for attempt in 1..=COMPLETE_ATTEMPTS {
        match run_repo::complete(db, run_id, status, files_moved) {
            Ok(true) => return,
            Ok(false) => {
                error!(run_id, "Run record was already completed");
                return;
            }
            Err(e) if attempt < COMPLETE_ATTEMPTS => {
                warn!(run_id, attempt, error = %e, "Failed to record run completion, retrying");
                std::thread::sleep(COMPLETE_RETRY_DELAY);
            }
            Err(e) => error!(
                run_id,
                status = %status,
                files_moved,
                error = %e,
                "Failed to record run completion; the run stays 'running' until its row is updated by hand"
            ),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
