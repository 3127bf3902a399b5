//! Test harness for isolated test execution.
//!
//! Each `TestHarness` owns a temp directory laid out like a host:
//! - `mnt/` is the allowed root, with `mnt/disk1` as the default source
//! - `logs/` receives run logs
//!
//! and an in-memory database with migrations applied.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;

use diskorg::config::{AppConfig, Category};
use diskorg::db::{category_repo, disk_repo, Database};
use diskorg::worker::RunOrchestrator;

use super::builders::disk;

pub struct TestHarness {
    temp_dir: TempDir,
    pub root: PathBuf,
    pub source_dir: PathBuf,
    pub log_dir: PathBuf,
    pub db: Database,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let root = base.join("mnt");
        let source_dir = root.join("disk1");
        let log_dir = base.join("logs");
        std::fs::create_dir_all(&source_dir).expect("Failed to create source dir");

        let db = Database::open_in_memory().expect("Failed to open database");

        Self {
            temp_dir,
            root,
            source_dir,
            log_dir,
            db,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config(&self) -> AppConfig {
        AppConfig {
            database_path: self.temp_path().join("config.db"),
            log_dir: self.log_dir.clone(),
            allowed_root: self.root.clone(),
        }
    }

    pub fn orchestrator(&self) -> RunOrchestrator {
        RunOrchestrator::new(self.db.clone(), self.config()).expect("Failed to build orchestrator")
    }

    /// Writes a file under the source directory, creating parents.
    pub fn write_source(&self, relative: &str) -> PathBuf {
        let path = self.source_dir.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        std::fs::write(&path, relative.as_bytes()).expect("Failed to write source file");
        path
    }

    pub fn add_rules(&self, rules: &[Category]) {
        for category in rules {
            category_repo::upsert(&self.db, category).expect("Failed to store category");
        }
    }

    /// Registers `disk1` with an optional sorted root (relative to `mnt/`).
    pub fn add_disk(&self, name: &str, sorted: Option<&str>) {
        let sorted = sorted.map(|s| self.root.join(s));
        disk_repo::upsert(&self.db, &disk(name, &self.source_dir, sorted.as_deref()))
            .expect("Failed to store disk");
    }

    /// Every regular file under `dir`, relative to it, sorted.
    pub fn files_under(&self, dir: &Path) -> Vec<String> {
        let mut files: Vec<String> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                e.path()
                    .strip_prefix(dir)
                    .ok()
                    .map(|p| p.to_string_lossy().to_string())
            })
            .collect();
        files.sort();
        files
    }

    /// Polls until the orchestrator reports idle.
    pub async fn wait_until_idle(&self, orchestrator: &RunOrchestrator) {
        for _ in 0..200 {
            if !orchestrator.status().is_running() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("run did not finish in time");
    }
}
