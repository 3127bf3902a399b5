use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the fallback category used when no keyword matches.
pub const FALLBACK_CATEGORY: &str = "Others";

const DEFAULT_DATABASE_PATH: &str = "/var/lib/data_organizer/config.db";
const DEFAULT_LOG_DIR: &str = "/var/log/data_organizer";
const DEFAULT_ALLOWED_ROOT: &str = "/mnt";

/// Filename of the process-wide log inside `log_dir`.
pub const PROCESS_LOG_FILE: &str = "organize_files.log";

/// A keyword classification rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub priority: i64,
    pub target_dir: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Category {
    pub fn new(name: &str, priority: i64, target_dir: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            priority,
            target_dir: target_dir.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.name == FALLBACK_CATEGORY
    }
}

/// A configured source/destination directory pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disk {
    pub name: String,
    pub source_dir: String,
    pub sorted_dir: String,
    /// Opaque schedule expression; validated by whoever schedules runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
}

impl Disk {
    pub fn new(name: &str, source_dir: &str, sorted_dir: &str) -> Self {
        Self {
            name: name.to_string(),
            source_dir: source_dir.to_string(),
            sorted_dir: sorted_dir.to_string(),
            schedule: None,
        }
    }

    /// The sorted root, if one is configured.
    pub fn sorted_root(&self) -> Option<&Path> {
        let sorted_dir = self.sorted_dir.trim();
        if sorted_dir.is_empty() {
            None
        } else {
            Some(Path::new(sorted_dir))
        }
    }

    /// The source directory with surrounding whitespace removed.
    pub fn source_path(&self) -> &Path {
        Path::new(self.source_dir.trim())
    }
}

/// Process-level settings, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub log_dir: PathBuf,
    pub allowed_root: PathBuf,
}

impl AppConfig {
    /// Reads `CONFIG_DB`, `LOG_DIR` and `ALLOWED_ROOT`, falling back to the
    /// defaults for unset or blank variables.
    pub fn from_env() -> Self {
        Self {
            database_path: env_path("CONFIG_DB", DEFAULT_DATABASE_PATH),
            log_dir: env_path("LOG_DIR", DEFAULT_LOG_DIR),
            allowed_root: env_path("ALLOWED_ROOT", DEFAULT_ALLOWED_ROOT),
        }
    }

    pub fn process_log_path(&self) -> PathBuf {
        self.log_dir.join(PROCESS_LOG_FILE)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            allowed_root: PathBuf::from(DEFAULT_ALLOWED_ROOT),
        }
    }
}

fn env_path(var: &str, default: &str) -> PathBuf {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value.trim()),
        _ => PathBuf::from(default),
    }
}
