//! Run repository: one row per triggered run.
//!
//! A run is inserted as `running` and completed exactly once. Rows are
//! never deleted here.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{Database, DatabaseError};

/// Persisted status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(RunStatus::Running),
            "success" => Some(RunStatus::Success),
            "error" => Some(RunStatus::Error),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRecord {
    pub id: i64,
    /// `None` for an ad-hoc run against an explicit path.
    pub disk_name: Option<String>,
    pub source_path: String,
    pub status: RunStatus,
    /// Set on completion.
    pub files_moved: Option<i64>,
    pub log_file: String,
    pub start_ts: DateTime<Utc>,
    pub end_ts: Option<DateTime<Utc>>,
}

struct RawRun {
    id: i64,
    disk_name: Option<String>,
    source_path: String,
    status: String,
    files_moved: Option<i64>,
    log_file: String,
    start_ts: String,
    end_ts: Option<String>,
}

impl RawRun {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            disk_name: row.get("disk_name")?,
            source_path: row.get("source_path")?,
            status: row.get("status")?,
            files_moved: row.get("files_moved")?,
            log_file: row.get("log_file")?,
            start_ts: row.get("start_ts")?,
            end_ts: row.get("end_ts")?,
        })
    }

    fn into_record(self) -> Result<RunRecord, DatabaseError> {
        let id = self.id;
        let corrupt = |reason: String| DatabaseError::CorruptRow {
            table: "runs",
            id,
            reason,
        };

        let status = RunStatus::parse(&self.status)
            .ok_or_else(|| corrupt(format!("unknown status '{}'", self.status)))?;
        let start_ts = parse_timestamp(&self.start_ts).map_err(corrupt)?;
        let end_ts = self
            .end_ts
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .map_err(corrupt)?;

        Ok(RunRecord {
            id,
            disk_name: self.disk_name,
            source_path: self.source_path,
            status,
            files_moved: self.files_moved,
            log_file: self.log_file,
            start_ts,
            end_ts,
        })
    }
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("bad timestamp '{}': {}", s, e))
}

/// Inserts a new `running` run and returns its id.
pub fn create(
    db: &Database,
    disk_name: Option<&str>,
    source_path: &str,
    log_file: &str,
) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO runs (disk_name, source_path, status, log_file, start_ts)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                disk_name,
                source_path,
                RunStatus::Running.as_str(),
                log_file,
                format_timestamp(Utc::now()),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Records the terminal outcome of a run.
///
/// Only a run that is still `running` is updated, so a second completion is
/// a no-op. Returns whether the row changed.
pub fn complete(
    db: &Database,
    id: i64,
    status: RunStatus,
    files_moved: i64,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE runs SET status = ?2, files_moved = ?3, end_ts = ?4
             WHERE id = ?1 AND status = ?5",
            params![
                id,
                status.as_str(),
                files_moved,
                format_timestamp(Utc::now()),
                RunStatus::Running.as_str(),
            ],
        )?;
        Ok(changed > 0)
    })
}

pub fn find_by_id(db: &Database, id: i64) -> Result<Option<RunRecord>, DatabaseError> {
    let raw = db.with_conn(|conn| {
        let raw = conn
            .query_row(
                "SELECT * FROM runs WHERE id = ?1",
                params![id],
                RawRun::from_row,
            )
            .optional()?;
        Ok(raw)
    })?;
    raw.map(RawRun::into_record).transpose()
}

/// Current status of a run, or `None` if it does not exist.
pub fn status_of(db: &Database, id: i64) -> Result<Option<RunStatus>, DatabaseError> {
    Ok(find_by_id(db, id)?.map(|run| run.status))
}

/// All runs, most recent first.
pub fn list(db: &Database) -> Result<Vec<RunRecord>, DatabaseError> {
    let raws = db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM runs ORDER BY start_ts DESC, id DESC")?;
        let raws = stmt
            .query_map([], RawRun::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(raws)
    })?;
    raws.into_iter().map(RawRun::into_record).collect()
}
