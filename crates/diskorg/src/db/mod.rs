//! Database module for persistent storage.
//!
//! Uses rusqlite (SQLite) with a thread-safe `Database` handle.
//! All access is serialized through a `Mutex<Connection>`, which is what
//! lets the run store accept writers from the request path and from
//! background runs without extra locking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

pub mod category_repo;
pub mod disk_repo;
pub mod error;
pub mod migrations;
pub mod run_repo;

pub use error::DatabaseError;

/// Thread-safe database handle wrapping a single rusqlite connection.
///
/// Cloning is cheap (inner `Arc`). WAL mode is enabled for file databases.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (or creates) the database at the given path and runs all
    /// pending migrations.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(10))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        migrations::run_all(&conn)?;

        log::info!("Database opened at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory database for testing. Runs all migrations.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        migrations::run_all(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Provides locked access to the underlying connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }

    /// Runs `f` inside a transaction, committing only if it succeeds.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let value = f(&tx)?;
            tx.commit()?;
            Ok(value)
        })
    }

    /// Clears categories, keywords and disks when `clear_existing` is set.
    /// Run history is kept.
    pub fn reset(&self, clear_existing: bool) -> Result<(), DatabaseError> {
        if !clear_existing {
            return Ok(());
        }
        self.with_transaction(|conn| {
            conn.execute_batch(
                "DELETE FROM keywords; DELETE FROM categories; DELETE FROM disks;",
            )?;
            Ok(())
        })?;
        log::info!("Cleared categories, keywords and disks");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Category, Disk};

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let count: u32 =
                conn.query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))?;
            assert!(count > 0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_open_file_db_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.db");
        Database::open(&path).unwrap();
        assert!(path.exists());

        // Reopening an existing database is a no-op migration-wise.
        Database::open(&path).unwrap();
    }

    #[test]
    fn test_database_is_clone() {
        let db = Database::open_in_memory().unwrap();
        let db2 = db.clone();
        disk_repo::upsert(&db, &Disk::new("d1", "/mnt/d1", "")).unwrap();
        assert_eq!(disk_repo::list(&db2).unwrap().len(), 1);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let db = Database::open_in_memory().unwrap();
        let result: Result<(), DatabaseError> = db.with_transaction(|conn| {
            conn.execute(
                "INSERT INTO disks (name, source_dir, sorted_dir) VALUES ('d1', '/a', '')",
                [],
            )?;
            Err(DatabaseError::LockPoisoned)
        });
        assert!(result.is_err());
        assert!(disk_repo::list(&db).unwrap().is_empty());
    }

    #[test]
    fn test_reset_keeps_runs() {
        let db = Database::open_in_memory().unwrap();
        category_repo::upsert(&db, &Category::new("Docs", 1, "Docs", &["pdf"])).unwrap();
        disk_repo::upsert(&db, &Disk::new("d1", "/mnt/d1", "")).unwrap();
        run_repo::create(&db, Some("d1"), "/mnt/d1", "/tmp/run.log").unwrap();

        db.reset(false).unwrap();
        assert_eq!(category_repo::list(&db).unwrap().len(), 1);

        db.reset(true).unwrap();
        assert!(category_repo::list(&db).unwrap().is_empty());
        assert!(disk_repo::list(&db).unwrap().is_empty());
        assert_eq!(run_repo::list(&db).unwrap().len(), 1);
    }
}
