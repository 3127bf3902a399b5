//! Disk repository: named source/sorted directory pairs.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};
use crate::config::Disk;

fn disk_from_row(row: &Row<'_>) -> Result<Disk, rusqlite::Error> {
    Ok(Disk {
        name: row.get("name")?,
        source_dir: row.get("source_dir")?,
        sorted_dir: row.get::<_, Option<String>>("sorted_dir")?.unwrap_or_default(),
        schedule: row.get("schedule")?,
    })
}

pub fn list(db: &Database) -> Result<Vec<Disk>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT name, source_dir, sorted_dir, schedule FROM disks ORDER BY name")?;
        let disks = stmt
            .query_map([], disk_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(disks)
    })
}

pub fn find_by_name(db: &Database, name: &str) -> Result<Option<Disk>, DatabaseError> {
    db.with_conn(|conn| {
        let disk = conn
            .query_row(
                "SELECT name, source_dir, sorted_dir, schedule FROM disks WHERE name = ?1",
                params![name],
                disk_from_row,
            )
            .optional()?;
        Ok(disk)
    })
}

/// Inserts a disk or overwrites the one with the same name. Name and paths
/// are stored trimmed.
pub fn upsert(db: &Database, disk: &Disk) -> Result<(), DatabaseError> {
    let disk = trimmed(disk);
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO disks (name, source_dir, sorted_dir, schedule) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(name) DO UPDATE SET source_dir = excluded.source_dir,
             sorted_dir = excluded.sorted_dir, schedule = excluded.schedule",
            params![disk.name, disk.source_dir, disk.sorted_dir, disk.schedule],
        )?;
        Ok(())
    })
}

/// Updates an existing disk. Returns `false` if no disk has that name.
pub fn update(db: &Database, disk: &Disk) -> Result<bool, DatabaseError> {
    let disk = trimmed(disk);
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE disks SET source_dir = ?2, sorted_dir = ?3, schedule = ?4 WHERE name = ?1",
            params![disk.name, disk.source_dir, disk.sorted_dir, disk.schedule],
        )?;
        Ok(changed > 0)
    })
}

fn trimmed(disk: &Disk) -> Disk {
    Disk {
        name: disk.name.trim().to_string(),
        source_dir: disk.source_dir.trim().to_string(),
        sorted_dir: disk.sorted_dir.trim().to_string(),
        schedule: disk.schedule.clone(),
    }
}

/// Deletes a disk by name. Past runs keep their own copy of the name.
pub fn delete(db: &Database, name: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM disks WHERE name = ?1", params![name])?;
        Ok(changed > 0)
    })
}
