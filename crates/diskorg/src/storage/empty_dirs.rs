//! Empty-directory scanning and cleanup.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::StorageError;
use crate::storage::PathGuard;

/// Outcome of a cleanup batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub deleted: usize,
    pub errors: Vec<String>,
}

/// Lists every directory under `root` (including `root`) that currently has
/// no entries at all.
///
/// The walk is bottom-up, so children are inspected before their parent.
/// Nothing is deleted here: a parent holding only empty children is not
/// empty yet and shows up on a later scan once those children are removed.
pub fn find_empty_dirs(guard: &PathGuard, root: &Path) -> Result<Vec<PathBuf>, StorageError> {
    let root = guard.check(root)?;
    let mut empty = Vec::new();

    for entry in WalkDir::new(&root).contents_first(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        match is_empty_dir(entry.path()) {
            Ok(true) => empty.push(entry.into_path()),
            Ok(false) => {}
            Err(e) => warn!("{}", e),
        }
    }

    Ok(empty)
}

/// Scans several roots, skipping ones that do not exist, and returns the
/// union sorted and de-duplicated.
pub fn find_empty_dirs_in(
    guard: &PathGuard,
    roots: &[&Path],
) -> Result<Vec<PathBuf>, StorageError> {
    let mut all = Vec::new();
    for root in roots.iter().filter(|r| r.exists()) {
        all.extend(find_empty_dirs(guard, root)?);
    }
    all.sort();
    all.dedup();
    Ok(all)
}

/// Deletes each path that is still an existing, empty directory.
///
/// Every path is checked against the guard first; a single path outside the
/// root rejects the whole batch before anything is removed. Paths that no
/// longer qualify, or fail to delete, are reported in `errors`.
pub fn delete_empty_dirs<P: AsRef<Path>>(
    guard: &PathGuard,
    paths: &[P],
) -> Result<CleanupReport, StorageError> {
    guard.check_all(paths)?;

    let mut report = CleanupReport::default();
    for path in paths {
        let path = path.as_ref();
        let qualifies = path.is_dir() && matches!(is_empty_dir(path), Ok(true));
        if !qualifies {
            report
                .errors
                .push(format!("Skipped (not empty or not found): {}", path.display()));
            continue;
        }

        match std::fs::remove_dir(path) {
            Ok(()) => {
                info!("Deleted empty directory: {}", path.display());
                report.deleted += 1;
            }
            Err(e) => {
                let err = StorageError::RemoveDirectory {
                    path: path.to_path_buf(),
                    source: e,
                };
                report.errors.push(err.to_string());
            }
        }
    }

    Ok(report)
}

fn is_empty_dir(path: &Path) -> Result<bool, StorageError> {
    let mut entries = std::fs::read_dir(path).map_err(|e| StorageError::ReadDirectory {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(entries.next().is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathGuard, PathBuf) {
        let dir = TempDir::new().unwrap();
        let guard = PathGuard::new(dir.path()).unwrap();
        let root = guard.root().join("disk");
        std::fs::create_dir_all(&root).unwrap();
        (dir, guard, root)
    }

    #[test]
    fn test_reports_leaf_then_parent_after_delete() {
        let (_dir, guard, root) = setup();
        std::fs::create_dir_all(root.join("parent/leaf")).unwrap();
        std::fs::write(root.join("keep.txt"), b"x").unwrap();

        let first = find_empty_dirs(&guard, &root).unwrap();
        assert_eq!(first, vec![root.join("parent/leaf")]);

        let report = delete_empty_dirs(&guard, &first).unwrap();
        assert_eq!(report.deleted, 1);
        assert!(report.errors.is_empty());

        let second = find_empty_dirs(&guard, &root).unwrap();
        assert_eq!(second, vec![root.join("parent")]);
    }

    #[test]
    fn test_empty_root_is_reported() {
        let (_dir, guard, root) = setup();
        assert_eq!(find_empty_dirs(&guard, &root).unwrap(), vec![root]);
    }

    #[test]
    fn test_directories_with_files_not_reported() {
        let (_dir, guard, root) = setup();
        std::fs::create_dir_all(root.join("a")).unwrap();
        std::fs::write(root.join("a/file.txt"), b"x").unwrap();
        assert!(find_empty_dirs(&guard, &root).unwrap().is_empty());
    }

    #[test]
    fn test_delete_skips_non_empty_and_missing() {
        let (_dir, guard, root) = setup();
        std::fs::create_dir_all(root.join("full")).unwrap();
        std::fs::write(root.join("full/file.txt"), b"x").unwrap();

        let paths = vec![root.join("full"), root.join("missing")];
        let report = delete_empty_dirs(&guard, &paths).unwrap();
        assert_eq!(report.deleted, 0);
        assert_eq!(report.errors.len(), 2);
        assert!(root.join("full/file.txt").exists());
    }

    #[test]
    fn test_delete_rejects_paths_outside_root() {
        let (dir, guard, root) = setup();
        let outside = TempDir::new().unwrap();
        std::fs::create_dir_all(root.join("empty")).unwrap();

        let paths = vec![root.join("empty"), outside.path().to_path_buf()];
        let result = delete_empty_dirs(&guard, &paths);
        assert!(matches!(result, Err(StorageError::OutsideRoot { .. })));
        // Nothing was deleted, not even the in-root path.
        assert!(root.join("empty").exists());
        assert!(outside.path().exists());
        drop(dir);
    }

    #[test]
    fn test_scan_rejects_root_outside_guard() {
        let (_dir, guard, _root) = setup();
        let outside = TempDir::new().unwrap();
        let result = find_empty_dirs(&guard, outside.path());
        assert!(matches!(result, Err(StorageError::OutsideRoot { .. })));
    }

    #[test]
    fn test_find_in_multiple_roots_dedups() {
        let (_dir, guard, root) = setup();
        std::fs::create_dir_all(root.join("src/empty")).unwrap();
        std::fs::create_dir_all(root.join("src/Sorted/empty")).unwrap();

        let src = root.join("src");
        let sorted = root.join("src/Sorted");
        let missing = root.join("nope");
        let found = find_empty_dirs_in(&guard, &[&src, &sorted, &missing]).unwrap();
        assert_eq!(
            found,
            vec![root.join("src/Sorted/empty"), root.join("src/empty")]
        );
    }
}
