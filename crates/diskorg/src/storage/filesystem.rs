use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Move a file from `src` to `dst`. Uses `rename` first (fast, atomic on same
/// filesystem). Falls back to copy + delete when rename fails, which covers
/// moves across devices.
pub fn move_file(src: &Path, dst: &Path) -> Result<(), StorageError> {
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    let to_error = |e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    };
    std::fs::copy(src, dst).map_err(to_error)?;
    std::fs::remove_file(src).map_err(to_error)?;
    Ok(())
}

/// Resolves classifier targets against a base directory and relocates files
/// into them.
pub struct FileStorage {
    base_directory: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(base_directory: P) -> Self {
        Self {
            base_directory: base_directory.as_ref().to_path_buf(),
        }
    }

    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    /// Relative targets are joined onto the base directory; absolute targets
    /// are used as-is.
    pub fn target_directory(&self, target_dir: &str) -> PathBuf {
        self.base_directory.join(target_dir)
    }

    pub fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        if !path.is_dir() {
            std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }

    /// Checks that [`ensure_directory`](Self::ensure_directory) could create
    /// `path` without creating anything: the nearest existing ancestor must
    /// be a directory.
    pub fn check_directory_creatable(&self, path: &Path) -> Result<(), StorageError> {
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            match std::fs::metadata(ancestor) {
                Ok(metadata) if metadata.is_dir() => return Ok(()),
                Ok(_) => {
                    return Err(StorageError::CreateDirectory {
                        path: path.to_path_buf(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::AlreadyExists,
                            format!("'{}' is not a directory", ancestor.display()),
                        ),
                    })
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(StorageError::CreateDirectory {
                        path: path.to_path_buf(),
                        source: e,
                    })
                }
            }
        }
        Ok(())
    }

    /// Returns the first free name in `directory`: `name.ext`, then
    /// `name_1.ext`, `name_2.ext`, and so on.
    ///
    /// The probe is sequential and unbounded. `symlink_metadata` is used so
    /// that dangling symlinks count as taken.
    pub fn resolve_conflict(&self, directory: &Path, filename: &Path) -> PathBuf {
        next_free_path(directory, filename, |path| {
            std::fs::symlink_metadata(path).is_ok()
        })
    }

    /// Like [`resolve_conflict`](Self::resolve_conflict), but also treats
    /// `reserved` paths as taken. Dry runs use this to account for
    /// destinations they have already handed out.
    pub fn resolve_conflict_reserved(
        &self,
        directory: &Path,
        filename: &Path,
        reserved: &HashSet<PathBuf>,
    ) -> PathBuf {
        next_free_path(directory, filename, |path| {
            reserved.contains(path) || std::fs::symlink_metadata(path).is_ok()
        })
    }

    pub fn relocate(&self, source: &Path, destination: &Path) -> Result<(), StorageError> {
        move_file(source, destination)
    }
}

fn next_free_path<F>(directory: &Path, filename: &Path, is_taken: F) -> PathBuf
where
    F: Fn(&Path) -> bool,
{
    let path = directory.join(filename);
    if !is_taken(&path) {
        return path;
    }

    let stem = filename
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| filename.as_os_str().to_os_string());
    let extension = filename.extension();

    let mut counter: u64 = 1;
    loop {
        let mut candidate = OsString::from(&stem);
        candidate.push(format!("_{}", counter));
        if let Some(ext) = extension {
            candidate.push(".");
            candidate.push(ext);
        }

        let candidate_path = directory.join(candidate);
        if !is_taken(&candidate_path) {
            return candidate_path;
        }
        counter += 1;
    }
}
