//! Containment checks against the operator-configured root.
//!
//! Every externally supplied path must resolve inside the allowed root
//! before the filesystem is touched.

use std::io;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

#[derive(Debug, Clone)]
pub struct PathGuard {
    root: PathBuf,
}

impl PathGuard {
    /// Canonicalizes `root`; it must already exist.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, StorageError> {
        let root = root.as_ref();
        let canonical = root.canonicalize().map_err(|e| StorageError::InvalidRoot {
            path: root.to_path_buf(),
            source: e,
        })?;
        Ok(Self { root: canonical })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `path` (following symlinks for the part that exists) and
    /// returns the resolved path if it lies within the root.
    pub fn check<P: AsRef<Path>>(&self, path: P) -> Result<PathBuf, StorageError> {
        let path = path.as_ref();
        let outside = || StorageError::OutsideRoot {
            path: path.to_path_buf(),
            root: self.root.clone(),
        };

        let resolved = resolve(path).map_err(|_| outside())?;
        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            Err(outside())
        }
    }

    pub fn check_all<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<PathBuf>, StorageError> {
        paths.iter().map(|p| self.check(p)).collect()
    }

    pub fn contains<P: AsRef<Path>>(&self, path: P) -> bool {
        self.check(path).is_ok()
    }
}

/// Canonicalizes the longest existing ancestor and re-appends the missing
/// tail. A missing tail containing `..` cannot be resolved and is an error.
fn resolve(path: &Path) -> io::Result<PathBuf> {
    let mut existing = path.to_path_buf();
    let mut missing = Vec::new();

    loop {
        match existing.canonicalize() {
            Ok(mut canonical) => {
                for component in missing.iter().rev() {
                    canonical.push(component);
                }
                return Ok(canonical);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let (Some(name), Some(parent)) = (existing.file_name(), existing.parent()) else {
                    return Err(e);
                };
                missing.push(name.to_os_string());
                existing = if parent.as_os_str().is_empty() {
                    PathBuf::from(".")
                } else {
                    parent.to_path_buf()
                };
            }
            Err(e) => return Err(e),
        }
    }
}
