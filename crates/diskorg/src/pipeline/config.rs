use std::path::{Path, PathBuf};

use crate::config::Disk;
use crate::storage::PathGuard;

/// Options for a single move run.
#[derive(Debug, Clone, Default)]
pub struct MoveOptions {
    /// Report decisions without touching the filesystem.
    pub dry_run: bool,
    /// Base for relative category targets. Falls back to the source
    /// directory when unset.
    pub sorted_root: Option<PathBuf>,
    /// When set, every resolved target directory must stay under its root.
    pub guard: Option<PathGuard>,
}

impl MoveOptions {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    /// Options for a configured disk: its sorted directory becomes the base
    /// for relative targets.
    pub fn for_disk(disk: &Disk, dry_run: bool) -> Self {
        Self {
            dry_run,
            sorted_root: disk.sorted_root().map(Path::to_path_buf),
            guard: None,
        }
    }

    pub fn with_sorted_root<P: AsRef<Path>>(mut self, sorted_root: P) -> Self {
        self.sorted_root = Some(sorted_root.as_ref().to_path_buf());
        self
    }

    pub fn with_guard(mut self, guard: PathGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    /// The directory relative targets resolve against.
    pub fn base_directory<'a>(&'a self, source_dir: &'a Path) -> &'a Path {
        self.sorted_root.as_deref().unwrap_or(source_dir)
    }
}
