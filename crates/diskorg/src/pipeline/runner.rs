use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info_span, warn};
use walkdir::WalkDir;

use crate::categorizer::Categorizer;
use crate::config::{load_rules_file, Category};
use crate::db::{category_repo, Database};
use crate::storage::FileStorage;

use super::config::MoveOptions;
use super::error::PipelineError;
use super::progress::{MoveEvent, ProgressReporter};

/// Directory name that marks already-organized content.
pub const SORTED_SEGMENT: &str = "Sorted";

/// Relocates files under a source directory into their category targets.
pub struct MoveEngine {
    categorizer: Categorizer,
    category_count: usize,
}

impl MoveEngine {
    pub fn new(categories: &[Category]) -> Self {
        Self {
            categorizer: Categorizer::new(categories),
            category_count: categories.len(),
        }
    }

    /// Builds an engine from the rule set currently stored in `db`.
    pub fn from_database(db: &Database) -> Result<Self, PipelineError> {
        let categories = category_repo::load_rules(db)?;
        Ok(Self::new(&categories))
    }

    /// Builds an engine from a JSON rule file.
    pub fn from_rules_file(path: &Path) -> Result<Self, PipelineError> {
        let categories = load_rules_file(path)?;
        Ok(Self::new(&categories))
    }

    /// Moves every eligible file under `source_dir` and returns the number
    /// moved, or in dry-run mode the number that would have been moved.
    ///
    /// The file list is taken before the first move. Per-file failures are
    /// reported and skipped; only an unreadable source aborts the run.
    pub fn run(
        &self,
        source_dir: &Path,
        options: &MoveOptions,
        progress: &dyn ProgressReporter,
    ) -> Result<u64, PipelineError> {
        let _run_span = info_span!("move_run",
            source = %source_dir.display(),
            dry_run = options.dry_run,
        )
        .entered();

        check_source(source_dir)?;

        progress.report(MoveEvent::Started {
            source: source_dir.to_path_buf(),
            dry_run: options.dry_run,
            categories: self.category_count,
        });

        let files = {
            let _step = info_span!("collect_files").entered();
            collect_files(source_dir)
        };
        debug!(count = files.len(), "Collected candidate files");

        let storage = FileStorage::new(options.base_directory(source_dir));
        let mut reserved: HashSet<PathBuf> = HashSet::new();
        let mut moved: u64 = 0;

        for file in files {
            if self.process_file(&file, &storage, options, progress, &mut reserved) {
                moved += 1;
            }
        }

        progress.report(MoveEvent::Completed {
            moved,
            dry_run: options.dry_run,
        });
        Ok(moved)
    }

    /// Returns `true` when the file was moved (or would be, in a dry run).
    fn process_file(
        &self,
        file: &Path,
        storage: &FileStorage,
        options: &MoveOptions,
        progress: &dyn ProgressReporter,
        reserved: &mut HashSet<PathBuf>,
    ) -> bool {
        let Some(file_name) = file.file_name() else {
            return false;
        };

        let Some(result) = self.categorizer.categorize(&file_name.to_string_lossy()) else {
            progress.report(MoveEvent::Unmatched {
                file: file.to_path_buf(),
            });
            return false;
        };
        debug!(
            file = %file.display(),
            category = %result.category,
            keyword = result.keyword.as_deref().unwrap_or("-"),
            "Categorized"
        );

        let mut target_dir = storage.target_directory(&result.target_dir);
        if let Some(guard) = &options.guard {
            match guard.check(&target_dir) {
                Ok(resolved) => target_dir = resolved,
                Err(e) => {
                    progress.report(MoveEvent::DestinationFailed {
                        file: file.to_path_buf(),
                        directory: target_dir,
                        error: e.to_string(),
                    });
                    return false;
                }
            }
        }

        if is_in_directory(file, &target_dir) {
            progress.report(MoveEvent::AlreadyInPlace {
                file: file.to_path_buf(),
            });
            return false;
        }

        if options.dry_run {
            if let Err(e) = storage.check_directory_creatable(&target_dir) {
                progress.report(MoveEvent::DestinationFailed {
                    file: file.to_path_buf(),
                    directory: target_dir,
                    error: e.to_string(),
                });
                return false;
            }
            let destination =
                storage.resolve_conflict_reserved(&target_dir, Path::new(file_name), reserved);
            reserved.insert(destination.clone());
            progress.report(MoveEvent::WouldMove {
                from: file.to_path_buf(),
                to: destination,
            });
            return true;
        }

        if let Err(e) = storage.ensure_directory(&target_dir) {
            progress.report(MoveEvent::DestinationFailed {
                file: file.to_path_buf(),
                directory: target_dir,
                error: e.to_string(),
            });
            return false;
        }

        let destination = storage.resolve_conflict(&target_dir, Path::new(file_name));
        match storage.relocate(file, &destination) {
            Ok(()) => {
                progress.report(MoveEvent::Moved {
                    from: file.to_path_buf(),
                    to: destination,
                });
                true
            }
            Err(e) => {
                progress.report(MoveEvent::MoveFailed {
                    from: file.to_path_buf(),
                    error: e.to_string(),
                });
                false
            }
        }
    }
}

/// One-shot form of [`MoveEngine::run`].
pub fn move_files(
    source_dir: &Path,
    categories: &[Category],
    options: &MoveOptions,
    progress: &dyn ProgressReporter,
) -> Result<u64, PipelineError> {
    MoveEngine::new(categories).run(source_dir, options, progress)
}

fn check_source(source_dir: &Path) -> Result<(), PipelineError> {
    let metadata = std::fs::metadata(source_dir).map_err(|e| PipelineError::SourceUnreadable {
        path: source_dir.to_path_buf(),
        source: e,
    })?;
    if !metadata.is_dir() {
        return Err(PipelineError::SourceNotDirectory(source_dir.to_path_buf()));
    }
    std::fs::read_dir(source_dir).map_err(|e| PipelineError::SourceUnreadable {
        path: source_dir.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

/// Regular files under `source_dir`, skipping anything inside a `Sorted`
/// directory. Unreadable subdirectories are logged and skipped.
fn collect_files(source_dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let walker = WalkDir::new(source_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || entry.file_name() != SORTED_SEGMENT);

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        if has_sorted_segment(&path) {
            continue;
        }
        files.push(path);
    }
    files
}

fn has_sorted_segment(path: &Path) -> bool {
    path.components()
        .any(|c| matches!(c, Component::Normal(name) if name == SORTED_SEGMENT))
}

fn is_in_directory(file: &Path, directory: &Path) -> bool {
    match file.parent() {
        Some(parent) if parent == directory => true,
        Some(parent) => match (parent.canonicalize(), directory.canonicalize()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        },
        None => false,
    }
}
