use std::collections::HashSet;
use std::path::Path;

use crate::config::schema::{Category, Disk};
use crate::error::ConfigError;

/// Loads a JSON rules file (an array of categories).
pub fn load_rules_file<P: AsRef<Path>>(path: P) -> Result<Vec<Category>, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_rules_from_str(&content)
}

pub fn load_rules_from_str(content: &str) -> Result<Vec<Category>, ConfigError> {
    let categories: Vec<Category> = serde_json::from_str(content)?;
    normalize_categories(categories)
}

/// Trims names and keywords, drops blank keywords and rejects categories
/// without a name or target, or with a duplicated name.
pub fn normalize_categories(categories: Vec<Category>) -> Result<Vec<Category>, ConfigError> {
    let mut seen = HashSet::new();
    let mut normalized = Vec::with_capacity(categories.len());

    for category in categories {
        let category = normalize_category(category)?;
        if !seen.insert(category.name.clone()) {
            return Err(ConfigError::InvalidCategory {
                name: category.name,
                reason: "Duplicate category name".to_string(),
            });
        }
        normalized.push(category);
    }

    Ok(normalized)
}

pub fn normalize_category(category: Category) -> Result<Category, ConfigError> {
    let name = category.name.trim().to_string();
    if name.is_empty() {
        return Err(ConfigError::Validation {
            message: "Category name must not be empty".to_string(),
        });
    }

    let target_dir = category.target_dir.trim().to_string();
    if target_dir.is_empty() {
        return Err(ConfigError::InvalidCategory {
            name,
            reason: "target_dir must not be empty".to_string(),
        });
    }

    let keywords = category
        .keywords
        .iter()
        .map(|kw| kw.trim())
        .filter(|kw| !kw.is_empty())
        .map(str::to_string)
        .collect();

    Ok(Category {
        name,
        priority: category.priority,
        target_dir,
        keywords,
    })
}

/// Shape check for a disk record before it is stored.
pub fn validate_disk(disk: &Disk) -> Result<(), ConfigError> {
    if disk.name.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "Disk name must not be empty".to_string(),
        });
    }
    if disk.source_dir.trim().is_empty() {
        return Err(ConfigError::InvalidDisk {
            name: disk.name.clone(),
            reason: "source_dir must not be empty".to_string(),
        });
    }
    Ok(())
}

/// Checks that every non-blank path exists, is a directory and is both
/// readable and writable. Stops at the first failing path.
pub fn validate_disk_paths(paths: &[&str]) -> Result<(), ConfigError> {
    for raw in paths.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
        let path = Path::new(raw);
        let invalid = |reason: &str| ConfigError::InvalidDiskPath {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        let metadata = std::fs::metadata(path).map_err(|_| invalid("Path does not exist"))?;
        if !metadata.is_dir() {
            return Err(invalid("Path is not a directory"));
        }

        let readable = std::fs::read_dir(path).is_ok();
        let writable = !metadata.permissions().readonly();
        let reason = match (readable, writable) {
            (true, true) => None,
            (false, true) => Some("Path is not readable"),
            (true, false) => Some("Path is not writable"),
            (false, false) => Some("Path is not readable and writable"),
        };
        if let Some(reason) = reason {
            log::error!("Path validation failed for '{}': {}", raw, reason);
            return Err(invalid(reason));
        }
    }
    Ok(())
}
