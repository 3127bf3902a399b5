pub mod loader;
pub mod schema;

pub use loader::{
    load_rules_file, load_rules_from_str, normalize_categories, normalize_category,
    validate_disk, validate_disk_paths,
};
pub use schema::{AppConfig, Category, Disk, FALLBACK_CATEGORY, PROCESS_LOG_FILE};
