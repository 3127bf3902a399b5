pub mod empty_dirs;
pub mod filesystem;
pub mod guard;

pub use empty_dirs::{delete_empty_dirs, find_empty_dirs, find_empty_dirs_in, CleanupReport};
pub use filesystem::{move_file, FileStorage};
pub use guard::PathGuard;
