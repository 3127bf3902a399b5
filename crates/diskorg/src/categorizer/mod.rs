pub mod matcher;

pub use matcher::{resolve_target, CategorizationResult, Categorizer};
