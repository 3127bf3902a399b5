//! Builders for test rule sets and disks.

#![allow(dead_code)]

use std::path::Path;

use diskorg::config::{Category, Disk};

pub struct CategoryBuilder {
    name: String,
    priority: i64,
    target_dir: String,
    keywords: Vec<String>,
}

impl CategoryBuilder {
    /// Target defaults to the category name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            priority: 0,
            target_dir: name.to_string(),
            keywords: vec![],
        }
    }

    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn target(mut self, target_dir: &str) -> Self {
        self.target_dir = target_dir.to_string();
        self
    }

    pub fn keyword(mut self, keyword: &str) -> Self {
        self.keywords.push(keyword.to_string());
        self
    }

    pub fn keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords.extend(keywords.iter().map(|k| k.to_string()));
        self
    }

    pub fn build(self) -> Category {
        Category {
            name: self.name,
            priority: self.priority,
            target_dir: self.target_dir,
            keywords: self.keywords,
        }
    }
}

/// Media-library rules used across the integration tests.
pub fn media_rules() -> Vec<Category> {
    vec![
        CategoryBuilder::new("Movies")
            .priority(5)
            .keywords(&["1080p", "bluray"])
            .build(),
        CategoryBuilder::new("Series")
            .priority(9)
            .keywords(&["s01", "s02"])
            .build(),
        CategoryBuilder::new("Docs")
            .priority(1)
            .keywords(&["invoice", ".pdf"])
            .build(),
    ]
}

pub fn with_fallback(mut rules: Vec<Category>, target_dir: &str) -> Vec<Category> {
    rules.push(CategoryBuilder::new("Others").target(target_dir).build());
    rules
}

pub fn disk(name: &str, source: &Path, sorted: Option<&Path>) -> Disk {
    Disk::new(
        name,
        &source.to_string_lossy(),
        &sorted.map(|p| p.to_string_lossy().to_string()).unwrap_or_default(),
    )
}
