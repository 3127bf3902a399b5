//! Category repository: categories and their keyword sets.
//!
//! Records are normalized on the way in (see
//! [`crate::config::normalize_category`]) so the classifier never sees
//! blank keywords or unnamed categories.

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{Database, DatabaseError};
use crate::config::{load_rules_from_str, normalize_category, Category};
use crate::error::ConfigError;

/// How an imported rule set is combined with the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Upsert by name, leaving other categories alone.
    #[default]
    Merge,
    /// Drop everything and load the imported set.
    Replace,
}

#[derive(Debug, thiserror::Error)]
pub enum RuleStoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// A stored category with its row id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRow {
    pub id: i64,
    #[serde(flatten)]
    pub category: Category,
}

/// Lists categories for display: highest priority first, then by name.
pub fn list(db: &Database) -> Result<Vec<CategoryRow>, DatabaseError> {
    db.with_conn(|conn| {
        read_categories(
            conn,
            "SELECT id, name, priority, target_dir FROM categories ORDER BY priority DESC, name",
        )
    })
}

/// Loads the classifier's rule set in declaration order.
pub fn load_rules(db: &Database) -> Result<Vec<Category>, DatabaseError> {
    let rows = db.with_conn(|conn| {
        read_categories(
            conn,
            "SELECT id, name, priority, target_dir FROM categories ORDER BY id",
        )
    })?;
    Ok(rows.into_iter().map(|row| row.category).collect())
}

pub fn find_by_name(db: &Database, name: &str) -> Result<Option<CategoryRow>, DatabaseError> {
    Ok(list(db)?.into_iter().find(|row| row.category.name == name))
}

/// Inserts or updates a category and replaces its keywords atomically.
pub fn upsert(db: &Database, category: &Category) -> Result<(), RuleStoreError> {
    let category = normalize_category(category.clone())?;
    db.with_transaction(|conn| upsert_in(conn, &category))?;
    Ok(())
}

/// Deletes a category and its keywords. Returns whether it existed.
pub fn delete(db: &Database, name: &str) -> Result<bool, DatabaseError> {
    db.with_transaction(|conn| {
        let id: Option<i64> = conn
            .query_row(
                "SELECT id FROM categories WHERE name = ?1",
                params![name],
                |r| r.get(0),
            )
            .optional()?;
        let Some(id) = id else {
            return Ok(false);
        };
        conn.execute("DELETE FROM keywords WHERE category_id = ?1", params![id])?;
        conn.execute("DELETE FROM categories WHERE id = ?1", params![id])?;
        Ok(true)
    })
}

/// Replaces every category and keyword in one transaction.
pub fn replace_all(db: &Database, categories: &[Category]) -> Result<(), RuleStoreError> {
    let categories = crate::config::normalize_categories(categories.to_vec())?;
    db.with_transaction(|conn| {
        conn.execute_batch("DELETE FROM keywords; DELETE FROM categories;")?;
        for category in &categories {
            upsert_in(conn, category)?;
        }
        Ok(())
    })?;
    Ok(())
}

/// Upserts each category by name in one transaction.
pub fn merge(db: &Database, categories: &[Category]) -> Result<(), RuleStoreError> {
    let categories = crate::config::normalize_categories(categories.to_vec())?;
    db.with_transaction(|conn| {
        for category in &categories {
            upsert_in(conn, category)?;
        }
        Ok(())
    })?;
    Ok(())
}

/// Imports a JSON rule set (array of categories).
pub fn import_json(db: &Database, content: &str, mode: ImportMode) -> Result<usize, RuleStoreError> {
    let categories = load_rules_from_str(content)?;
    match mode {
        ImportMode::Merge => merge(db, &categories)?,
        ImportMode::Replace => replace_all(db, &categories)?,
    }
    log::info!("Imported {} categories ({:?})", categories.len(), mode);
    Ok(categories.len())
}

/// Exports the rule set as pretty JSON in display order.
pub fn export_json(db: &Database) -> Result<String, RuleStoreError> {
    let rows = list(db)?;
    let json = serde_json::to_string_pretty(&rows).map_err(ConfigError::from)?;
    Ok(json)
}

/// Suggested download name for an export taken now.
pub fn export_filename() -> String {
    format!(
        "file-organizer-keywords-{}.json",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    )
}

fn upsert_in(conn: &Connection, category: &Category) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO categories (name, priority, target_dir) VALUES (?1, ?2, ?3)
         ON CONFLICT(name) DO UPDATE SET priority = excluded.priority,
         target_dir = excluded.target_dir",
        params![category.name, category.priority, category.target_dir],
    )?;
    let id: i64 = conn.query_row(
        "SELECT id FROM categories WHERE name = ?1",
        params![category.name],
        |r| r.get(0),
    )?;

    conn.execute("DELETE FROM keywords WHERE category_id = ?1", params![id])?;
    let mut stmt = conn.prepare("INSERT INTO keywords (category_id, keyword) VALUES (?1, ?2)")?;
    for keyword in &category.keywords {
        stmt.execute(params![id, keyword])?;
    }
    Ok(())
}

fn read_categories(conn: &Connection, sql: &str) -> Result<Vec<CategoryRow>, DatabaseError> {
    // One query for all keywords instead of one per category.
    let mut keywords: HashMap<i64, Vec<String>> = HashMap::new();
    let mut stmt = conn.prepare("SELECT category_id, keyword FROM keywords ORDER BY id")?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?)))?;
    for row in rows {
        let (category_id, keyword) = row?;
        keywords.entry(category_id).or_default().push(keyword);
    }

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, Option<i64>>(2)?,
                r.get::<_, String>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows
        .into_iter()
        .map(|(id, name, priority, target_dir)| CategoryRow {
            id,
            category: Category {
                name,
                priority: priority.unwrap_or(0),
                target_dir,
                keywords: keywords.remove(&id).unwrap_or_default(),
            },
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    #[test]
    fn test_upsert_and_list() {
        let db = test_db();
        upsert(&db, &Category::new("Docs", 1, "Docs", &["pdf", "invoice"])).unwrap();
        upsert(&db, &Category::new("Movies", 5, "Movies", &["1080p"])).unwrap();

        let rows = list(&db).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].category.name, "Movies");
        assert_eq!(rows[1].category.keywords, vec!["pdf", "invoice"]);
    }

    #[test]
    fn test_upsert_replaces_keywords() {
        let db = test_db();
        upsert(&db, &Category::new("Docs", 1, "Docs", &["pdf", "invoice"])).unwrap();
        upsert(&db, &Category::new("Docs", 3, "Papers", &["doc"])).unwrap();

        let row = find_by_name(&db, "Docs").unwrap().unwrap();
        assert_eq!(row.category.priority, 3);
        assert_eq!(row.category.target_dir, "Papers");
        assert_eq!(row.category.keywords, vec!["doc"]);
    }

    #[test]
    fn test_upsert_drops_blank_keywords() {
        let db = test_db();
        upsert(&db, &Category::new(" Docs ", 1, "Docs", &[" pdf ", " "])).unwrap();
        let row = find_by_name(&db, "Docs").unwrap().unwrap();
        assert_eq!(row.category.keywords, vec!["pdf"]);
    }

    #[test]
    fn test_upsert_rejects_unnamed() {
        let db = test_db();
        let result = upsert(&db, &Category::new("  ", 1, "Docs", &["pdf"]));
        assert!(matches!(result, Err(RuleStoreError::Config(_))));
    }

    #[test]
    fn test_delete_cascades_keywords() {
        let db = test_db();
        upsert(&db, &Category::new("Docs", 1, "Docs", &["pdf"])).unwrap();

        assert!(delete(&db, "Docs").unwrap());
        assert!(!delete(&db, "Docs").unwrap());

        let remaining: i64 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM keywords", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[test]
    fn test_load_rules_keeps_declaration_order() {
        let db = test_db();
        upsert(&db, &Category::new("Low", 1, "Low", &["a"])).unwrap();
        upsert(&db, &Category::new("High", 9, "High", &["b"])).unwrap();

        let names: Vec<_> = load_rules(&db).unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Low", "High"]);
    }

    #[test]
    fn test_replace_all() {
        let db = test_db();
        upsert(&db, &Category::new("Old", 1, "Old", &["x"])).unwrap();

        replace_all(
            &db,
            &[
                Category::new("A", 1, "A", &["a"]),
                Category::new("B", 2, "B", &["b"]),
            ],
        )
        .unwrap();

        let names: Vec<_> = load_rules(&db).unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_replace_all_is_atomic() {
        let db = test_db();
        upsert(&db, &Category::new("Old", 1, "Old", &["x"])).unwrap();

        let result = replace_all(
            &db,
            &[
                Category::new("A", 1, "A", &["a"]),
                Category::new("A", 2, "B", &["b"]),
            ],
        );
        assert!(result.is_err());
        assert_eq!(load_rules(&db).unwrap()[0].name, "Old");
    }

    #[test]
    fn test_merge_keeps_unrelated() {
        let db = test_db();
        upsert(&db, &Category::new("Keep", 1, "Keep", &["k"])).unwrap();
        upsert(&db, &Category::new("Docs", 1, "Docs", &["pdf"])).unwrap();

        merge(&db, &[Category::new("Docs", 4, "Docs2", &["doc"])]).unwrap();

        let rules = load_rules(&db).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1].target_dir, "Docs2");
    }

    #[test]
    fn test_export_then_import_replace() {
        let db = test_db();
        upsert(&db, &Category::new("Docs", 1, "Docs", &["pdf"])).unwrap();
        let exported = export_json(&db).unwrap();
        assert!(exported.contains("\"target_dir\": \"Docs\""));

        let other = test_db();
        upsert(&other, &Category::new("Stale", 1, "Stale", &["s"])).unwrap();
        let count = import_json(&other, &exported, ImportMode::Replace).unwrap();
        assert_eq!(count, 1);
        assert_eq!(load_rules(&other).unwrap(), load_rules(&db).unwrap());
    }

    #[test]
    fn test_import_rejects_malformed() {
        let db = test_db();
        let result = import_json(&db, "[{\"name\": 3}]", ImportMode::Merge);
        assert!(matches!(result, Err(RuleStoreError::Config(_))));
    }

    #[test]
    fn test_export_filename() {
        let name = export_filename();
        assert!(name.starts_with("file-organizer-keywords-"));
        assert!(name.ends_with(".json"));
    }
}
