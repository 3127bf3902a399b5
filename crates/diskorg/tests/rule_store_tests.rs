//! Rule import/export and database reset.

mod common;

use common::{media_rules, CategoryBuilder, TestHarness};
use diskorg::categorizer::Categorizer;
use diskorg::config::load_rules_file;
use diskorg::db::category_repo::{self, ImportMode};
use diskorg::db::{disk_repo, run_repo};

#[test]
fn test_rules_file_feeds_classifier() {
    let harness = TestHarness::new();
    let path = harness.temp_path().join("rules.json");
    std::fs::write(
        &path,
        r#"[
            {"name": "Movies", "priority": 5, "target_dir": "Movies", "keywords": ["1080P", " "]},
            {"name": "Others", "target_dir": "Misc"}
        ]"#,
    )
    .unwrap();

    let rules = load_rules_file(&path).unwrap();
    let categorizer = Categorizer::new(&rules);
    assert_eq!(categorizer.resolve_target("a.1080p.mkv").as_deref(), Some("Movies"));
    assert_eq!(categorizer.resolve_target("a.txt").as_deref(), Some("Misc"));
}

#[test]
fn test_export_import_round_trip_between_databases() {
    let source = TestHarness::new();
    source.add_rules(&media_rules());
    let exported = category_repo::export_json(&source.db).unwrap();

    let target = TestHarness::new();
    target.add_rules(&[CategoryBuilder::new("Stale").keyword("old").build()]);

    category_repo::import_json(&target.db, &exported, ImportMode::Merge).unwrap();
    assert_eq!(category_repo::list(&target.db).unwrap().len(), 4);

    category_repo::import_json(&target.db, &exported, ImportMode::Replace).unwrap();
    let names: Vec<String> = category_repo::list(&target.db)
        .unwrap()
        .into_iter()
        .map(|row| row.category.name)
        .collect();
    assert_eq!(names, vec!["Series", "Movies", "Docs"]);
}

#[test]
fn test_reset_clears_config_but_keeps_history() {
    let harness = TestHarness::new();
    harness.add_rules(&media_rules());
    harness.add_disk("media", None);
    run_repo::create(&harness.db, Some("media"), "/mnt/disk1", "/tmp/r.log").unwrap();

    harness.db.reset(true).unwrap();

    assert!(category_repo::list(&harness.db).unwrap().is_empty());
    assert!(disk_repo::list(&harness.db).unwrap().is_empty());
    assert_eq!(run_repo::list(&harness.db).unwrap().len(), 1);
}
