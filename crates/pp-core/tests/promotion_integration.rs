//! End-to-end learning workflow: classify, flush, curate, promote.

use pp_config::{ConfigPaths, PatternDatabase, PublisherProfile, RuleDefinition};
use pp_core::{
    Category, Engine, MatchConfidence, PromotionError, PublisherTier, SessionStatus,
};
use std::fs;
use tempfile::TempDir;

const NEW_PUBLISHER: &str = "新興出版社";
const LEARNED: &str = r"^custom_illust_\d+\.jpe?g$";

fn seeded_engine() -> (Engine, TempDir) {
    let tmp = TempDir::new().unwrap();
    let paths = ConfigPaths::in_dir(tmp.path());

    let mut db = PatternDatabase::minimal();
    db.add_publisher(
        PublisherProfile::new("KADOKAWA")
            .with_aliases(["KADOKAWA", "角川書店"])
            .with_country("JP")
            .with_rule(
                Category::Exclude,
                RuleDefinition::new(r"^gaiji[-_].*\.(jpe?g|png)$", 1).with_flags("i"),
            )
            .with_rule(
                Category::Illustration,
                RuleDefinition::new(r"^i[-_]\d+\.jpe?g$", 1).with_flags("i"),
            ),
    )
    .unwrap();
    db.save(&paths.database_file).unwrap();

    (Engine::open(paths), tmp)
}

#[test]
fn scenario_alias_with_corporate_prefix() {
    let (engine, _tmp) = seeded_engine();
    let resolved = engine.resolve_publisher("株式会社KADOKAWA");
    assert_eq!(resolved.identity, "KADOKAWA");
    assert_eq!(resolved.tier, PublisherTier::Confirmed);
}

#[test]
fn scenario_excluded_image_records_nothing() {
    let (engine, _tmp) = seeded_engine();
    let session = engine.begin_session("book.epub", "KADOKAWA");
    let result = session.classify("gaiji-001.jpg");
    assert!(result.is_excluded());
    assert_eq!(session.mismatch_count(), 0);
}

#[test]
fn scenario_confirmed_illustration() {
    let (engine, _tmp) = seeded_engine();
    let session = engine.begin_session("book.epub", "KADOKAWA");
    let result = session.classify("i-003.jpg");
    assert_eq!(result.category, Some(Category::Illustration));
    assert_eq!(result.confidence, MatchConfidence::Confirmed);
}

#[test]
fn full_learning_loop() {
    let (engine, _tmp) = seeded_engine();

    // Unknown publisher: unmatched, one suggestion recorded.
    let session = engine.begin_session("new.epub", NEW_PUBLISHER);
    assert_eq!(session.publisher().tier, PublisherTier::Unknown);
    let result = session.classify("custom_illust_01.jpg");
    assert!(result.is_unmatched());
    let entries = session.mismatches();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].suggested_category, Some(Category::Illustration));
    assert_eq!(entries[0].suggested_pattern.as_deref(), Some(LEARNED));

    let record = engine.flush_session(session).unwrap().unwrap();
    assert_eq!(engine.store().pending().unwrap().len(), 1);

    // Promotion before the profile exists fails and touches nothing.
    let before = fs::read(&engine.paths().database_file).unwrap();
    let err = engine
        .promote_pattern(NEW_PUBLISHER, "illustration", LEARNED, None)
        .unwrap_err();
    assert!(matches!(err, PromotionError::UnknownPublisher(_)));
    assert_eq!(fs::read(&engine.paths().database_file).unwrap(), before);

    // Create the profile, promote, and classify again.
    engine
        .add_publisher(PublisherProfile::new(NEW_PUBLISHER).with_country("JP"))
        .unwrap();
    let outcome = engine
        .promote_pattern(NEW_PUBLISHER, "illustration", LEARNED, Some("learned"))
        .unwrap();
    assert_eq!(outcome.priority, 1);
    assert!(outcome.created);

    let session = engine.begin_session("new-2.epub", NEW_PUBLISHER);
    let result = session.classify("custom_illust_02.jpg");
    assert_eq!(result.category, Some(Category::Illustration));
    assert_eq!(result.confidence, MatchConfidence::Confirmed);

    let curated = engine.store().mark_resolved(record.id.as_str()).unwrap();
    assert_eq!(curated.status, SessionStatus::Resolved);
    assert!(engine.store().pending().unwrap().is_empty());

    // The rule survives a restart.
    let reopened = Engine::open(engine.paths().clone());
    let session = reopened.begin_session("new-3.epub", NEW_PUBLISHER);
    assert_eq!(
        session.classify("CUSTOM_ILLUST_9.JPEG").category,
        Some(Category::Illustration)
    );
}

#[test]
fn invalid_pattern_leaves_file_byte_identical() {
    let (engine, _tmp) = seeded_engine();
    let path = engine.paths().database_file.clone();
    let before = fs::read(&path).unwrap();

    for (category, pattern) in [("illustration", "^(unclosed"), ("cover", ""), ("kuchie", "[z-a]")] {
        let err = engine
            .promote_pattern("KADOKAWA", category, pattern, None)
            .unwrap_err();
        assert!(matches!(err, PromotionError::InvalidPattern { .. }), "{pattern}");
    }
    let err = engine
        .promote_pattern("KADOKAWA", "poster", r"^p\d+", None)
        .unwrap_err();
    assert!(matches!(err, PromotionError::InvalidCategory(_)));

    assert_eq!(fs::read(&path).unwrap(), before);
    assert!(!engine.has_unsaved_changes());
}

#[test]
fn persistence_failure_keeps_change_in_memory() {
    let (engine, _tmp) = seeded_engine();
    let path = engine.paths().database_file.clone();

    // A non-empty directory where the file should be makes the rename fail.
    fs::remove_file(&path).unwrap();
    fs::create_dir(&path).unwrap();
    fs::write(path.join("keep"), b"x").unwrap();

    let err = engine
        .promote_pattern("KADOKAWA", "cover", r"^hyoushi\.jpe?g$", None)
        .unwrap_err();
    assert!(matches!(err, PromotionError::Persistence(_)));
    assert!(engine.has_unsaved_changes());
    assert!(path.join("keep").exists());

    // In-memory snapshot already has the rule.
    let session = engine.begin_session("book.epub", "KADOKAWA");
    assert_eq!(
        session.classify("hyoushi.jpg").category,
        Some(Category::Cover)
    );

    fs::remove_dir_all(&path).unwrap();
    engine.save().unwrap();
    assert!(!engine.has_unsaved_changes());
    let on_disk = PatternDatabase::load(&path).unwrap();
    assert_eq!(
        on_disk.publishers["KADOKAWA"]
            .image_patterns
            .rules(Category::Cover)
            .len(),
        1
    );
}

#[test]
fn flush_appends_without_overwriting() {
    let (engine, _tmp) = seeded_engine();
    for source in ["a.epub", "b.epub", "c.epub"] {
        let session = engine.begin_session(source, NEW_PUBLISHER);
        session.classify("mystery.bin");
        assert!(engine.flush_session(session).unwrap().is_some());
    }

    let sessions = engine.store().list().unwrap();
    let sources: Vec<_> = sessions.iter().map(|s| s.source_epub.as_str()).collect();
    assert_eq!(sources, vec!["a.epub", "b.epub", "c.epub"]);
    assert!(sessions.iter().all(|s| s.status == SessionStatus::Pending));
    assert!(sessions[0].unmatched_images[0].suggested_category.is_none());
}

#[test]
fn alias_conflict_rejected() {
    let (engine, _tmp) = seeded_engine();
    let err = engine
        .add_publisher(PublisherProfile::new("Kadokawa Shoten").with_aliases(["角川書店"]))
        .unwrap_err();
    assert!(matches!(err, PromotionError::AliasConflict { ref owner, .. } if owner == "KADOKAWA"));
    assert_eq!(engine.list_publishers(), vec!["KADOKAWA".to_string()]);
}
