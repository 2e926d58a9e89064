//! Property-based tests for identification and classification invariants.

use pp_config::{PatternDatabase, PublisherProfile, RuleDefinition};
use pp_core::{
    Category, ClassificationSession, CompiledRuleSet, MatchConfidence, PublisherTier,
    SuggestionEngine,
};
use proptest::prelude::*;
use std::sync::Arc;
use tempfile::TempDir;

fn alias_sets_strategy() -> impl Strategy<Value = Vec<Vec<String>>> {
    prop::collection::vec(prop::collection::vec("[a-z]{1,6}", 1..4), 1..6)
}

fn database_with_aliases(alias_sets: &[Vec<String>]) -> (PatternDatabase, Vec<(String, String)>) {
    let mut db = PatternDatabase::minimal();
    let mut expected = Vec::new();
    for (i, suffixes) in alias_sets.iter().enumerate() {
        let canonical = format!("Canon{i:02}");
        let aliases: Vec<String> = suffixes.iter().map(|s| format!("PUB{i}-{s}")).collect();
        for alias in &aliases {
            expected.push((alias.clone(), canonical.clone()));
        }
        db.add_publisher(PublisherProfile::new(&canonical).with_aliases(aliases))
            .unwrap();
    }
    (db, expected)
}

fn layered_database() -> PatternDatabase {
    let mut db = PatternDatabase::minimal();
    db.add_publisher(
        PublisherProfile::new("KADOKAWA")
            .with_aliases(["KADOKAWA"])
            .with_rule(
                Category::Exclude,
                RuleDefinition::new(r"^gaiji[-_].*\.(jpe?g|png)$", 1).with_flags("i"),
            )
            .with_rule(
                Category::Cover,
                RuleDefinition::new(r"^cover\.jpe?g$", 1).with_flags("i"),
            )
            .with_rule(
                Category::Plate,
                RuleDefinition::new(r"^k[-_]\d+\.jpe?g$", 1).with_flags("i"),
            )
            .with_rule(Category::Illustration, RuleDefinition::new(r"\.", 1)),
    )
    .unwrap();
    db.fallback_patterns.image_patterns.cover =
        vec![RuleDefinition::new("cover", 1).with_flags("i")];
    db.fallback_patterns.image_patterns.illustration =
        vec![RuleDefinition::new(r"^i[-_]\d+\.jpe?g$", 1).with_flags("i")];
    db
}

fn filename_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "(cover|gaiji-[a-z0-9]{1,4}|k-[0-9]{1,3}|i_[0-9]{1,3}|[a-z]{1,8}[0-9]{0,3})\\.(jpg|jpeg|png|gif)",
        "[A-Za-z0-9_\\-]{1,12}",
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn every_alias_resolves_to_its_profile(
        alias_sets in alias_sets_strategy(),
        prefix in "(株式会社|\\(株\\)|)",
        suffix in "( / 東京|, Inc\\.|)",
    ) {
        let (db, expected) = database_with_aliases(&alias_sets);
        let set = CompiledRuleSet::build(&db);
        for (alias, canonical) in expected {
            let resolved = set.resolve(&format!("{prefix}{alias}{suffix}"));
            prop_assert_eq!(resolved.tier, PublisherTier::Confirmed);
            prop_assert_eq!(&resolved.identity, &canonical);
        }
    }

    #[test]
    fn exclusion_takes_precedence(stem in "[a-z0-9]{1,10}", ext in "(jpg|jpeg|png|JPG)") {
        let set = CompiledRuleSet::build(&layered_database());
        let result = set.classify(&format!("gaiji-{stem}.{ext}"), "KADOKAWA");
        prop_assert_eq!(result.category, Some(Category::Exclude));
    }

    #[test]
    fn lowest_priority_number_wins(name in "[a-z]{1,8}\\.png", low_first in any::<bool>()) {
        let low = RuleDefinition::new(r"\.png$", 1).with_note("low");
        let high = RuleDefinition::new(r"^[a-z]", 2).with_note("high");
        let (a, b) = if low_first { (low, high) } else { (high, low) };

        let mut db = PatternDatabase::minimal();
        db.add_publisher(
            PublisherProfile::new("KADOKAWA")
                .with_rule(Category::Illustration, a)
                .with_rule(Category::Illustration, b),
        )
        .unwrap();
        let set = CompiledRuleSet::build(&db);
        let rule = set.classify(&name, "KADOKAWA").rule.unwrap();
        prop_assert_eq!(rule.priority, 1);
        prop_assert_eq!(rule.note.as_deref(), Some("low"));
    }

    #[test]
    fn unmatched_records_one_entry_per_call(
        names in prop::collection::vec("[a-z_\\-]{1,8}[0-9]{0,3}\\.(jpg|png|webp)", 1..20),
    ) {
        let snapshot = Arc::new(CompiledRuleSet::build(&PatternDatabase::minimal()));
        let session = ClassificationSession::new(snapshot, "book.epub", "新興出版社");
        for name in &names {
            let result = session.classify(name);
            prop_assert!(result.is_unmatched());
            prop_assert_eq!(result.confidence, MatchConfidence::Unmatched);
        }

        let entries = session.mismatches();
        prop_assert_eq!(entries.len(), names.len());
        for (entry, name) in entries.iter().zip(&names) {
            prop_assert_eq!(&entry.filename, name);
            if let Some(category) = entry.suggested_category {
                prop_assert!(Category::ALL.contains(&category));
                prop_assert!(entry.suggested_pattern.is_some());
            }
        }
    }

    #[test]
    fn suggested_patterns_compile_and_match(name in filename_strategy()) {
        let suggestion = SuggestionEngine::new().suggest(&name);
        if let Some(pattern) = suggestion.pattern {
            let regex = pp_core::compile_pattern(&pattern, "i").unwrap();
            prop_assert!(regex.is_match(&name), "{} should match {}", pattern, name);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn save_then_load_classifies_identically(
        corpus in prop::collection::vec(filename_strategy(), 1..30),
    ) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("publisher_patterns.json");
        let db = layered_database();
        db.save(&path).unwrap();
        let loaded = PatternDatabase::load(&path).unwrap();
        prop_assert_eq!(&loaded, &db);

        let before = CompiledRuleSet::build(&db);
        let after = CompiledRuleSet::build(&loaded);
        for name in &corpus {
            for identity in ["KADOKAWA", "新興出版社"] {
                prop_assert_eq!(before.classify(name, identity), after.classify(name, identity));
            }
        }
    }
}
