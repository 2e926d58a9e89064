//! Compiled rule snapshot.
//!
//! A [`CompiledRuleSet`] is derived in full from one [`PatternDatabase`]
//! state and never patched afterwards. Sessions hold it behind an `Arc`, so
//! a promotion that swaps in a new snapshot does not disturb classification
//! already in progress.

use crate::compiler::{CompiledRule, PatternCompileError};
use crate::identifier::{PublisherIdentifier, ResolvedPublisher};
use pp_common::Category;
use pp_config::{ImagePatterns, PatternDatabase, FALLBACK_IDENTITY};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// The four compiled rule lists of one identity, each sorted by priority.
#[derive(Debug, Clone, Default)]
pub struct CompiledCategories {
    lists: [Vec<CompiledRule>; 4],
}

impl CompiledCategories {
    fn build(
        identity: &str,
        patterns: &ImagePatterns,
        skipped: &mut Vec<PatternCompileError>,
    ) -> Self {
        let mut compiled = CompiledCategories::default();

        for category in Category::ALL {
            let list = &mut compiled.lists[category.index()];
            for rule in patterns.rules(category) {
                match CompiledRule::compile(rule) {
                    Ok(rule) => list.push(rule),
                    Err(source) => {
                        warn!(
                            profile = %identity,
                            category = %category,
                            pattern = %rule.pattern,
                            error = %source,
                            "skipping rule that failed to compile"
                        );
                        skipped.push(PatternCompileError {
                            publisher: identity.to_string(),
                            category,
                            pattern: rule.pattern.clone(),
                            source,
                        });
                    }
                }
            }
            // Stable: duplicate priorities keep file order.
            list.sort_by_key(|r| r.priority);
        }

        compiled
    }

    /// Compiled rules for a category in ascending priority.
    pub fn rules(&self, category: Category) -> &[CompiledRule] {
        &self.lists[category.index()]
    }

    pub fn len(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Immutable, shareable view of the whole database.
#[derive(Debug, Clone, Default)]
pub struct CompiledRuleSet {
    publishers: BTreeMap<String, CompiledCategories>,
    fallback: CompiledCategories,
    identifier: PublisherIdentifier,
    skipped: Vec<PatternCompileError>,
    source_fingerprint: String,
}

impl CompiledRuleSet {
    /// Compile every rule of `db`. Rules that fail to compile are skipped
    /// and reported through [`CompiledRuleSet::skipped_rules`].
    pub fn build(db: &PatternDatabase) -> Self {
        let mut skipped = Vec::new();

        let publishers = db
            .publishers
            .iter()
            .map(|(name, profile)| {
                (
                    name.clone(),
                    CompiledCategories::build(name, &profile.image_patterns, &mut skipped),
                )
            })
            .collect();
        let fallback = CompiledCategories::build(
            FALLBACK_IDENTITY,
            &db.fallback_patterns.image_patterns,
            &mut skipped,
        );
        let identifier = PublisherIdentifier::from_table(&db.alias_table());

        let set = Self {
            publishers,
            fallback,
            identifier,
            skipped,
            source_fingerprint: db.fingerprint(),
        };
        debug!(
            publishers = set.publishers.len(),
            aliases = set.identifier.len(),
            skipped = set.skipped.len(),
            "compiled rule set built"
        );
        set
    }

    /// Whether `identity` names a publisher with its own rules.
    pub fn is_known(&self, identity: &str) -> bool {
        self.publishers.contains_key(identity)
    }

    /// Compiled rules for a known publisher.
    pub fn publisher_rules(&self, identity: &str) -> Option<&CompiledCategories> {
        self.publishers.get(identity)
    }

    pub fn fallback_rules(&self) -> &CompiledCategories {
        &self.fallback
    }

    pub fn identifier(&self) -> &PublisherIdentifier {
        &self.identifier
    }

    /// Shorthand for `identifier().resolve(raw)`.
    pub fn resolve(&self, raw: &str) -> ResolvedPublisher {
        self.identifier.resolve(raw)
    }

    /// Rules dropped during compilation, with the reason.
    pub fn skipped_rules(&self) -> &[PatternCompileError] {
        &self.skipped
    }

    /// Fingerprint of the database this snapshot was built from.
    pub fn source_fingerprint(&self) -> &str {
        &self.source_fingerprint
    }

    pub fn publisher_names(&self) -> impl Iterator<Item = &str> {
        self.publishers.keys().map(String::as_str)
    }
}
