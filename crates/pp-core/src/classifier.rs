//! Image classification against a compiled snapshot.
//!
//! Evaluation order is fixed: every `exclude` rule first, then `cover`,
//! `kuchie` and `illustration`, each in ascending priority. The first match
//! wins. A known publisher is evaluated only against its own rules; anything
//! else is evaluated against `__fallback__`.

use crate::ruleset::CompiledRuleSet;
use pp_common::Category;
use pp_config::FALLBACK_IDENTITY;
use serde::{Deserialize, Serialize};

/// How much trust to put in a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchConfidence {
    /// Matched a rule of a known publisher.
    Confirmed,
    /// Matched a generic `__fallback__` rule.
    Fallback,
    /// No rule matched.
    Unmatched,
}

/// The rule that produced a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedRule {
    pub category: Category,
    pub priority: u32,
    pub pattern: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Outcome of classifying one filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub filename: String,
    pub matched: bool,
    pub category: Option<Category>,
    /// Identity whose rules were evaluated (a canonical name or `__fallback__`).
    pub publisher: String,
    pub rule: Option<MatchedRule>,
    pub confidence: MatchConfidence,
}

impl ClassificationResult {
    pub fn is_excluded(&self) -> bool {
        self.category == Some(Category::Exclude)
    }

    pub fn is_unmatched(&self) -> bool {
        !self.matched
    }
}

/// Final path component, accepting both separators.
///
/// Rules are written against bare filenames, but callers often hand over
/// archive paths such as `OEBPS/Images/i-003.jpg`.
pub fn file_name_of(path: &str) -> &str {
    path.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(path)
}

impl CompiledRuleSet {
    /// Classify `filename` for `identity`. Pure: records nothing.
    pub fn classify(&self, filename: &str, identity: &str) -> ClassificationResult {
        let (rules_identity, rules, confidence) = match self.publisher_rules(identity) {
            Some(rules) => (identity, rules, MatchConfidence::Confirmed),
            None => (
                FALLBACK_IDENTITY,
                self.fallback_rules(),
                MatchConfidence::Fallback,
            ),
        };
        let name = file_name_of(filename);

        for category in Category::ALL {
            if let Some(rule) = rules.rules(category).iter().find(|r| r.is_match(name)) {
                return ClassificationResult {
                    filename: filename.to_string(),
                    matched: true,
                    category: Some(category),
                    publisher: rules_identity.to_string(),
                    rule: Some(MatchedRule {
                        category,
                        priority: rule.priority,
                        pattern: rule.pattern.clone(),
                        note: rule.note.clone(),
                    }),
                    confidence,
                };
            }
        }

        ClassificationResult {
            filename: filename.to_string(),
            matched: false,
            category: None,
            publisher: rules_identity.to_string(),
            rule: None,
            confidence: MatchConfidence::Unmatched,
        }
    }
}
