//! Semantic validation of the pattern database.
//!
//! Structural problems (bad JSON, wrong version) fail the load. The checks
//! here never fail it: they produce findings, which are logged, and the
//! engine proceeds with a deterministic interpretation.
//!
//! Alias ownership: explicit aliases are claimed in load order (ascending
//! canonical name), so on collision the first-loaded profile keeps the alias.
//! Each canonical name is then claimed as an implicit alias of its own
//! profile, unless something already owns that text.

use crate::database::{ImagePatterns, PatternDatabase, FALLBACK_IDENTITY};
use pp_common::Category;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::warn;

/// Case-fold used for alias comparison and publisher text matching.
pub fn fold(text: &str) -> String {
    text.trim().to_lowercase()
}

/// One alias owned by one profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasClaim {
    /// Alias as written in the document.
    pub alias: String,
    /// Case-folded form used for matching.
    pub folded: String,
    /// Canonical name of the owning profile.
    pub owner: String,
    /// True for the canonical name standing in as an alias.
    pub implicit: bool,
}

/// An explicit alias that lost to an earlier profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasCollision {
    pub alias: String,
    pub kept_by: String,
    pub rejected_from: String,
}

/// Resolved alias ownership for a database.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    claims: Vec<AliasClaim>,
    by_folded: HashMap<String, usize>,
    collisions: Vec<AliasCollision>,
}

impl AliasTable {
    pub fn build(db: &PatternDatabase) -> Self {
        let mut table = AliasTable::default();

        for (name, profile) in &db.publishers {
            for alias in &profile.aliases {
                let folded = fold(alias);
                if folded.is_empty() {
                    continue;
                }
                match table.by_folded.get(&folded) {
                    Some(&idx) => {
                        let owner = &table.claims[idx].owner;
                        if owner != name {
                            table.collisions.push(AliasCollision {
                                alias: alias.clone(),
                                kept_by: owner.clone(),
                                rejected_from: name.clone(),
                            });
                        }
                    }
                    None => table.push(alias, folded, name, false),
                }
            }
        }

        for name in db.publishers.keys() {
            let folded = fold(name);
            if !folded.is_empty() && !table.by_folded.contains_key(&folded) {
                table.push(name, folded, name, true);
            }
        }

        table
    }

    fn push(&mut self, alias: &str, folded: String, owner: &str, implicit: bool) {
        self.by_folded.insert(folded.clone(), self.claims.len());
        self.claims.push(AliasClaim {
            alias: alias.to_string(),
            folded,
            owner: owner.to_string(),
            implicit,
        });
    }

    /// Every effective claim, explicit ones first.
    pub fn claims(&self) -> &[AliasClaim] {
        &self.claims
    }

    /// Profile that owns `alias` (compared case-folded).
    pub fn owner(&self, alias: &str) -> Option<&str> {
        self.by_folded
            .get(&fold(alias))
            .map(|&idx| self.claims[idx].owner.as_str())
    }

    pub fn collisions(&self) -> &[AliasCollision] {
        &self.collisions
    }
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationFinding {
    /// Two profiles list the same alias; the first-loaded one keeps it.
    AliasCollision {
        alias: String,
        kept_by: String,
        rejected_from: String,
    },
    /// Two rules in one (profile, category) share a priority.
    DuplicatePriority {
        publisher: String,
        category: Category,
        priority: u32,
    },
    /// Another profile's explicit alias equals this canonical name, so text
    /// naming this publisher resolves to the other one.
    ShadowedCanonicalName { publisher: String, owner: String },
    /// A profile lists a blank alias.
    EmptyAlias { publisher: String },
    /// A rule has an empty pattern, which would match everything.
    EmptyPattern {
        publisher: String,
        category: Category,
        priority: u32,
    },
}

impl fmt::Display for ValidationFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AliasCollision {
                alias,
                kept_by,
                rejected_from,
            } => write!(
                f,
                "alias '{alias}' of {rejected_from} is already claimed by {kept_by}"
            ),
            Self::DuplicatePriority {
                publisher,
                category,
                priority,
            } => write!(
                f,
                "{publisher}/{category}: priority {priority} is used more than once"
            ),
            Self::ShadowedCanonicalName { publisher, owner } => write!(
                f,
                "canonical name {publisher} is claimed as an alias by {owner}"
            ),
            Self::EmptyAlias { publisher } => write!(f, "{publisher}: blank alias"),
            Self::EmptyPattern {
                publisher,
                category,
                priority,
            } => write!(
                f,
                "{publisher}/{category}: rule with priority {priority} has an empty pattern"
            ),
        }
    }
}

/// Collected findings for one database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub findings: Vec<ValidationFinding>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    /// Emit every finding as a warning.
    pub fn log(&self) {
        for finding in &self.findings {
            warn!(finding = %finding, "pattern database validation");
        }
    }
}

fn check_rules(publisher: &str, patterns: &ImagePatterns, findings: &mut Vec<ValidationFinding>) {
    for category in Category::ALL {
        let mut seen: BTreeMap<u32, usize> = BTreeMap::new();
        for rule in patterns.rules(category) {
            *seen.entry(rule.priority).or_default() += 1;
            if rule.pattern.is_empty() {
                findings.push(ValidationFinding::EmptyPattern {
                    publisher: publisher.to_string(),
                    category,
                    priority: rule.priority,
                });
            }
        }
        for (priority, count) in seen {
            if count > 1 {
                findings.push(ValidationFinding::DuplicatePriority {
                    publisher: publisher.to_string(),
                    category,
                    priority,
                });
            }
        }
    }
}

impl PatternDatabase {
    /// Run every semantic check.
    pub fn validate(&self) -> ValidationReport {
        let mut findings = Vec::new();

        let table = AliasTable::build(self);
        for collision in table.collisions() {
            findings.push(ValidationFinding::AliasCollision {
                alias: collision.alias.clone(),
                kept_by: collision.kept_by.clone(),
                rejected_from: collision.rejected_from.clone(),
            });
        }

        for (name, profile) in &self.publishers {
            if let Some(owner) = table.owner(name).filter(|owner| *owner != name.as_str()) {
                findings.push(ValidationFinding::ShadowedCanonicalName {
                    publisher: name.clone(),
                    owner: owner.to_string(),
                });
            }
            if profile.aliases.iter().any(|a| a.trim().is_empty()) {
                findings.push(ValidationFinding::EmptyAlias {
                    publisher: name.clone(),
                });
            }
            check_rules(name, &profile.image_patterns, &mut findings);
        }
        check_rules(
            FALLBACK_IDENTITY,
            &self.fallback_patterns.image_patterns,
            &mut findings,
        );

        ValidationReport { findings }
    }
}
