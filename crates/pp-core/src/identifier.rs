//! Publisher identification from free-form metadata text.
//!
//! Publisher strings in source metadata are inconsistent ("株式会社KADOKAWA",
//! "KADOKAWA / 角川書店", "Kadokawa Corporation"), so resolution is substring
//! containment of case-folded aliases rather than equality.
//!
//! When several aliases are contained in the text, the longest alias wins;
//! equal lengths fall back to the lexicographically smallest canonical name.

use pp_config::{fold, AliasTable};
use serde::{Deserialize, Serialize};

/// Whether the publisher text was recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublisherTier {
    Confirmed,
    Unknown,
}

/// Outcome of [`PublisherIdentifier::resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPublisher {
    /// Canonical name when confirmed, otherwise the trimmed raw text.
    pub identity: String,
    pub tier: PublisherTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_alias: Option<String>,
}

impl ResolvedPublisher {
    pub fn unknown(raw: &str) -> Self {
        Self {
            identity: raw.trim().to_string(),
            tier: PublisherTier::Unknown,
            matched_alias: None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.tier == PublisherTier::Confirmed
    }
}

#[derive(Debug, Clone)]
struct AliasEntry {
    alias: String,
    folded: String,
    chars: usize,
    owner: String,
}

/// Alias index built from the database's alias table.
#[derive(Debug, Clone, Default)]
pub struct PublisherIdentifier {
    entries: Vec<AliasEntry>,
}

impl PublisherIdentifier {
    pub fn from_table(table: &AliasTable) -> Self {
        let entries = table
            .claims()
            .iter()
            .map(|claim| AliasEntry {
                alias: claim.alias.clone(),
                folded: claim.folded.clone(),
                chars: claim.folded.chars().count(),
                owner: claim.owner.clone(),
            })
            .collect();
        Self { entries }
    }

    /// Number of aliases (explicit and implicit) in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve raw publisher text. Never fails: unrecognized text comes back
    /// as [`PublisherTier::Unknown`].
    pub fn resolve(&self, raw: &str) -> ResolvedPublisher {
        let text = fold(raw);
        if text.is_empty() {
            return ResolvedPublisher::unknown(raw);
        }

        let mut best: Option<&AliasEntry> = None;
        for entry in self.entries.iter().filter(|e| text.contains(&e.folded)) {
            best = match best {
                None => Some(entry),
                Some(current) => {
                    let longer = entry.chars > current.chars;
                    let tie_smaller =
                        entry.chars == current.chars && entry.owner < current.owner;
                    if longer || tie_smaller {
                        Some(entry)
                    } else {
                        Some(current)
                    }
                }
            };
        }

        match best {
            Some(entry) => ResolvedPublisher {
                identity: entry.owner.clone(),
                tier: PublisherTier::Confirmed,
                matched_alias: Some(entry.alias.clone()),
            },
            None => ResolvedPublisher::unknown(raw),
        }
    }
}
