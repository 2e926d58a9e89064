//! Pattern database document.
//!
//! The database is a single JSON file:
//!
//! ```text
//! {
//!   "version": "1.0.0",
//!   "publishers": {
//!     "KADOKAWA": {
//!       "aliases": ["KADOKAWA", "角川"],
//!       "country": "JP",
//!       "confidence": "high",
//!       "image_patterns": {
//!         "exclude":      [{"pattern": "^gaiji[-_].*\\.(jpe?g|png)$", "flags": "i", "priority": 1}],
//!         "cover":        [...],
//!         "kuchie":       [...],
//!         "illustration": [...]
//!       }
//!     }
//!   },
//!   "fallback_patterns": { "image_patterns": { ... } }
//! }
//! ```
//!
//! Publishers are kept in a `BTreeMap`, so load order (and therefore alias
//! ownership on collision) is ascending canonical name.

use crate::atomic::write_atomic;
use crate::error::{ConfigLoadError, DatabaseError, PersistenceError};
use crate::validate::AliasTable;
use pp_common::schema::{is_compatible, SCHEMA_VERSION};
use pp_common::Category;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info, warn};

/// Identity of the publisher-agnostic rule set.
pub const FALLBACK_IDENTITY: &str = "__fallback__";

/// Flags given to rules created by promotion (case-insensitive).
pub const DEFAULT_PROMOTION_FLAGS: &str = "i";

/// One stored rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RuleDefinition {
    /// Regular expression matched against the bare filename.
    pub pattern: String,

    /// Empty for case-sensitive, `i` (or `IGNORECASE`) for case-insensitive.
    #[serde(default)]
    pub flags: String,

    /// Match precedence within the category; lower wins.
    pub priority: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl RuleDefinition {
    pub fn new(pattern: impl Into<String>, priority: u32) -> Self {
        Self {
            pattern: pattern.into(),
            flags: String::new(),
            priority,
            note: None,
        }
    }

    pub fn with_flags(mut self, flags: impl Into<String>) -> Self {
        self.flags = flags.into();
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// The four ordered rule lists of a profile (or of the fallback set).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ImagePatterns {
    #[serde(default)]
    pub exclude: Vec<RuleDefinition>,

    #[serde(default)]
    pub cover: Vec<RuleDefinition>,

    #[serde(default, alias = "plate")]
    pub kuchie: Vec<RuleDefinition>,

    #[serde(default)]
    pub illustration: Vec<RuleDefinition>,
}

impl ImagePatterns {
    /// Rules stored for a category, in file order.
    pub fn rules(&self, category: Category) -> &[RuleDefinition] {
        match category {
            Category::Exclude => &self.exclude,
            Category::Cover => &self.cover,
            Category::Plate => &self.kuchie,
            Category::Illustration => &self.illustration,
        }
    }

    pub fn rules_mut(&mut self, category: Category) -> &mut Vec<RuleDefinition> {
        match category {
            Category::Exclude => &mut self.exclude,
            Category::Cover => &mut self.cover,
            Category::Plate => &mut self.kuchie,
            Category::Illustration => &mut self.illustration,
        }
    }

    /// Priority a newly appended rule would receive: current max + 1.
    pub fn next_priority(&self, category: Category) -> u32 {
        self.rules(category)
            .iter()
            .map(|r| r.priority)
            .max()
            .map_or(1, |max| max.saturating_add(1))
    }

    /// Total number of stored rules across all categories.
    pub fn len(&self) -> usize {
        Category::ALL.iter().map(|c| self.rules(*c).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Confidence tier recorded for a profile. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProfileConfidence {
    High,
    #[default]
    Medium,
    Low,
}

/// A publisher's canonical identity plus its rule lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PublisherProfile {
    /// Map key in the document; filled in after parsing.
    #[serde(skip)]
    pub canonical_name: String,

    #[serde(default)]
    pub aliases: Vec<String>,

    #[serde(default)]
    pub country: String,

    #[serde(default)]
    pub confidence: ProfileConfidence,

    #[serde(default)]
    pub image_patterns: ImagePatterns,
}

impl PublisherProfile {
    pub fn new(canonical_name: impl Into<String>) -> Self {
        Self {
            canonical_name: canonical_name.into(),
            ..Default::default()
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }

    pub fn with_confidence(mut self, confidence: ProfileConfidence) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_rule(mut self, category: Category, rule: RuleDefinition) -> Self {
        self.image_patterns.rules_mut(category).push(rule);
        self
    }
}

/// Generic rules used as `__fallback__` when no publisher is recognized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FallbackPatterns {
    #[serde(default)]
    pub image_patterns: ImagePatterns,
}

/// The complete pattern database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PatternDatabase {
    pub version: String,

    #[serde(default)]
    pub publishers: BTreeMap<String, PublisherProfile>,

    #[serde(default)]
    pub fallback_patterns: FallbackPatterns,
}

impl Default for PatternDatabase {
    fn default() -> Self {
        Self::minimal()
    }
}

impl PatternDatabase {
    /// Smallest valid database: no publishers, empty fallback rules.
    pub fn minimal() -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            publishers: BTreeMap::new(),
            fallback_patterns: FallbackPatterns::default(),
        }
    }

    /// Parse from a JSON string and check the version.
    ///
    /// Rules that do not deserialize are dropped with a warning; the rest of
    /// the document still loads.
    pub fn from_json(json: &str) -> Result<Self, ConfigLoadError> {
        Self::from_json_with_report(json).map(|(db, _)| db)
    }

    /// Like [`PatternDatabase::from_json`], also returning the dropped rules.
    pub fn from_json_with_report(
        json: &str,
    ) -> Result<(Self, Vec<MalformedRule>), ConfigLoadError> {
        let mut value: Value =
            serde_json::from_str(json).map_err(|source| ConfigLoadError::Json { source })?;
        let malformed = drop_malformed_rules(&mut value);

        let mut db: PatternDatabase =
            serde_json::from_value(value).map_err(|source| ConfigLoadError::Json { source })?;

        if !is_compatible(&db.version) {
            return Err(ConfigLoadError::UnsupportedVersion {
                found: db.version,
                expected: SCHEMA_VERSION.to_string(),
            });
        }

        for (name, profile) in db.publishers.iter_mut() {
            profile.canonical_name = name.clone();
        }
        for rule in &malformed {
            warn!(
                profile = %rule.profile,
                category = %rule.category,
                pattern = %rule.pattern,
                error = %rule.error,
                "skipping malformed rule"
            );
        }
        Ok((db, malformed))
    }

    /// Load from disk.
    ///
    /// A missing file is not an error: a minimal database is synthesized and
    /// written to `path` so the next run finds it. Failure to write that
    /// bootstrap file is logged and otherwise ignored.
    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let db = Self::minimal();
                match db.save(path) {
                    Ok(()) => info!(path = %path.display(), "bootstrapped empty pattern database"),
                    Err(err) => warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to persist bootstrap pattern database"
                    ),
                }
                return Ok(db);
            }
            Err(source) => {
                return Err(ConfigLoadError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let db = Self::from_json(&content)?;
        debug!(
            path = %path.display(),
            publishers = db.publishers.len(),
            "pattern database loaded"
        );
        Ok(db)
    }

    /// Load, falling back to [`PatternDatabase::minimal`] on any error.
    ///
    /// The error is returned alongside so the caller can surface it.
    pub fn load_or_minimal(path: &Path) -> (Self, Option<ConfigLoadError>) {
        match Self::load(path) {
            Ok(db) => (db, None),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "pattern database unreadable, continuing with fallback-only rules"
                );
                (Self::minimal(), Some(e))
            }
        }
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, PersistenceError> {
        serde_json::to_string_pretty(self).map_err(|source| PersistenceError::Json { source })
    }

    /// Write atomically: temp sibling, fsync, rename over `path`.
    pub fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        let mut json = self.to_json()?;
        json.push('\n');
        write_atomic(path, json.as_bytes())?;
        debug!(path = %path.display(), "pattern database saved");
        Ok(())
    }

    /// SHA-256 hex digest of the compact serialized form.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        sha256_hex(json.as_bytes())
    }

    /// Canonical names in load order.
    pub fn publisher_names(&self) -> Vec<String> {
        self.publishers.keys().cloned().collect()
    }

    pub fn publisher(&self, name: &str) -> Option<&PublisherProfile> {
        self.publishers.get(name)
    }

    /// Rules for a publisher, or the fallback set for [`FALLBACK_IDENTITY`].
    pub fn image_patterns(&self, identity: &str) -> Option<&ImagePatterns> {
        if identity == FALLBACK_IDENTITY {
            return Some(&self.fallback_patterns.image_patterns);
        }
        self.publishers.get(identity).map(|p| &p.image_patterns)
    }

    /// Alias ownership for the current document.
    pub fn alias_table(&self) -> AliasTable {
        AliasTable::build(self)
    }

    /// Insert a new profile.
    ///
    /// Rejects duplicate canonical names, a canonical name another profile
    /// already claims as an alias, and aliases already claimed elsewhere.
    pub fn add_publisher(&mut self, mut profile: PublisherProfile) -> Result<(), DatabaseError> {
        let name = profile.canonical_name.trim().to_string();
        if name.is_empty() || name == FALLBACK_IDENTITY {
            return Err(DatabaseError::InvalidName(profile.canonical_name));
        }
        if self.publishers.contains_key(&name) {
            return Err(DatabaseError::PublisherExists(name));
        }

        let table = self.alias_table();
        if let Some(owner) = table.owner(&name) {
            return Err(DatabaseError::AliasConflict {
                alias: name,
                owner: owner.to_string(),
            });
        }
        for alias in &profile.aliases {
            if let Some(owner) = table.owner(alias) {
                return Err(DatabaseError::AliasConflict {
                    alias: alias.clone(),
                    owner: owner.to_string(),
                });
            }
        }

        profile.canonical_name = name.clone();
        self.publishers.insert(name, profile);
        Ok(())
    }

    /// Append an alias to an existing profile.
    ///
    /// Returns `Ok(false)` when the profile already lists it.
    pub fn add_alias(&mut self, publisher: &str, alias: &str) -> Result<bool, DatabaseError> {
        let alias = alias.trim();
        if alias.is_empty() {
            return Err(DatabaseError::InvalidName(alias.to_string()));
        }
        if !self.publishers.contains_key(publisher) {
            return Err(DatabaseError::UnknownPublisher(publisher.to_string()));
        }
        if let Some(owner) = self.alias_table().owner(alias) {
            if owner != publisher {
                return Err(DatabaseError::AliasConflict {
                    alias: alias.to_string(),
                    owner: owner.to_string(),
                });
            }
            return Ok(false);
        }

        let profile = self
            .publishers
            .get_mut(publisher)
            .ok_or_else(|| DatabaseError::UnknownPublisher(publisher.to_string()))?;
        profile.aliases.push(alias.to_string());
        Ok(true)
    }

    /// Append a rule with priority max + 1. Returns the assigned priority.
    pub fn append_rule(
        &mut self,
        publisher: &str,
        category: Category,
        pattern: &str,
        flags: &str,
        note: Option<&str>,
    ) -> Result<u32, DatabaseError> {
        let profile = self
            .publishers
            .get_mut(publisher)
            .ok_or_else(|| DatabaseError::UnknownPublisher(publisher.to_string()))?;

        let priority = profile.image_patterns.next_priority(category);
        let mut rule = RuleDefinition::new(pattern, priority).with_flags(flags);
        rule.note = note.map(str::to_string);
        profile.image_patterns.rules_mut(category).push(rule);
        Ok(priority)
    }
}

/// A stored rule that could not be read and was left out of the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRule {
    pub profile: String,
    /// Key of the rule list as written in the file.
    pub category: String,
    /// The `pattern` value as written, or empty when absent.
    pub pattern: String,
    pub error: String,
}

const RULE_LIST_KEYS: [&str; 5] = ["exclude", "cover", "kuchie", "plate", "illustration"];

/// Remove rule entries that would not deserialize, before the typed parse.
fn drop_malformed_rules(document: &mut Value) -> Vec<MalformedRule> {
    let mut malformed = Vec::new();

    if let Some(publishers) = document.get_mut("publishers").and_then(Value::as_object_mut) {
        for (name, profile) in publishers.iter_mut() {
            if let Some(patterns) = profile.get_mut("image_patterns") {
                drop_malformed_in(name, patterns, &mut malformed);
            }
        }
    }
    if let Some(patterns) = document
        .get_mut("fallback_patterns")
        .and_then(|f| f.get_mut("image_patterns"))
    {
        drop_malformed_in(FALLBACK_IDENTITY, patterns, &mut malformed);
    }

    malformed
}

fn drop_malformed_in(profile: &str, patterns: &mut Value, out: &mut Vec<MalformedRule>) {
    let Some(lists) = patterns.as_object_mut() else {
        return;
    };

    for (key, list) in lists.iter_mut() {
        if !RULE_LIST_KEYS.contains(&key.as_str()) {
            continue;
        }
        let Some(rules) = list.as_array_mut() else {
            out.push(MalformedRule {
                profile: profile.to_string(),
                category: key.clone(),
                pattern: String::new(),
                error: format!("expected a list of rules, found {list}"),
            });
            *list = Value::Array(Vec::new());
            continue;
        };
        rules.retain(|rule| match RuleDefinition::deserialize(rule) {
            Ok(_) => true,
            Err(e) => {
                out.push(MalformedRule {
                    profile: profile.to_string(),
                    category: key.clone(),
                    pattern: match rule.get("pattern") {
                        Some(Value::String(p)) => p.clone(),
                        Some(other) => other.to_string(),
                        None => String::new(),
                    },
                    error: e.to_string(),
                });
                false
            }
        });
    }
}

/// JSON Schema for the database document.
pub fn database_schema() -> schemars::Schema {
    schemars::schema_for!(PatternDatabase)
}

/// Compute SHA-256 hex digest.
fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
