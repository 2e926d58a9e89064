//! Long-lived engine facade.
//!
//! The engine owns the authoritative [`PatternDatabase`], the current
//! [`CompiledRuleSet`] snapshot and the unconfirmed store. Readers clone the
//! snapshot `Arc` and never wait on I/O. Every mutation runs under one write
//! lock covering validate → append → save → rebuild → swap, so concurrent
//! promotions serialize and never lose each other's rules.

use crate::compiler::compile_pattern;
use crate::identifier::ResolvedPublisher;
use crate::learning::SuggestionEngine;
use crate::ruleset::CompiledRuleSet;
use crate::session::ClassificationSession;
use crate::store::{SessionRecord, StoreError, UnconfirmedStore};
use pp_common::Category;
use pp_config::{
    resolve_paths, ConfigPaths, DatabaseError, PatternDatabase, PersistenceError,
    PublisherProfile, ResolveError, DEFAULT_PROMOTION_FLAGS,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use thiserror::Error;
use tracing::{info, warn};

/// A database mutation was rejected or could not be persisted.
#[derive(Debug, Error)]
pub enum PromotionError {
    #[error("unknown publisher: {0}")]
    UnknownPublisher(String),

    #[error("invalid category: {0}")]
    InvalidCategory(String),

    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("publisher already exists: {0}")]
    PublisherExists(String),

    #[error("alias '{alias}' already claimed by {owner}")]
    AliasConflict { alias: String, owner: String },

    #[error("invalid publisher name or alias: {0:?}")]
    InvalidName(String),

    /// The database file could not be loaded; writing now would replace it.
    #[error("pattern database unavailable: {0}")]
    DatabaseUnavailable(String),

    /// The change is applied in memory but not on disk. Retry with
    /// [`Engine::save`].
    #[error("change kept in memory but not saved: {0}")]
    Persistence(#[from] PersistenceError),
}

impl From<DatabaseError> for PromotionError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::UnknownPublisher(name) => Self::UnknownPublisher(name),
            DatabaseError::PublisherExists(name) => Self::PublisherExists(name),
            DatabaseError::AliasConflict { alias, owner } => Self::AliasConflict { alias, owner },
            DatabaseError::InvalidName(name) => Self::InvalidName(name),
        }
    }
}

impl From<PromotionError> for pp_common::Error {
    fn from(err: PromotionError) -> Self {
        match err {
            PromotionError::UnknownPublisher(name) => pp_common::Error::UnknownPublisher(name),
            PromotionError::InvalidCategory(c) => pp_common::Error::InvalidCategory(c),
            PromotionError::InvalidPattern { pattern, reason } => {
                pp_common::Error::InvalidPattern(format!("{pattern}: {reason}"))
            }
            PromotionError::PublisherExists(name) => pp_common::Error::PublisherExists(name),
            PromotionError::AliasConflict { alias, owner } => {
                pp_common::Error::AliasConflict { alias, owner }
            }
            PromotionError::InvalidName(name) => {
                pp_common::Error::SchemaValidation(format!("invalid publisher name {name:?}"))
            }
            PromotionError::DatabaseUnavailable(msg) => {
                pp_common::Error::DatabaseUnavailable(msg)
            }
            PromotionError::Persistence(e) => e.into(),
        }
    }
}

/// Result of a successful promotion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionOutcome {
    pub publisher: String,
    pub category: Category,
    pub priority: u32,
    /// `false` when an identical pattern was already in the list.
    pub created: bool,
}

#[derive(Debug)]
struct DatabaseState {
    db: PatternDatabase,
    unsaved: bool,
    load_warning: Option<String>,
}

/// Pattern engine: classification snapshots, sessions, and curation.
#[derive(Debug)]
pub struct Engine {
    paths: ConfigPaths,
    state: Mutex<DatabaseState>,
    snapshot: RwLock<Arc<CompiledRuleSet>>,
    store: UnconfirmedStore,
    heuristics: Arc<SuggestionEngine>,
}

impl Engine {
    /// Open the engine. Never fails: an unreadable database leaves the engine
    /// running on fallback rules in degraded mode (see [`Engine::load_warning`]).
    pub fn open(paths: ConfigPaths) -> Self {
        let (db, error) = PatternDatabase::load_or_minimal(&paths.database_file);
        db.validate().log();

        let snapshot = Arc::new(CompiledRuleSet::build(&db));
        info!(
            database = %paths.database_file.display(),
            store = %paths.unconfirmed_file.display(),
            publishers = db.publishers.len(),
            skipped_rules = snapshot.skipped_rules().len(),
            degraded = error.is_some(),
            "pattern engine opened"
        );

        Self {
            store: UnconfirmedStore::new(paths.unconfirmed_file.clone()),
            paths,
            state: Mutex::new(DatabaseState {
                db,
                unsaved: false,
                load_warning: error.map(|e| e.to_string()),
            }),
            snapshot: RwLock::new(snapshot),
            heuristics: Arc::new(SuggestionEngine::new()),
        }
    }

    /// Open using paths from the environment and platform defaults.
    pub fn open_default() -> Result<Self, ResolveError> {
        Ok(Self::open(resolve_paths(None, None)?))
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    fn lock_state(&self) -> MutexGuard<'_, DatabaseState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current compiled snapshot.
    pub fn snapshot(&self) -> Arc<CompiledRuleSet> {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn resolve_publisher(&self, raw: &str) -> ResolvedPublisher {
        self.snapshot().resolve(raw)
    }

    /// Start a classification session pinned to the current snapshot.
    pub fn begin_session(&self, source_id: &str, raw_publisher: &str) -> ClassificationSession {
        ClassificationSession::with_heuristics(
            self.snapshot(),
            Arc::clone(&self.heuristics),
            source_id,
            raw_publisher,
        )
    }

    /// Persist a finished session. Sessions without mismatches are dropped
    /// and `Ok(None)` is returned.
    pub fn flush_session(
        &self,
        session: ClassificationSession,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let Some(record) = session.into_record() else {
            return Ok(None);
        };
        self.store.append(&record)?;
        Ok(Some(record))
    }

    /// Unconfirmed store, for curation.
    pub fn store(&self) -> &UnconfirmedStore {
        &self.store
    }

    /// Canonical publisher names in ascending order.
    pub fn list_publishers(&self) -> Vec<String> {
        self.lock_state().db.publisher_names()
    }

    pub fn publisher_profile(&self, name: &str) -> Option<PublisherProfile> {
        self.lock_state().db.publisher(name).cloned()
    }

    /// Copy of the in-memory database.
    pub fn database(&self) -> PatternDatabase {
        self.lock_state().db.clone()
    }

    /// Append an operator-confirmed rule to a publisher's list.
    ///
    /// Checks run in order: publisher exists, category is valid, pattern
    /// compiles. Any failure leaves the database untouched. The new rule gets
    /// the next free priority and case-insensitive matching.
    pub fn promote_pattern(
        &self,
        publisher: &str,
        category: &str,
        pattern: &str,
        note: Option<&str>,
    ) -> Result<PromotionOutcome, PromotionError> {
        let mut state = self.lock_state();
        ensure_writable(&state)?;

        let profile = state
            .db
            .publisher(publisher)
            .ok_or_else(|| PromotionError::UnknownPublisher(publisher.to_string()))?;
        let category: Category = category
            .parse()
            .map_err(|_| PromotionError::InvalidCategory(category.to_string()))?;
        compile_pattern(pattern, DEFAULT_PROMOTION_FLAGS).map_err(|e| {
            PromotionError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            }
        })?;

        if let Some(existing) = profile
            .image_patterns
            .rules(category)
            .iter()
            .find(|r| r.pattern == pattern)
        {
            return Ok(PromotionOutcome {
                publisher: publisher.to_string(),
                category,
                priority: existing.priority,
                created: false,
            });
        }

        let priority =
            state
                .db
                .append_rule(publisher, category, pattern, DEFAULT_PROMOTION_FLAGS, note)?;
        info!(
            publisher = %publisher,
            category = %category,
            pattern = %pattern,
            priority,
            "pattern promoted"
        );

        self.commit(&mut state)?;
        Ok(PromotionOutcome {
            publisher: publisher.to_string(),
            category,
            priority,
            created: true,
        })
    }

    /// Add a new publisher profile.
    pub fn add_publisher(&self, profile: PublisherProfile) -> Result<(), PromotionError> {
        let mut state = self.lock_state();
        ensure_writable(&state)?;

        let name = profile.canonical_name.clone();
        state.db.add_publisher(profile)?;
        info!(publisher = %name, "publisher added");
        self.commit(&mut state)?;
        Ok(())
    }

    /// Add an alias to an existing publisher. Returns `false` if the
    /// publisher already had it.
    pub fn add_alias(&self, publisher: &str, alias: &str) -> Result<bool, PromotionError> {
        let mut state = self.lock_state();
        ensure_writable(&state)?;

        if !state.db.add_alias(publisher, alias)? {
            return Ok(false);
        }
        info!(publisher = %publisher, alias = %alias, "alias added");
        self.commit(&mut state)?;
        Ok(true)
    }

    /// Write the in-memory database to disk, e.g. after a failed save.
    pub fn save(&self) -> Result<(), PromotionError> {
        let mut state = self.lock_state();
        ensure_writable(&state)?;
        state.db.save(&self.paths.database_file)?;
        state.unsaved = false;
        Ok(())
    }

    /// Whether the in-memory database has changes the file lacks.
    pub fn has_unsaved_changes(&self) -> bool {
        self.lock_state().unsaved
    }

    /// Why the database could not be loaded, if it could not.
    pub fn load_warning(&self) -> Option<String> {
        self.lock_state().load_warning.clone()
    }

    pub fn is_degraded(&self) -> bool {
        self.lock_state().load_warning.is_some()
    }

    /// Re-read the database file and rebuild the snapshot. Unsaved in-memory
    /// changes are discarded.
    pub fn reload(&self) -> Option<String> {
        let mut state = self.lock_state();
        let (db, error) = PatternDatabase::load_or_minimal(&self.paths.database_file);
        db.validate().log();

        state.db = db;
        state.unsaved = false;
        state.load_warning = error.map(|e| e.to_string());
        self.swap_snapshot(CompiledRuleSet::build(&state.db));
        info!(degraded = state.load_warning.is_some(), "pattern database reloaded");
        state.load_warning.clone()
    }

    /// Save, then rebuild and swap the snapshot whether or not the save
    /// succeeded. The in-memory database is authoritative either way.
    fn commit(&self, state: &mut DatabaseState) -> Result<(), PersistenceError> {
        let saved = state.db.save(&self.paths.database_file);
        state.unsaved = saved.is_err();
        if let Err(e) = &saved {
            warn!(
                path = %self.paths.database_file.display(),
                error = %e,
                "pattern database not saved; change kept in memory"
            );
        }
        self.swap_snapshot(CompiledRuleSet::build(&state.db));
        saved
    }

    fn swap_snapshot(&self, snapshot: CompiledRuleSet) {
        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(snapshot);
    }
}

fn ensure_writable(state: &DatabaseState) -> Result<(), PromotionError> {
    match &state.load_warning {
        Some(reason) => Err(PromotionError::DatabaseUnavailable(reason.clone())),
        None => Ok(()),
    }
}
