//! Publisher pattern database loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for the pattern database document
//! - First-run bootstrap and atomic (temp file + rename) persistence
//! - Alias ownership and semantic validation
//! - Config path resolution (explicit → env → XDG → platform defaults)
//! - JSON Schema export for the database document

pub mod atomic;
pub mod database;
pub mod error;
pub mod resolve;
pub mod validate;

pub use atomic::write_atomic;
pub use database::{
    database_schema, FallbackPatterns, ImagePatterns, MalformedRule, PatternDatabase,
    ProfileConfidence, PublisherProfile, RuleDefinition, DEFAULT_PROMOTION_FLAGS,
    FALLBACK_IDENTITY,
};
pub use error::{ConfigLoadError, DatabaseError, PersistenceError};
pub use resolve::{resolve_paths, ConfigPaths, ResolveError};
pub use validate::{fold, AliasClaim, AliasCollision, AliasTable, ValidationFinding, ValidationReport};

/// Default filename for the pattern database.
pub const DATABASE_FILE_NAME: &str = "publisher_patterns.json";

/// Default filename for the unconfirmed-patterns store.
pub const UNCONFIRMED_FILE_NAME: &str = "unconfirmed_patterns.json";
