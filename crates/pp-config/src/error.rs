//! Errors from pattern database operations.

use std::path::PathBuf;
use thiserror::Error;

/// The database file could not be read or is structurally invalid.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid pattern database JSON: {source}")]
    Json {
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported pattern database version {found} (expected {expected})")]
    UnsupportedVersion { found: String, expected: String },
}

/// Writing the database (or the unconfirmed store) failed.
///
/// The previous file is still intact: writes go to a temp sibling first.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize: {source}")]
    Json {
        #[source]
        source: serde_json::Error,
    },
}

/// In-memory mutation of the database was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatabaseError {
    #[error("unknown publisher: {0}")]
    UnknownPublisher(String),

    #[error("publisher already exists: {0}")]
    PublisherExists(String),

    #[error("alias '{alias}' already claimed by {owner}")]
    AliasConflict { alias: String, owner: String },

    #[error("invalid publisher name: {0:?}")]
    InvalidName(String),
}

impl From<ConfigLoadError> for pp_common::Error {
    fn from(err: ConfigLoadError) -> Self {
        pp_common::Error::ConfigLoad(err.to_string())
    }
}

impl From<PersistenceError> for pp_common::Error {
    fn from(err: PersistenceError) -> Self {
        pp_common::Error::Persistence(err.to_string())
    }
}

impl From<DatabaseError> for pp_common::Error {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::UnknownPublisher(name) => pp_common::Error::UnknownPublisher(name),
            DatabaseError::PublisherExists(name) => pp_common::Error::PublisherExists(name),
            DatabaseError::AliasConflict { alias, owner } => {
                pp_common::Error::AliasConflict { alias, owner }
            }
            DatabaseError::InvalidName(name) => {
                pp_common::Error::SchemaValidation(format!("invalid publisher name {name:?}"))
            }
        }
    }
}
