//! Error types for the publisher pattern engine.

use thiserror::Error;

/// Result type alias for publisher pattern operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the publisher pattern engine.
///
/// Module-level errors convert into this type when a caller needs a single
/// error surface with stable codes.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration load failed: {0}")]
    ConfigLoad(String),

    #[error("pattern compile failed: {0}")]
    PatternCompile(String),

    #[error("schema validation failed: {0}")]
    SchemaValidation(String),

    // Promotion errors (20-29)
    #[error("unknown publisher: {0}")]
    UnknownPublisher(String),

    #[error("invalid category: {0}")]
    InvalidCategory(String),

    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("publisher already exists: {0}")]
    PublisherExists(String),

    #[error("alias '{alias}' already claimed by {owner}")]
    AliasConflict { alias: String, owner: String },

    #[error("pattern database unavailable: {0}")]
    DatabaseUnavailable(String),

    // Session errors (30-39)
    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("invalid session status transition: {0}")]
    InvalidStatusTransition(String),

    #[error("unconfirmed store corrupted: {0}")]
    StoreCorrupted(String),

    // Persistence errors (40-49)
    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    /// Used for detailed error reporting in JSON output.
    pub fn code(&self) -> u32 {
        match self {
            Error::ConfigLoad(_) => 10,
            Error::PatternCompile(_) => 11,
            Error::SchemaValidation(_) => 12,
            Error::UnknownPublisher(_) => 20,
            Error::InvalidCategory(_) => 21,
            Error::InvalidPattern(_) => 22,
            Error::PublisherExists(_) => 23,
            Error::AliasConflict { .. } => 24,
            Error::DatabaseUnavailable(_) => 25,
            Error::SessionNotFound { .. } => 30,
            Error::InvalidStatusTransition(_) => 31,
            Error::StoreCorrupted(_) => 32,
            Error::Persistence(_) => 40,
            Error::Io(_) => 41,
            Error::Json(_) => 42,
        }
    }

    /// Whether the operation left persisted state untouched.
    ///
    /// Everything except a failed save is rejected before any write happens.
    pub fn is_state_preserving(&self) -> bool {
        !matches!(self, Error::Persistence(_) | Error::Io(_))
    }
}
