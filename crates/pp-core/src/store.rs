//! Unconfirmed-pattern store.
//!
//! Sessions that recorded at least one unmatched image are appended here for
//! an operator to review. Records are never deleted; only their status moves
//! forward (`pending` → `reviewed` → `resolved`).
//!
//! The document is rewritten atomically on every change. A file that cannot be
//! parsed is reported, never replaced.

use crate::session::MismatchEntry;
use chrono::Utc;
use pp_common::schema::SCHEMA_VERSION;
use pp_common::SessionId;
use pp_config::{write_atomic, PersistenceError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use thiserror::Error;
use tracing::{debug, info};

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unconfirmed store {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: SessionStatus,
        to: SessionStatus,
    },
}

impl From<StoreError> for pp_common::Error {
    fn from(err: StoreError) -> Self {
        let message = err.to_string();
        match err {
            StoreError::SessionNotFound(session_id) => {
                pp_common::Error::SessionNotFound { session_id }
            }
            StoreError::InvalidTransition { .. } => {
                pp_common::Error::InvalidStatusTransition(message)
            }
            StoreError::Json { .. } => pp_common::Error::StoreCorrupted(message),
            StoreError::Io { source, .. } => pp_common::Error::Io(source),
            StoreError::Persistence(e) => e.into(),
        }
    }
}

/// Review status of a stored session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Pending,
    Reviewed,
    Resolved,
}

impl SessionStatus {
    /// Status only moves forward; skipping `reviewed` is allowed.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        next > self
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Reviewed => write!(f, "reviewed"),
            Self::Resolved => write!(f, "resolved"),
        }
    }
}

/// One persisted session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    /// RFC 3339 timestamp of when the session started.
    pub detected_at: String,
    /// Identifier of the processed work (usually an EPUB path).
    pub source_epub: String,
    /// Publisher text as found in the source metadata.
    pub publisher_from_opf: String,
    /// Identity whose rules were applied, when it differs from the raw text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_publisher: Option<String>,
    pub unmatched_images: Vec<MismatchEntry>,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<String>,
}

impl SessionRecord {
    fn advance(&mut self, next: SessionStatus) -> Result<(), StoreError> {
        if !self.status.can_transition_to(next) {
            return Err(StoreError::InvalidTransition {
                id: self.id.to_string(),
                from: self.status,
                to: next,
            });
        }
        let now = Utc::now().to_rfc3339();
        if next == SessionStatus::Reviewed {
            self.reviewed_at = Some(now.clone());
        }
        if next == SessionStatus::Resolved {
            self.resolved_at = Some(now);
        }
        self.status = next;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument {
    version: String,
    #[serde(default)]
    sessions: Vec<SessionRecord>,
}

/// Accepted on-disk shapes. Older stores are a bare array of sessions.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoreFile {
    Document(StoreDocument),
    Legacy(Vec<SessionRecord>),
}

/// Write locks shared by every store in the process, keyed by target file.
static PATH_LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();

/// Resolve the parent directory so `a/x.json` and `./a/x.json` share a lock.
fn lock_key(path: &Path) -> PathBuf {
    let (parent, name) = match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => (parent, name),
        _ => return path.to_path_buf(),
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    fs::canonicalize(parent)
        .map(|dir| dir.join(name))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn shared_write_lock(path: &Path) -> Arc<Mutex<()>> {
    let mut locks = PATH_LOCKS
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    Arc::clone(locks.entry(lock_key(path)).or_default())
}

/// File-backed store of unconfirmed sessions.
///
/// Stores opened on the same file within one process serialize their
/// read-modify-write cycles through a shared lock.
#[derive(Debug)]
pub struct UnconfirmedStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl UnconfirmedStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let write_lock = shared_write_lock(&path);
        Self { path, write_lock }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All sessions in insertion order. A missing file is an empty store.
    pub fn list(&self) -> Result<Vec<SessionRecord>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let file: StoreFile =
            serde_json::from_str(&content).map_err(|source| StoreError::Json {
                path: self.path.clone(),
                source,
            })?;
        Ok(match file {
            StoreFile::Document(doc) => doc.sessions,
            StoreFile::Legacy(sessions) => sessions,
        })
    }

    /// Sessions still awaiting review.
    pub fn pending(&self) -> Result<Vec<SessionRecord>, StoreError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|s| s.status == SessionStatus::Pending)
            .collect())
    }

    pub fn get(&self, id: &str) -> Result<SessionRecord, StoreError> {
        self.list()?
            .into_iter()
            .find(|s| s.id.as_str() == id)
            .ok_or_else(|| StoreError::SessionNotFound(id.to_string()))
    }

    /// Append a session, keeping every record already stored.
    pub fn append(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut sessions = self.list()?;
        sessions.push(record.clone());
        self.write_sessions(sessions)?;
        info!(
            session_id = %record.id,
            source = %record.source_epub,
            unmatched = record.unmatched_images.len(),
            "session appended to unconfirmed store"
        );
        Ok(())
    }

    pub fn mark_reviewed(&self, id: &str) -> Result<SessionRecord, StoreError> {
        self.transition(id, SessionStatus::Reviewed)
    }

    pub fn mark_resolved(&self, id: &str) -> Result<SessionRecord, StoreError> {
        self.transition(id, SessionStatus::Resolved)
    }

    fn transition(&self, id: &str, next: SessionStatus) -> Result<SessionRecord, StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut sessions = self.list()?;
        let record = sessions
            .iter_mut()
            .find(|s| s.id.as_str() == id)
            .ok_or_else(|| StoreError::SessionNotFound(id.to_string()))?;
        record.advance(next)?;
        let updated = record.clone();

        self.write_sessions(sessions)?;
        debug!(session_id = %id, status = %next, "session status updated");
        Ok(updated)
    }

    fn write_sessions(&self, sessions: Vec<SessionRecord>) -> Result<(), StoreError> {
        let doc = StoreDocument {
            version: SCHEMA_VERSION.to_string(),
            sessions,
        };
        let mut json = serde_json::to_string_pretty(&doc)
            .map_err(|source| PersistenceError::Json { source })?;
        json.push('\n');
        write_atomic(&self.path, json.as_bytes())?;
        Ok(())
    }
}
