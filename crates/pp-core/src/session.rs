//! Per-run classification sessions.
//!
//! A session is created for each processed work. It pins the rule snapshot
//! current at creation time and accumulates one [`MismatchEntry`] per
//! unmatched image. Sessions share nothing mutable with each other.

use crate::classifier::{file_name_of, ClassificationResult};
use crate::identifier::ResolvedPublisher;
use crate::learning::SuggestionEngine;
use crate::ruleset::CompiledRuleSet;
use crate::store::{SessionRecord, SessionStatus};
use chrono::{DateTime, Utc};
use pp_common::{Category, SessionId};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// An image no rule matched, with the heuristic guess for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MismatchEntry {
    pub filename: String,
    #[serde(rename = "suggested_type")]
    pub suggested_category: Option<Category>,
    pub suggested_pattern: Option<String>,
    #[serde(rename = "reason")]
    pub rationale: String,
}

/// Classification state for one processing run of one source work.
#[derive(Debug)]
pub struct ClassificationSession {
    id: SessionId,
    source_id: String,
    raw_publisher: String,
    publisher: ResolvedPublisher,
    snapshot: Arc<CompiledRuleSet>,
    heuristics: Arc<SuggestionEngine>,
    started_at: DateTime<Utc>,
    mismatches: Mutex<Vec<MismatchEntry>>,
}

impl ClassificationSession {
    /// Start a session, resolving `raw_publisher` against the snapshot.
    pub fn new(
        snapshot: Arc<CompiledRuleSet>,
        source_id: impl Into<String>,
        raw_publisher: impl Into<String>,
    ) -> Self {
        Self::with_heuristics(
            snapshot,
            Arc::new(SuggestionEngine::new()),
            source_id,
            raw_publisher,
        )
    }

    pub fn with_heuristics(
        snapshot: Arc<CompiledRuleSet>,
        heuristics: Arc<SuggestionEngine>,
        source_id: impl Into<String>,
        raw_publisher: impl Into<String>,
    ) -> Self {
        let raw_publisher = raw_publisher.into();
        let publisher = snapshot.resolve(&raw_publisher);
        let session = Self {
            id: SessionId::new(),
            source_id: source_id.into(),
            raw_publisher,
            publisher,
            snapshot,
            heuristics,
            started_at: Utc::now(),
            mismatches: Mutex::new(Vec::new()),
        };
        debug!(
            session_id = %session.id,
            source = %session.source_id,
            publisher = %session.publisher.identity,
            tier = ?session.publisher.tier,
            "classification session started"
        );
        session
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn raw_publisher(&self) -> &str {
        &self.raw_publisher
    }

    pub fn publisher(&self) -> &ResolvedPublisher {
        &self.publisher
    }

    /// The snapshot pinned when the session started.
    pub fn snapshot(&self) -> &Arc<CompiledRuleSet> {
        &self.snapshot
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Classify with the session's resolved publisher.
    pub fn classify(&self, filename: &str) -> ClassificationResult {
        self.classify_as(filename, &self.publisher.identity)
    }

    /// Classify with an explicit identity. Unmatched images are recorded.
    pub fn classify_as(&self, filename: &str, identity: &str) -> ClassificationResult {
        let result = self.snapshot.classify(filename, identity);
        if result.is_unmatched() {
            self.record_mismatch(filename);
        }
        result
    }

    pub fn classify_all<'a, I>(&self, filenames: I) -> Vec<ClassificationResult>
    where
        I: IntoIterator<Item = &'a str>,
    {
        filenames.into_iter().map(|f| self.classify(f)).collect()
    }

    fn record_mismatch(&self, filename: &str) {
        let suggestion = self.heuristics.suggest(filename);
        let entry = MismatchEntry {
            filename: file_name_of(filename).to_string(),
            suggested_category: suggestion.category,
            suggested_pattern: suggestion.pattern,
            rationale: suggestion.rationale,
        };
        debug!(
            session_id = %self.id,
            filename = %entry.filename,
            suggested = ?entry.suggested_category,
            "unmatched image recorded"
        );
        self.mismatches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry);
    }

    /// Recorded mismatches in the order they were recorded.
    pub fn mismatches(&self) -> Vec<MismatchEntry> {
        self.mismatches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn mismatch_count(&self) -> usize {
        self.mismatches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Consume the session. Returns `None` when nothing was unmatched.
    pub fn into_record(self) -> Option<SessionRecord> {
        let unmatched_images = self.mismatches.into_inner().unwrap_or_else(|e| e.into_inner());
        if unmatched_images.is_empty() {
            return None;
        }

        let resolved_publisher =
            (self.publisher.identity != self.raw_publisher).then(|| self.publisher.identity.clone());
        Some(SessionRecord {
            id: self.id,
            detected_at: self.started_at.to_rfc3339(),
            source_epub: self.source_id,
            publisher_from_opf: self.raw_publisher,
            resolved_publisher,
            unmatched_images,
            status: SessionStatus::Pending,
            reviewed_at: None,
            resolved_at: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::MatchConfidence;
    use pp_config::{PatternDatabase, PublisherProfile, RuleDefinition};

    fn snapshot() -> Arc<CompiledRuleSet> {
        let mut db = PatternDatabase::minimal();
        db.add_publisher(
            PublisherProfile::new("KADOKAWA")
                .with_aliases(["KADOKAWA"])
                .with_rule(
                    Category::Illustration,
                    RuleDefinition::new(r"^i[-_]\d+\.jpe?g$", 1).with_flags("i"),
                ),
        )
        .unwrap();
        Arc::new(CompiledRuleSet::build(&db))
    }

    #[test]
    fn test_session_resolves_publisher() {
        let session = ClassificationSession::new(snapshot(), "book.epub", "株式会社KADOKAWA");
        assert_eq!(session.publisher().identity, "KADOKAWA");
        let result = session.classify("i-003.jpg");
        assert_eq!(result.confidence, MatchConfidence::Confirmed);
        assert_eq!(session.mismatch_count(), 0);
        assert!(session.into_record().is_none());
    }

    #[test]
    fn test_unmatched_recorded_with_suggestion() {
        let session = ClassificationSession::new(snapshot(), "book.epub", "新興出版社");
        let result = session.classify("OEBPS/Images/custom_illust_01.jpg");
        assert!(result.is_unmatched());

        let entries = session.mismatches();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].filename, "custom_illust_01.jpg");
        assert_eq!(entries[0].suggested_category, Some(Category::Illustration));
        assert_eq!(
            entries[0].suggested_pattern.as_deref(),
            Some(r"^custom_illust_\d+\.jpe?g$")
        );
    }

    #[test]
    fn test_classify_as_overrides_identity() {
        let session = ClassificationSession::new(snapshot(), "book.epub", "新興出版社");
        let result = session.classify_as("i-003.jpg", "KADOKAWA");
        assert_eq!(result.confidence, MatchConfidence::Confirmed);
        assert_eq!(session.mismatch_count(), 0);
    }

    #[test]
    fn test_into_record_carries_metadata() {
        let session = ClassificationSession::new(snapshot(), "book.epub", "新興出版社");
        let id = session.id().clone();
        session.classify_all(["a.jpg", "b.jpg", "i-001.jpg"]);

        let record = session.into_record().unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.source_epub, "book.epub");
        assert_eq!(record.publisher_from_opf, "新興出版社");
        assert!(record.resolved_publisher.is_none());
        assert_eq!(record.unmatched_images.len(), 3);
        assert_eq!(record.status, SessionStatus::Pending);
    }
}
