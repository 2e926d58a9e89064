//! Publisher pattern classification and learning engine.
//!
//! Given the raw publisher text of a source publication and the filenames of
//! its images, decides for each image whether it is excluded artwork, the
//! cover, a frontispiece plate (kuchie), or an interior illustration.
//!
//! - [`compiler`]: rule definitions → matchers, skipping bad rules
//! - [`ruleset`]: the immutable compiled snapshot shared across sessions
//! - [`identifier`]: raw publisher text → canonical publisher
//! - [`classifier`]: exclusion-first, priority-ordered matching
//! - [`learning`]: suggestions for filenames no rule matched
//! - [`session`]: per-run mismatch accumulation
//! - [`store`]: persisted unconfirmed sessions awaiting curation
//! - [`engine`]: the long-lived facade, including promotion

pub mod classifier;
pub mod compiler;
pub mod engine;
pub mod identifier;
pub mod learning;
pub mod logging;
pub mod ruleset;
pub mod session;
pub mod store;

pub use classifier::{ClassificationResult, MatchConfidence, MatchedRule};
pub use compiler::{compile_pattern, CompileError, CompiledRule, PatternCompileError, RuleFlags};
pub use engine::{Engine, PromotionError, PromotionOutcome};
pub use identifier::{PublisherIdentifier, PublisherTier, ResolvedPublisher};
pub use learning::{Suggestion, SuggestionEngine};
pub use logging::{init_logging, LogFormat, LoggingError};
pub use ruleset::{CompiledCategories, CompiledRuleSet};
pub use session::{ClassificationSession, MismatchEntry};
pub use store::{SessionRecord, SessionStatus, StoreError, UnconfirmedStore};

pub use pp_common::Category;
