//! Publisher pattern common types, IDs, and errors.
//!
//! This crate provides the vocabulary shared by the config and core crates:
//! - Image categories and their wire names
//! - Session identifiers for mismatch sessions
//! - Schema versioning for the persisted documents
//! - The unified error type with stable codes

pub mod category;
pub mod error;
pub mod id;
pub mod schema;

pub use category::{Category, CategoryParseError};
pub use error::{Error, Result};
pub use id::SessionId;
pub use schema::SCHEMA_VERSION;
