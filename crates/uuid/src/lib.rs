//! Opaque record identifiers.
//!
//! Every physical report row and every master record is keyed by an opaque identifier in a
//! *canonical* form: **32 lowercase hexadecimal characters** (no hyphens), i.e. the value of
//! `Uuid::new_v4().simple().to_string()`.
//!
//! The canonical form matters beyond storage. Lookups that accept "either an id or a
//! human-typed value" (a report fetched by id *or* by `RPT000123`, a department given by id
//! *or* by name) use [`RecordId::is_canonical`] to decide whether the input already looks like a
//! key before falling back to name matching.
//!
//! Non-canonical values (uppercase, hyphenated, wrong length, non-hex) are rejected by
//! [`RecordId::parse`].

mod id;

pub use id::{RecordId, Uuid};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type IdResult<T> = Result<T, IdError>;
