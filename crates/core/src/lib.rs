//! # Lab Core
//!
//! Identity resolution and assembly of laboratory reports.
//!
//! A loosely structured submission (free-text test names, room numbers, doctor names, receipt
//! numbers) is turned into a canonical report that references master records by id:
//! - Report ids (`RPT000123`) are allocated from a per-year counter that survives concurrent
//!   writers
//! - Patient, department, doctor and room references are resolved by id, name or code
//! - Test lines go through a cascade of exact, loose, service-entry and keyword matching
//! - The patient type (OPD/IPD) is taken from the billing invoice or registration for the receipt
//!
//! Persistence sits behind the traits in [`store`], with [`store::SqliteStore`] as the bundled
//! backend.
//!
//! **No API concerns**: HTTP servers, authentication and request parsing belong in `api-rest`
//! and `api-shared`.

pub mod assembler;
pub mod authority;
pub mod config;
pub mod constants;
pub mod error;
pub mod masters;
pub mod matcher;
pub mod model;
pub mod reference;
pub mod resolution;
pub mod sequence;
pub mod store;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use assembler::{
    Actor, DateFilter, ExistsResult, ImportRecord, ListQuery, ListedReport, Pagination,
    RepairSummary, ReportBackend, ReportEngine, ReportPage,
};
pub use authority::{AuthorityDecision, AuthoritySource};
pub use config::CoreConfig;
pub use error::{DuplicateField, ReportError, ReportResult, StoreError, StoreResult};
pub use model::{
    CanonicalReport, EditEntry, FieldChange, PatientSnapshot, RawParameter, RawReportInput,
    RawTestLine, ReportStatus, ResolvedParameter, ResolvedTestLine, UnresolvedField,
    UnresolvedReason,
};
pub use store::{MasterSeed, SearchType, SeedSummary, SqliteStore};
