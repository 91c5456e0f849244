//! Storage seams of the engine.
//!
//! Each component receives the store it needs through one of these traits instead of reaching
//! for a shared handle:
//!
//! - [`CounterStore`] - atomic per-year counters for the sequence generator
//! - [`MasterData`] - read-only reference masters for the reference resolver and test matcher
//! - [`AuthorityStore`] - invoice/registration documents for the authority resolver
//! - [`ReportStore`] - persisted reports for the assembler
//!
//! [`SqliteStore`] implements all four.

mod seed;
mod sqlite;

pub use seed::{
    AuthoritySeed, MasterSeed, NamedSeed, ParameterSeed, RoomDoctorLink, SeedSummary,
    ServiceEntrySeed, TestDefinitionSeed,
};
pub use sqlite::SqliteStore;

use crate::error::StoreResult;
use crate::masters::{
    AuthorityDocument, CategoryHead, NamedMaster, NamedMasterKind, ServiceEntry, TestCategory,
    TestDefinition,
};
use crate::model::CanonicalReport;
use chrono::{DateTime, NaiveDate, Utc};
use lab_uuid::RecordId;
use regex::Regex;

pub trait CounterStore {
    /// Atomically increments the counter, creating it at 1 when absent, and returns the new value.
    fn increment_counter(&self, name: &str) -> StoreResult<u32>;

    /// Atomically sets the counter to `max(value + 1, floor)` and returns the new value.
    fn advance_counter(&self, name: &str, floor: u32) -> StoreResult<u32>;

    /// Decrements the counter only if it currently equals `expected`.
    ///
    /// Returns whether the counter was changed.
    fn decrement_counter_if(&self, name: &str, expected: u32) -> StoreResult<bool>;

    fn counter_value(&self, name: &str) -> StoreResult<Option<u32>>;
}

/// How a named master is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedLookup<'a> {
    Id(RecordId),
    /// Case-insensitive exact match on the canonical name.
    Name(&'a str),
    /// Case-insensitive exact match on the alternate code.
    Code(&'a str),
}

/// Read-only access to reference masters.
///
/// Every "first match" method returns the earliest record in catalog (insertion) order, which
/// keeps the resolvers deterministic.
pub trait MasterData {
    fn find_named(
        &self,
        kind: NamedMasterKind,
        lookup: NamedLookup<'_>,
    ) -> StoreResult<Option<NamedMaster>>;

    fn doctor_for_room(&self, room_id: RecordId) -> StoreResult<Option<NamedMaster>>;

    fn test_definition_by_id(&self, id: RecordId) -> StoreResult<Option<TestDefinition>>;

    /// Case-insensitive exact match on the definition name or short name.
    fn test_definition_by_name(&self, name: &str) -> StoreResult<Option<TestDefinition>>;

    /// First definition whose name or short name matches `pattern`.
    fn test_definition_matching(&self, pattern: &Regex) -> StoreResult<Option<TestDefinition>>;

    /// Up to `limit` definitions whose name starts with `prefix` (case-insensitive).
    fn test_definitions_with_prefix(
        &self,
        prefix: &str,
        limit: u32,
    ) -> StoreResult<Vec<TestDefinition>>;

    fn service_entry_by_id(&self, id: RecordId) -> StoreResult<Option<ServiceEntry>>;

    /// First service entry whose alias name matches `pattern`.
    fn service_entry_matching(&self, pattern: &Regex) -> StoreResult<Option<ServiceEntry>>;

    fn category_head_by_id(&self, id: RecordId) -> StoreResult<Option<CategoryHead>>;

    fn category_by_id(&self, id: RecordId) -> StoreResult<Option<TestCategory>>;

    /// Case-insensitive exact match on the canonical category name.
    fn category_by_name(&self, name: &str) -> StoreResult<Option<TestCategory>>;
}

/// Read-only access to the documents that decide a report's patient type.
pub trait AuthorityStore {
    fn invoice_by_receipt(&self, receipt_no: &str) -> StoreResult<Option<AuthorityDocument>>;

    fn registration_by_receipt(&self, receipt_no: &str)
        -> StoreResult<Option<AuthorityDocument>>;
}

/// Field searched by the free-text `q` filter of a listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchType {
    /// Patient name substring.
    #[default]
    Name,
    /// Patient phone substring.
    Phone,
    /// Receipt number prefix.
    Receipt,
    /// Report id prefix.
    ReportId,
}

impl SearchType {
    /// Parses a `searchType` query value (`name`, `phone`, `receipt`, `reportId`), ignoring case.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "name" => Some(SearchType::Name),
            "phone" => Some(SearchType::Phone),
            "receipt" | "receiptno" => Some(SearchType::Receipt),
            "reportid" => Some(SearchType::ReportId),
            _ => None,
        }
    }
}

/// Row-level filters pushed down to the store.
///
/// Dates apply to the collection date (registration time, falling back to creation time) and are
/// inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFilter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub receipt_no: Option<String>,
    pub lab_yearly_prefix: Option<String>,
    pub search: Option<(SearchType, String)>,
}

/// A physical report row joined with its registration.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub report: CanonicalReport,
    pub registered_at: Option<DateTime<Utc>>,
}

impl ReportRow {
    /// Registration time when known, creation time otherwise.
    pub fn collected_at(&self) -> DateTime<Utc> {
        self.registered_at.unwrap_or(self.report.created_at)
    }
}

pub trait ReportStore {
    /// Inserts a report.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Duplicate` when the `(year, report id)` pair is already taken, or when
    /// a non-imported report names a receipt that any stored row (imported or not) carries.
    fn insert_report(&self, report: &CanonicalReport) -> StoreResult<()>;

    /// Replaces a stored report. Returns `false` when no row has the report's id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Duplicate` when a non-imported report is moved onto a receipt that
    /// another row carries.
    fn update_report(&self, report: &CanonicalReport) -> StoreResult<bool>;

    fn delete_report(&self, id: RecordId) -> StoreResult<bool>;

    fn report_by_id(&self, id: RecordId) -> StoreResult<Option<CanonicalReport>>;

    /// Report carrying `report_id`, from the most recent year when ids repeat across years.
    fn report_by_report_id(&self, report_id: &str) -> StoreResult<Option<CanonicalReport>>;

    /// All physical rows for a receipt, in creation order.
    fn reports_by_receipt(&self, receipt_no: &str) -> StoreResult<Vec<CanonicalReport>>;

    /// Rows matching `filter`, in creation order.
    fn query_reports(&self, filter: &ReportFilter) -> StoreResult<Vec<ReportRow>>;

    fn max_sequence(&self, year: i32) -> StoreResult<Option<u32>>;

    /// Report id of the first report with this receipt, optionally limited to a report year and
    /// a creation date.
    fn find_receipt(
        &self,
        receipt_no: &str,
        year: Option<i32>,
        date: Option<NaiveDate>,
    ) -> StoreResult<Option<String>>;

    fn count_reports(&self) -> StoreResult<u64>;

    fn count_reports_created_on(&self, date: NaiveDate) -> StoreResult<u64>;

    /// Reports that still carry unresolved fields: never-checked ones first (oldest first), then
    /// those checked longest ago.
    fn reports_needing_repair(&self, limit: u32) -> StoreResult<Vec<CanonicalReport>>;

    /// Records that a repair run looked at report `id`, moving it behind unchecked reports.
    fn mark_repair_checked(&self, id: RecordId, at: DateTime<Utc>) -> StoreResult<()>;
}
