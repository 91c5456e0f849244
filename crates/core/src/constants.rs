//! Constants used throughout the lab core crate.

/// Default location of the SQLite database when no explicit path is configured.
pub const DEFAULT_DATABASE_PATH: &str = "lab_data/reports.db";

/// Counter scope used for report identifiers (`report_<year>`).
pub const REPORT_COUNTER_SCOPE: &str = "report";

/// Prefix of human-readable report identifiers (`RPT000123`).
pub const REPORT_ID_PREFIX: &str = "RPT";

/// Number of zero-padded digits in a report identifier.
pub const REPORT_ID_DIGITS: usize = 6;

/// Total number of persist attempts when creating a report.
pub const MAX_CREATE_ATTEMPTS: u32 = 5;

/// Default page size for report listings.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Upper bound on the page size a caller may request.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Size of the candidate set fetched by the prefix fallback of the test matcher.
pub const CANDIDATE_LIMIT: u32 = 10;

/// Default batch size of a repair-links run.
pub const DEFAULT_REPAIR_LIMIT: u32 = 100;

/// Upper bound on the batch size of a repair-links run.
pub const MAX_REPAIR_LIMIT: u32 = 1000;

/// Canonical prefix for room numbers (`RM-12`).
pub const ROOM_NUMBER_PREFIX: &str = "RM-";

/// Field names that may carry the OPD/IPD mode on invoice and registration documents.
///
/// Checked in this order; the first field holding a recognisable value wins.
pub const AUTHORITY_MODE_FIELDS: &[&str] = &[
    "mode",
    "patientType",
    "patient_type",
    "type",
    "visitType",
    "visit_type",
];

/// Display categories that carry no information and may be replaced by the canonical name.
pub const GENERIC_CATEGORY_NAMES: &[&str] = &["general", "others", "other", "misc"];
