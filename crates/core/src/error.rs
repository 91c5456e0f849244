//! Error types for the report engine and its store.

/// Unique constraint that rejected a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateField {
    /// Another accepted report already carries this receipt number.
    ReceiptNo,
    /// Another report of the same year already carries this report id.
    ReportId,
}

impl DuplicateField {
    /// Wire name of the field, as reported to API clients.
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicateField::ReceiptNo => "receiptNo",
            DuplicateField::ReportId => "reportId",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("duplicate value for {}", .0.as_str())]
    Duplicate(DuplicateField),
    #[error("failed to serialise stored document: {0}")]
    Serialisation(#[from] serde_json::Error),
    #[error("failed to read seed file: {0}")]
    SeedParse(#[from] serde_yaml::Error),
    #[error("invalid seed entry: {0}")]
    SeedEntry(String),
    #[error("failed to create database directory: {0}")]
    DirCreation(std::io::Error),
    #[error("store lock poisoned")]
    LockPoisoned,
    #[error("corrupt stored value: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("report not found: {0}")]
    NotFound(String),
    #[error("a report already exists for receipt number {0}")]
    DuplicateReceipt(String),
    #[error("could not allocate a unique report id after {attempts} attempts")]
    SequenceExhausted { attempts: u32 },
    #[error("store unavailable: {0}")]
    Store(#[from] StoreError),
}

pub type ReportResult<T> = std::result::Result<T, ReportError>;
