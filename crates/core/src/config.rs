//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. The intent is to avoid reading process-wide environment variables
//! during request handling, which can lead to inconsistent behaviour in multi-threaded runtimes
//! and test harnesses.

use crate::constants::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use crate::{ReportError, ReportResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    database_path: PathBuf,
    default_page_limit: u32,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::InvalidInput` if the database path is empty or the default page
    /// limit is outside `1..=MAX_PAGE_LIMIT`.
    pub fn new(database_path: PathBuf, default_page_limit: u32) -> ReportResult<Self> {
        if database_path.as_os_str().is_empty() {
            return Err(ReportError::InvalidInput(
                "database path cannot be empty".into(),
            ));
        }

        if default_page_limit == 0 || default_page_limit > MAX_PAGE_LIMIT {
            return Err(ReportError::InvalidInput(format!(
                "default page limit must be between 1 and {}",
                MAX_PAGE_LIMIT
            )));
        }

        Ok(Self {
            database_path,
            default_page_limit,
        })
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn default_page_limit(&self) -> u32 {
        self.default_page_limit
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(crate::constants::DEFAULT_DATABASE_PATH),
            default_page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// Parse the default page limit from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_PAGE_LIMIT`].
pub fn page_limit_from_env_value(value: Option<String>) -> ReportResult<u32> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(DEFAULT_PAGE_LIMIT),
        Some(v) => v.parse::<u32>().map_err(|_| {
            ReportError::InvalidInput(format!("page limit must be a positive integer, got '{v}'"))
        }),
    }
}
