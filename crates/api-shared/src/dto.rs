//! Response bodies shared by the API surfaces.
//!
//! Report payloads themselves are the core model types; these cover health, errors and the small
//! count and existence responses.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Error code sent with duplicate-key conflicts, kept stable for existing clients.
pub const DUPLICATE_KEY_CODE: u32 = 11000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// JSON body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            field: None,
        }
    }

    /// A duplicate-key conflict on `field`.
    pub fn duplicate(message: impl Into<String>, field: &str) -> Self {
        Self {
            message: message.into(),
            code: Some(DUPLICATE_KEY_CODE),
            field: Some(field.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ExistsBulkRes {
    /// Receipt number to whether a report exists for it.
    pub results: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CountTotalRes {
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DailyCountRes {
    /// Day counted, `YYYY-MM-DD` (UTC).
    pub date: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReportRes {
    pub deleted: bool,
    pub report_id: String,
}
