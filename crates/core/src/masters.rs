//! Reference master data and authority documents.
//!
//! The engine never writes these records during normal operation: masters are seeded (see
//! [`crate::store::MasterSeed`]) and then only read by the resolvers.

use chrono::{DateTime, Utc};
use lab_uuid::RecordId;
use serde::{Deserialize, Serialize};

/// Masters that are looked up by id, name or code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedMasterKind {
    Patient,
    Department,
    Doctor,
    Room,
}

impl NamedMasterKind {
    pub(crate) fn table(&self) -> &'static str {
        match self {
            NamedMasterKind::Patient => "patients",
            NamedMasterKind::Department => "departments",
            NamedMasterKind::Doctor => "doctors",
            NamedMasterKind::Room => "rooms",
        }
    }
}

/// A patient, department, doctor or room.
///
/// For rooms, `name` holds the canonical room number (`RM-12`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedMaster {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCategory {
    pub id: RecordId,
    pub name: String,
}

/// Legacy grouping label used by billing service entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryHead {
    pub id: RecordId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestParameterDef {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub unit_id: Option<RecordId>,
}

/// Catalog entry for a lab test, with its ordered parameter list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDefinition {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub category_id: Option<RecordId>,
    #[serde(default)]
    pub parameters: Vec<TestParameterDef>,
}

/// Billing catalog entry; may exist without a matching test definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEntry {
    pub id: RecordId,
    pub alias_name: String,
    #[serde(default)]
    pub category_head_id: Option<RecordId>,
    #[serde(default)]
    pub price: Option<f64>,
}

/// Invoice or registration document, looked up by receipt number.
///
/// The body is kept as loose JSON: upstream systems disagree on which field holds the OPD/IPD
/// mode, so the authority resolver probes a fixed list of aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorityDocument {
    pub id: RecordId,
    pub receipt_no: String,
    #[serde(default)]
    pub registration_no: Option<String>,
    #[serde(default)]
    pub registered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub body: serde_json::Map<String, serde_json::Value>,
}

impl AuthorityDocument {
    /// Returns the string values stored under `fields`, in field order, skipping absent or
    /// non-string entries.
    pub fn string_fields(&self, fields: &[&str]) -> Vec<&str> {
        fields
            .iter()
            .filter_map(|f| self.body.get(*f))
            .filter_map(|v| v.as_str())
            .collect()
    }
}
