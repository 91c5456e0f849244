//! Report data model.
//!
//! Raw types ([`RawReportInput`], [`RawTestLine`]) describe what a client submits; they are
//! transient and only ever read by the assembler. Resolved types ([`ResolvedTestLine`],
//! [`CanonicalReport`]) are what gets persisted and served back.
//!
//! All types serialise with camelCase field names, matching the JSON the lab front-end sends.

use chrono::{DateTime, Utc};
use lab_types::PatientType;
use lab_uuid::RecordId;
use serde::{Deserialize, Serialize};

// ============================================================================
// SUBMISSION (RAW) TYPES
// ============================================================================

/// A submitted parameter result (`Haemoglobin = 13.2 g/dL`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RawParameter {
    pub name: String,
    pub value: Option<String>,
    pub unit: Option<String>,
    pub normal_range: Option<String>,
}

/// A submitted test line with a hand-typed name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RawTestLine {
    pub test_name: String,
    pub category: Option<String>,
    #[serde(default)]
    pub parameters: Vec<RawParameter>,
}

/// Patient details copied into the report at write time.
///
/// The snapshot is denormalised on purpose: later edits to the patient master do not change
/// reports that were already written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PatientSnapshot {
    pub name: String,
    pub age: Option<String>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Lifecycle status of a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum ReportStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Delivered,
}

/// A report submission as received from a client (create or update body).
///
/// Every field is optional at this stage; [`crate::validation::validate_submission`] turns it
/// into a [`crate::validation::ValidatedSubmission`] once, at the boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RawReportInput {
    pub receipt_no: Option<String>,
    pub registration_no: Option<String>,
    pub lab_yearly_no: Option<String>,
    pub lab_daily_no: Option<String>,
    pub patient_key: Option<String>,
    pub patient: Option<PatientSnapshot>,
    pub department: Option<String>,
    pub doctor: Option<String>,
    pub room: Option<String>,
    pub patient_type: Option<String>,
    pub report_status: Option<ReportStatus>,
    pub test_results: Vec<RawTestLine>,
}

// ============================================================================
// RESOLVED TYPES
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ResolvedParameter {
    pub name: String,
    pub value: Option<String>,
    pub unit: Option<String>,
    pub normal_range: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub parameter_ref: Option<RecordId>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub unit_ref: Option<RecordId>,
}

impl ResolvedParameter {
    /// Wraps a submitted parameter without any references.
    pub fn unresolved(raw: &RawParameter) -> Self {
        Self {
            name: raw.name.clone(),
            value: raw.value.clone(),
            unit: raw.unit.clone(),
            normal_range: raw.normal_range.clone(),
            parameter_ref: None,
            unit_ref: None,
        }
    }

    fn to_raw(&self) -> RawParameter {
        RawParameter {
            name: self.name.clone(),
            value: self.value.clone(),
            unit: self.unit.clone(),
            normal_range: self.normal_range.clone(),
        }
    }
}

/// Display names inlined into a test line on request (`populate` / `enrich`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PopulatedRefs {
    pub test_definition_name: Option<String>,
    pub category_name: Option<String>,
    pub service_name: Option<String>,
    pub service_price: Option<f64>,
}

/// A test line after the matcher has run.
///
/// `test_name` is the submitted text, kept verbatim for display. Resolution only ever adds
/// references: an unmatched line still carries its name and submitted category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ResolvedTestLine {
    pub test_name: String,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub test_definition_ref: Option<RecordId>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub category_ref: Option<RecordId>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub service_ref: Option<RecordId>,
    pub category: Option<String>,
    pub parameters: Vec<ResolvedParameter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub populated: Option<PopulatedRefs>,
}

impl ResolvedTestLine {
    /// Rebuilds the submission this line was resolved from.
    ///
    /// Used when a stored report is re-resolved (update, repair): the cascade always starts
    /// again from the submitted text, never from earlier references.
    pub fn to_raw(&self) -> RawTestLine {
        RawTestLine {
            test_name: self.test_name.clone(),
            category: self.category.clone(),
            parameters: self.parameters.iter().map(ResolvedParameter::to_raw).collect(),
        }
    }

    /// True when neither a definition nor a category could be attached.
    pub fn is_unmatched(&self) -> bool {
        self.test_definition_ref.is_none() && self.category_ref.is_none()
    }
}

/// Why a field was left without a reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum UnresolvedReason {
    /// Every strategy ran and none matched.
    NoMatch,
    /// A lookup failed; the field was treated as unmatched.
    LookupFailed { message: String },
}

/// A submitted value the engine could not link to master data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UnresolvedField {
    /// Field path, e.g. `department` or `testResults[2]`.
    pub field: String,
    pub reason: UnresolvedReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FieldChange {
    pub field: String,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// One entry of a report's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EditEntry {
    pub edited_at: DateTime<Utc>,
    pub edited_by: String,
    pub changes: Vec<FieldChange>,
}

/// The fully-resolved, persisted report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CanonicalReport {
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub id: RecordId,
    pub report_id: String,
    pub report_year: i32,
    pub sequence: u32,

    pub receipt_no: Option<String>,
    pub registration_no: Option<String>,
    pub lab_yearly_no: Option<String>,
    pub lab_daily_no: Option<String>,

    pub patient_key: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub patient_ref: Option<RecordId>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub department_ref: Option<RecordId>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub doctor_ref: Option<RecordId>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub room_ref: Option<RecordId>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub invoice_ref: Option<RecordId>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub registration_ref: Option<RecordId>,

    pub department: Option<String>,
    pub doctor: Option<String>,
    pub room: Option<String>,

    pub patient_type: PatientType,
    pub patient: PatientSnapshot,
    pub test_results: Vec<ResolvedTestLine>,
    pub report_status: ReportStatus,

    #[serde(default)]
    pub unresolved: Vec<UnresolvedField>,
    #[serde(default)]
    pub imported: bool,

    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<String>,
    #[serde(default)]
    pub is_edited: bool,
    #[serde(default)]
    pub edit_history: Vec<EditEntry>,
}

impl CanonicalReport {
    /// True when at least one submitted value is still without a reference.
    pub fn needs_repair(&self) -> bool {
        !self.unresolved.is_empty()
    }

    /// Rebuilds a submission from the stored report, for full re-resolution.
    pub fn to_raw(&self) -> RawReportInput {
        RawReportInput {
            receipt_no: self.receipt_no.clone(),
            registration_no: self.registration_no.clone(),
            lab_yearly_no: self.lab_yearly_no.clone(),
            lab_daily_no: self.lab_daily_no.clone(),
            patient_key: self.patient_key.clone(),
            patient: Some(self.patient.clone()),
            department: self.department.clone(),
            doctor: self.doctor.clone(),
            room: self.room.clone(),
            patient_type: Some(self.patient_type.as_str().to_string()),
            report_status: Some(self.report_status),
            test_results: self.test_results.iter().map(ResolvedTestLine::to_raw).collect(),
        }
    }
}
