//! Boundary validation of report submissions.
//!
//! A [`RawReportInput`] is checked and cleaned exactly once, here. Everything downstream works on
//! a [`ValidatedSubmission`] and may assume:
//! - at least one identifier is present
//! - the patient snapshot carries a non-empty name
//! - optional strings are trimmed, and blank strings have become `None`
//! - every test line has a non-empty name

use crate::model::{PatientSnapshot, RawParameter, RawReportInput, RawTestLine};
use crate::{ReportError, ReportResult};
use lab_types::NonEmptyText;

/// The identifier that makes a submission addressable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionKey {
    Receipt(String),
    Registration(String),
    /// Both lab sequence numbers; one alone is not enough.
    LabSequence { yearly: String, daily: String },
}

/// A submission that passed boundary validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSubmission {
    pub key: SubmissionKey,
    pub patient_name: NonEmptyText,
    pub input: RawReportInput,
}

impl ValidatedSubmission {
    pub fn receipt_no(&self) -> Option<&str> {
        self.input.receipt_no.as_deref()
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn clean_patient(patient: PatientSnapshot) -> PatientSnapshot {
    PatientSnapshot {
        name: patient.name.trim().to_string(),
        age: clean(patient.age),
        gender: clean(patient.gender),
        phone: clean(patient.phone),
        address: clean(patient.address),
    }
}

fn clean_test_line(index: usize, line: RawTestLine) -> ReportResult<RawTestLine> {
    let test_name = line.test_name.trim().to_string();
    if test_name.is_empty() {
        return Err(ReportError::InvalidInput(format!(
            "testResults[{index}].testName cannot be empty"
        )));
    }

    let parameters = line
        .parameters
        .into_iter()
        .filter(|p| !p.name.trim().is_empty())
        .map(|p| RawParameter {
            name: p.name.trim().to_string(),
            value: clean(p.value),
            unit: clean(p.unit),
            normal_range: clean(p.normal_range),
        })
        .collect();

    Ok(RawTestLine {
        test_name,
        category: clean(line.category),
        parameters,
    })
}

/// Validates a create or update body.
///
/// # Arguments
///
/// * `input` - The submission as deserialised from the request.
///
/// # Returns
///
/// The cleaned submission together with its primary identifier. Receipt number wins over
/// registration number, which wins over the lab sequence pair.
///
/// # Errors
///
/// Returns `ReportError::InvalidInput` if:
/// - no receipt number, registration number or complete lab sequence pair is present
/// - the patient snapshot is missing or has a blank name
/// - a test line has a blank name
pub fn validate_submission(input: RawReportInput) -> ReportResult<ValidatedSubmission> {
    let receipt_no = clean(input.receipt_no);
    let registration_no = clean(input.registration_no);
    let lab_yearly_no = clean(input.lab_yearly_no);
    let lab_daily_no = clean(input.lab_daily_no);

    let key = match (&receipt_no, &registration_no, &lab_yearly_no, &lab_daily_no) {
        (Some(receipt), _, _, _) => SubmissionKey::Receipt(receipt.clone()),
        (None, Some(registration), _, _) => SubmissionKey::Registration(registration.clone()),
        (None, None, Some(yearly), Some(daily)) => SubmissionKey::LabSequence {
            yearly: yearly.clone(),
            daily: daily.clone(),
        },
        _ => {
            return Err(ReportError::InvalidInput(
                "a receipt number, registration number or both lab sequence numbers are required"
                    .into(),
            ))
        }
    };

    let patient = input
        .patient
        .map(clean_patient)
        .ok_or_else(|| ReportError::InvalidInput("patient details are required".into()))?;
    let patient_name = NonEmptyText::new(&patient.name)
        .map_err(|_| ReportError::InvalidInput("patient name cannot be empty".into()))?;

    let test_results = input
        .test_results
        .into_iter()
        .enumerate()
        .map(|(index, line)| clean_test_line(index, line))
        .collect::<ReportResult<Vec<_>>>()?;

    Ok(ValidatedSubmission {
        key,
        patient_name,
        input: RawReportInput {
            receipt_no,
            registration_no,
            lab_yearly_no,
            lab_daily_no,
            patient_key: clean(input.patient_key),
            patient: Some(patient),
            department: clean(input.department),
            doctor: clean(input.doctor),
            room: clean(input.room),
            patient_type: clean(input.patient_type),
            report_status: input.report_status,
            test_results,
        },
    })
}
