use super::retry::{retry_with, RetryDecision, RetryError};
use super::{Actor, Assembly, ReportBackend, ReportEngine};
use crate::constants::MAX_CREATE_ATTEMPTS;
use crate::error::{DuplicateField, StoreError};
use crate::model::{CanonicalReport, RawReportInput};
use crate::sequence::{AllocatedId, SequenceGenerator};
use crate::validation::{validate_submission, ValidatedSubmission};
use crate::{ReportError, ReportResult};
use chrono::{DateTime, Datelike, Utc};
use lab_uuid::RecordId;
use serde::Deserialize;

/// A report carried over from another system.
///
/// Imported reports keep their original creation time and author, and are exempt from the
/// receipt uniqueness rule: legacy data may hold several physical rows per receipt.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRecord {
    #[serde(flatten)]
    pub input: RawReportInput,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: Option<String>,
}

fn classify_insert_error(error: &StoreError) -> RetryDecision {
    match error {
        StoreError::Duplicate(DuplicateField::ReportId) => RetryDecision::Retry,
        _ => RetryDecision::Abort,
    }
}

impl<S: ReportBackend> ReportEngine<S> {
    /// Creates a report from a client submission.
    ///
    /// # Arguments
    ///
    /// * `input` - The raw submission.
    /// * `actor` - The authenticated caller, recorded as the author.
    ///
    /// # Returns
    ///
    /// The persisted report, possibly with unresolved fields.
    ///
    /// # Errors
    ///
    /// - `ReportError::InvalidInput` if the submission has no identifier or no patient.
    /// - `ReportError::DuplicateReceipt` if a report already exists for the receipt number.
    ///   Nothing is written and the call is not retried.
    /// - `ReportError::SequenceExhausted` if no free report id was found in five attempts.
    /// - `ReportError::Store` for any other storage failure.
    pub fn create(&self, input: RawReportInput, actor: &Actor) -> ReportResult<CanonicalReport> {
        let submission = validate_submission(input)?;
        let report = self.insert_new(&submission, Utc::now(), &actor.id, false)?;

        tracing::info!(
            report_id = %report.report_id,
            receipt_no = ?report.receipt_no,
            unresolved = report.unresolved.len(),
            actor = %actor.id,
            "created report"
        );
        Ok(report)
    }

    /// Imports a report from another system, keeping its creation metadata.
    ///
    /// # Errors
    ///
    /// As [`ReportEngine::create`], except that a repeated receipt number is accepted.
    pub fn import(&self, record: ImportRecord, actor: &Actor) -> ReportResult<CanonicalReport> {
        let submission = validate_submission(record.input)?;
        let created_at = record.created_at.unwrap_or_else(Utc::now);
        let created_by = record.created_by.unwrap_or_else(|| actor.id.clone());

        let report = self.insert_new(&submission, created_at, &created_by, true)?;
        tracing::debug!(report_id = %report.report_id, "imported report");
        Ok(report)
    }

    /// Allocates an id and persists, retrying on report id conflicts only.
    fn insert_new(
        &self,
        submission: &ValidatedSubmission,
        created_at: DateTime<Utc>,
        created_by: &str,
        imported: bool,
    ) -> ReportResult<CanonicalReport> {
        let year = created_at.year();
        let store = self.store.as_ref();
        let generator = SequenceGenerator::new(store);
        let assembly = self.assemble(&submission.input);

        let result = retry_with(
            MAX_CREATE_ATTEMPTS,
            |attempt| {
                let allocated = if attempt == 0 {
                    generator.next(year)?
                } else {
                    let floor = store.max_sequence(year)?.map_or(1, |max| max + 1);
                    generator.bump(year, floor)?
                };

                let report = Self::new_report(
                    allocated,
                    &submission.input,
                    assembly.clone(),
                    created_at,
                    created_by,
                    imported,
                );
                store.insert_report(&report)?;
                Ok(report)
            },
            classify_insert_error,
        );

        match result {
            Ok(report) => Ok(report),
            Err(RetryError::Aborted(StoreError::Duplicate(DuplicateField::ReceiptNo))) => {
                let receipt = submission.receipt_no().unwrap_or_default().to_string();
                tracing::warn!(receipt_no = %receipt, "rejected duplicate receipt");
                Err(ReportError::DuplicateReceipt(receipt))
            }
            Err(RetryError::Aborted(e)) => Err(e.into()),
            Err(RetryError::Exhausted { attempts, last }) => {
                tracing::error!(year, attempts, error = %last, "could not allocate a report id");
                Err(ReportError::SequenceExhausted { attempts })
            }
        }
    }

    fn new_report(
        allocated: AllocatedId,
        input: &RawReportInput,
        assembly: Assembly,
        created_at: DateTime<Utc>,
        created_by: &str,
        imported: bool,
    ) -> CanonicalReport {
        let mut report = CanonicalReport {
            id: RecordId::new(),
            report_id: allocated.report_id,
            report_year: allocated.year,
            sequence: allocated.sequence,
            receipt_no: None,
            registration_no: None,
            lab_yearly_no: None,
            lab_daily_no: None,
            patient_key: None,
            patient_ref: None,
            department_ref: None,
            doctor_ref: None,
            room_ref: None,
            invoice_ref: None,
            registration_ref: None,
            department: None,
            doctor: None,
            room: None,
            patient_type: Default::default(),
            patient: Default::default(),
            test_results: Vec::new(),
            report_status: Default::default(),
            unresolved: Vec::new(),
            imported,
            created_at,
            created_by: created_by.to_string(),
            updated_at: created_at,
            updated_by: None,
            is_edited: false,
            edit_history: Vec::new(),
        };
        Self::apply_assembly(&mut report, input, assembly);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CounterStore, ReportStore};
    use crate::testing::{actor, engine, submission};
    use lab_types::PatientType;
    use std::collections::HashSet;

    #[test]
    fn test_create_assigns_sequential_report_ids() {
        let engine = engine();

        let first = engine.create(submission("500"), &actor()).expect("create should succeed");
        let second = engine.create(submission("501"), &actor()).expect("create should succeed");

        assert_eq!(first.report_id, "RPT000001");
        assert_eq!(second.report_id, "RPT000002");
        assert_eq!(first.created_by, "tech-1");
        assert!(!first.is_edited);
    }

    #[test]
    fn test_create_resolves_references_and_tests() {
        let engine = engine();
        let mut input = submission("1024");
        input.department = Some("path".into());
        input.room = Some("room 12".into());

        let report = engine.create(input, &actor()).expect("create should succeed");

        assert!(report.department_ref.is_some());
        assert!(report.room_ref.is_some());
        assert!(report.doctor_ref.is_some(), "doctor should come from the room link");
        assert!(report.invoice_ref.is_some());
        assert_eq!(report.patient_type, PatientType::Ipd);
        assert!(report.test_results[0].test_definition_ref.is_some());
        assert!(report.unresolved.is_empty());
    }

    #[test]
    fn test_create_rejects_duplicate_receipt_without_writing() {
        let engine = engine();
        engine.create(submission("500"), &actor()).expect("first create should succeed");

        let err = engine
            .create(submission("500"), &actor())
            .expect_err("duplicate should be rejected");

        assert!(matches!(err, ReportError::DuplicateReceipt(ref r) if r == "500"));
        assert_eq!(engine.store().count_reports().unwrap(), 1);
    }

    #[test]
    fn test_create_requires_identifier() {
        let engine = engine();
        let mut input = submission("500");
        input.receipt_no = None;

        let err = engine.create(input, &actor()).expect_err("should fail validation");
        assert!(matches!(err, ReportError::InvalidInput(_)));
        assert_eq!(engine.store().count_reports().unwrap(), 0);
    }

    #[test]
    fn test_create_skips_past_report_id_taken_outside_counter() {
        let engine = engine();
        let year = Utc::now().year();
        let mut squatter = crate::testing::sample_report("RPT000001", 1, Some("900"));
        squatter.report_year = year;
        engine.store().insert_report(&squatter).unwrap();

        let report = engine.create(submission("500"), &actor()).expect("create should retry");

        assert_eq!(report.report_id, "RPT000002");
        assert_eq!(
            engine.store().counter_value(&crate::sequence::counter_name(year)).unwrap(),
            Some(2)
        );
    }

    #[test]
    fn test_create_keeps_unresolved_fields() {
        let engine = engine();
        let mut input = submission("500");
        input.department = Some("Cardiology".into());
        input.test_results[0].test_name = "Mystery Assay".into();

        let report = engine.create(input, &actor()).expect("create should succeed");

        assert!(report.needs_repair());
        assert_eq!(report.test_results[0].test_name, "Mystery Assay");
        let fields: Vec<_> = report.unresolved.iter().map(|u| u.field.as_str()).collect();
        assert_eq!(fields, vec!["department", "testResults[0]"]);
    }

    #[test]
    fn test_concurrent_creates_yield_distinct_report_ids() {
        let engine = engine();

        let handles: Vec<_> = (0..10)
            .map(|n| {
                let engine = engine.clone();
                std::thread::spawn(move || {
                    engine
                        .create(submission(&format!("R-{n}")), &actor())
                        .expect("create should succeed")
                        .report_id
                })
            })
            .collect();

        let ids: HashSet<_> = handles
            .into_iter()
            .map(|h| h.join().expect("thread should not panic"))
            .collect();
        assert_eq!(ids.len(), 10);
        assert!(ids.contains("RPT000001"));
        assert!(ids.contains("RPT000010"));
    }

    #[test]
    fn test_import_allows_repeated_receipt_and_keeps_metadata() {
        let engine = engine();
        let created_at = "2024-12-30T08:00:00Z".parse().unwrap();
        let record = ImportRecord {
            input: submission("700"),
            created_at: Some(created_at),
            created_by: Some("legacy".into()),
        };

        let first = engine.import(record.clone(), &actor()).unwrap();
        let second = engine.import(record, &actor()).unwrap();

        assert!(first.imported);
        assert_eq!(first.report_year, 2024);
        assert_eq!(first.created_by, "legacy");
        assert_ne!(first.report_id, second.report_id);
        assert_eq!(engine.store().reports_by_receipt("700").unwrap().len(), 2);
    }

    #[test]
    fn test_create_rejects_receipt_already_carried_by_imported_report() {
        let engine = engine();
        let record = ImportRecord {
            input: submission("700"),
            ..Default::default()
        };
        engine.import(record, &actor()).expect("import should succeed");

        let err = engine
            .create(submission("700"), &actor())
            .expect_err("receipt is already in use");

        assert!(matches!(err, ReportError::DuplicateReceipt(ref r) if r == "700"));
        assert_eq!(engine.store().reports_by_receipt("700").unwrap().len(), 1);
    }
}
