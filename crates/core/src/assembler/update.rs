use super::diff::diff_tracked_fields;
use super::{Actor, ReportBackend, ReportEngine};
use crate::error::{DuplicateField, StoreError};
use crate::model::{CanonicalReport, EditEntry, PatientSnapshot, RawReportInput};
use crate::validation::validate_submission;
use crate::{ReportError, ReportResult};
use chrono::Utc;

fn merge_patient(existing: PatientSnapshot, incoming: Option<PatientSnapshot>) -> PatientSnapshot {
    let Some(incoming) = incoming else {
        return existing;
    };
    PatientSnapshot {
        name: if incoming.name.trim().is_empty() {
            existing.name
        } else {
            incoming.name
        },
        age: incoming.age.or(existing.age),
        gender: incoming.gender.or(existing.gender),
        phone: incoming.phone.or(existing.phone),
        address: incoming.address.or(existing.address),
    }
}

/// Overlays `incoming` on the stored submission.
///
/// Fields present in `incoming` win. A non-empty `testResults` replaces the stored lines as a
/// whole; an empty one keeps them.
pub(crate) fn merge_submission(existing: RawReportInput, incoming: RawReportInput) -> RawReportInput {
    RawReportInput {
        receipt_no: incoming.receipt_no.or(existing.receipt_no),
        registration_no: incoming.registration_no.or(existing.registration_no),
        lab_yearly_no: incoming.lab_yearly_no.or(existing.lab_yearly_no),
        lab_daily_no: incoming.lab_daily_no.or(existing.lab_daily_no),
        patient_key: incoming.patient_key.or(existing.patient_key),
        patient: Some(merge_patient(
            existing.patient.unwrap_or_default(),
            incoming.patient,
        )),
        department: incoming.department.or(existing.department),
        doctor: incoming.doctor.or(existing.doctor),
        room: incoming.room.or(existing.room),
        patient_type: incoming.patient_type.or(existing.patient_type),
        report_status: incoming.report_status.or(existing.report_status),
        test_results: if incoming.test_results.is_empty() {
            existing.test_results
        } else {
            incoming.test_results
        },
    }
}

impl<S: ReportBackend> ReportEngine<S> {
    /// Updates a report and re-runs the full resolution cascade.
    ///
    /// The report id, creation time and author never change. An edit-history entry is appended
    /// only when a tracked field actually changed.
    ///
    /// # Errors
    ///
    /// - `ReportError::NotFound` if no report matches `key` (opaque id or report id).
    /// - `ReportError::InvalidInput` if the merged report no longer validates.
    /// - `ReportError::DuplicateReceipt` if the new receipt number belongs to another report.
    pub fn update(
        &self,
        key: &str,
        incoming: RawReportInput,
        actor: &Actor,
    ) -> ReportResult<CanonicalReport> {
        let existing = self
            .find_report(key)?
            .ok_or_else(|| ReportError::NotFound(key.to_string()))?;

        let submission = validate_submission(merge_submission(existing.to_raw(), incoming))?;
        let changes = diff_tracked_fields(&existing, &submission.input);
        let assembly = self.assemble(&submission.input);

        let now = Utc::now();
        let mut report = existing;
        Self::apply_assembly(&mut report, &submission.input, assembly);
        report.updated_at = now;
        report.updated_by = Some(actor.id.clone());

        if !changes.is_empty() {
            report.is_edited = true;
            report.edit_history.push(EditEntry {
                edited_at: now,
                edited_by: actor.id.clone(),
                changes,
            });
        }

        match self.store.update_report(&report) {
            Ok(true) => {}
            Ok(false) => return Err(ReportError::NotFound(key.to_string())),
            Err(StoreError::Duplicate(DuplicateField::ReceiptNo)) => {
                return Err(ReportError::DuplicateReceipt(
                    submission.receipt_no().unwrap_or_default().to_string(),
                ))
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            report_id = %report.report_id,
            edits = report.edit_history.len(),
            actor = %actor.id,
            "updated report"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RawParameter, RawTestLine};
    use crate::testing::{actor, engine, submission};

    #[test]
    fn test_update_records_history_only_for_tracked_changes() {
        let engine = engine();
        let created = engine.create(submission("500"), &actor()).unwrap();

        let untouched = engine
            .update(&created.id.to_string(), RawReportInput::default(), &actor())
            .expect("update should succeed");
        assert!(!untouched.is_edited);
        assert!(untouched.edit_history.is_empty());

        let incoming = RawReportInput {
            patient: Some(PatientSnapshot {
                phone: Some("12345".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let edited = engine
            .update(&created.report_id, incoming, &actor())
            .expect("update should succeed");

        assert!(edited.is_edited);
        assert_eq!(edited.edit_history.len(), 1);
        assert_eq!(edited.edit_history[0].changes[0].field, "patient.phone");
        assert_eq!(edited.patient.name, created.patient.name);
        assert_eq!(edited.report_id, created.report_id);
        assert_eq!(edited.created_at, created.created_at);
        assert_eq!(edited.updated_by.as_deref(), Some("tech-1"));
    }

    #[test]
    fn test_update_re_resolves_replaced_test_lines() {
        let engine = engine();
        let created = engine.create(submission("500"), &actor()).unwrap();

        let incoming = RawReportInput {
            test_results: vec![RawTestLine {
                test_name: "l.f.t".into(),
                category: None,
                parameters: vec![RawParameter {
                    name: "SGPT".into(),
                    value: Some("40".into()),
                    ..Default::default()
                }],
            }],
            ..Default::default()
        };
        let updated = engine
            .update(&created.report_id, incoming, &actor())
            .expect("update should succeed");

        assert_eq!(updated.test_results.len(), 1);
        assert!(updated.test_results[0].test_definition_ref.is_some());
        assert_eq!(updated.test_results[0].category.as_deref(), Some("BIOCHEMISTRY"));
        assert!(updated.is_edited, "parameter values are tracked");
    }

    #[test]
    fn test_update_rejects_receipt_taken_by_another_report() {
        let engine = engine();
        engine.create(submission("500"), &actor()).unwrap();
        let other = engine.create(submission("501"), &actor()).unwrap();

        let incoming = RawReportInput {
            receipt_no: Some("500".into()),
            ..Default::default()
        };
        let err = engine
            .update(&other.report_id, incoming, &actor())
            .expect_err("update should fail");
        assert!(matches!(err, ReportError::DuplicateReceipt(_)));
    }

    #[test]
    fn test_update_unknown_report_is_not_found() {
        let engine = engine();
        let err = engine
            .update("RPT999999", RawReportInput::default(), &actor())
            .expect_err("update should fail");
        assert!(matches!(err, ReportError::NotFound(_)));
    }

    #[test]
    fn test_merge_submission_keeps_existing_fields() {
        let existing = submission("500");
        let merged = merge_submission(
            existing.clone(),
            RawReportInput {
                room: Some("12".into()),
                ..Default::default()
            },
        );
        assert_eq!(merged.receipt_no.as_deref(), Some("500"));
        assert_eq!(merged.room.as_deref(), Some("12"));
        assert_eq!(merged.test_results, existing.test_results);
    }
}
