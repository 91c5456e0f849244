//! Field-level audit diff between a stored report and an update.

use crate::model::{CanonicalReport, FieldChange, RawReportInput};

fn change(field: &str, from: Option<&str>, to: Option<&str>, out: &mut Vec<FieldChange>) {
    if from != to {
        out.push(FieldChange {
            field: field.to_string(),
            from: from.map(str::to_string),
            to: to.map(str::to_string),
        });
    }
}

/// `(field path, value)` for every parameter result, in report order.
///
/// Paths use the submitted names: `testResults.CBC.Haemoglobin`.
fn parameter_values<'a>(
    lines: impl Iterator<Item = (&'a str, Vec<(&'a str, Option<&'a str>)>)>,
) -> Vec<(String, Option<&'a str>)> {
    lines
        .flat_map(|(test, params)| {
            params
                .into_iter()
                .map(move |(param, value)| (format!("testResults.{test}.{param}"), value))
        })
        .collect()
}

/// Lists the tracked fields whose value differs between `existing` and `merged`.
///
/// Tracked fields are the identifiers, the patient demographics and every parameter result
/// value. Reference links and resolved categories are not tracked.
pub fn diff_tracked_fields(existing: &CanonicalReport, merged: &RawReportInput) -> Vec<FieldChange> {
    let mut changes = Vec::new();

    change("receiptNo", existing.receipt_no.as_deref(), merged.receipt_no.as_deref(), &mut changes);
    change(
        "registrationNo",
        existing.registration_no.as_deref(),
        merged.registration_no.as_deref(),
        &mut changes,
    );
    change(
        "labYearlyNo",
        existing.lab_yearly_no.as_deref(),
        merged.lab_yearly_no.as_deref(),
        &mut changes,
    );
    change(
        "labDailyNo",
        existing.lab_daily_no.as_deref(),
        merged.lab_daily_no.as_deref(),
        &mut changes,
    );

    let old = &existing.patient;
    let new = merged.patient.clone().unwrap_or_default();
    change("patient.name", Some(old.name.as_str()), Some(new.name.as_str()), &mut changes);
    change("patient.age", old.age.as_deref(), new.age.as_deref(), &mut changes);
    change("patient.gender", old.gender.as_deref(), new.gender.as_deref(), &mut changes);
    change("patient.phone", old.phone.as_deref(), new.phone.as_deref(), &mut changes);
    change("patient.address", old.address.as_deref(), new.address.as_deref(), &mut changes);

    let before = parameter_values(existing.test_results.iter().map(|line| {
        let params = line
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), p.value.as_deref()))
            .collect();
        (line.test_name.as_str(), params)
    }));
    let after = parameter_values(merged.test_results.iter().map(|line| {
        let params = line
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), p.value.as_deref()))
            .collect();
        (line.test_name.as_str(), params)
    }));

    for (field, from) in &before {
        let to = after.iter().find(|(f, _)| f == field).and_then(|(_, v)| *v);
        change(field, *from, to, &mut changes);
    }
    for (field, to) in &after {
        if !before.iter().any(|(f, _)| f == field) {
            change(field, None, *to, &mut changes);
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RawParameter, RawTestLine};
    use crate::testing::sample_report;

    #[test]
    fn test_diff_is_empty_for_unchanged_report() {
        let report = sample_report("RPT000001", 1, Some("500"));
        assert!(diff_tracked_fields(&report, &report.to_raw()).is_empty());
    }

    #[test]
    fn test_diff_tracks_identifiers_demographics_and_results() {
        let report = sample_report("RPT000001", 1, Some("500"));
        let mut merged = report.to_raw();
        merged.lab_yearly_no = Some("25-009".into());
        if let Some(patient) = merged.patient.as_mut() {
            patient.phone = Some("9999".into());
        }
        merged.test_results = vec![RawTestLine {
            test_name: "CBC".into(),
            category: None,
            parameters: vec![RawParameter {
                name: "Haemoglobin".into(),
                value: Some("11.0".into()),
                ..Default::default()
            }],
        }];

        let changes = diff_tracked_fields(&report, &merged);
        let fields: Vec<_> = changes.iter().map(|c| c.field.as_str()).collect();

        assert!(fields.contains(&"labYearlyNo"));
        assert!(fields.contains(&"patient.phone"));
        let hb = changes
            .iter()
            .find(|c| c.field == "testResults.CBC.Haemoglobin")
            .expect("parameter change should be tracked");
        assert_eq!(hb.from.as_deref(), Some("13.5"));
        assert_eq!(hb.to.as_deref(), Some("11.0"));
    }

    #[test]
    fn test_diff_ignores_reference_only_fields() {
        let report = sample_report("RPT000001", 1, Some("500"));
        let mut merged = report.to_raw();
        merged.department = Some("Cardiology".into());

        assert!(diff_tracked_fields(&report, &merged).is_empty());
    }
}
