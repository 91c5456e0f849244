//! Folding physical report rows that share a receipt number into one logical report.

use crate::model::CanonicalReport;
use crate::store::ReportRow;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// One logical report built from one or more physical rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportGroup {
    /// Scalar fields from the most recently registered row, test lines from every row.
    pub report: CanonicalReport,
    /// Registration time of the canonical row, or its creation time when unregistered.
    pub collected_at: DateTime<Utc>,
    pub row_count: usize,
}

/// Groups rows by receipt number.
///
/// Rows without a receipt are groups of their own. `rows` must be in creation order; test lines
/// are concatenated in that order. Groups are returned in order of first appearance.
pub fn group_rows(rows: Vec<ReportRow>) -> Vec<ReportGroup> {
    let mut order: Vec<Vec<ReportRow>> = Vec::new();
    let mut by_receipt: HashMap<String, usize> = HashMap::new();

    for row in rows {
        match row.report.receipt_no.clone() {
            Some(receipt) => match by_receipt.get(&receipt) {
                Some(&index) => order[index].push(row),
                None => {
                    by_receipt.insert(receipt, order.len());
                    order.push(vec![row]);
                }
            },
            None => order.push(vec![row]),
        }
    }

    order.into_iter().filter_map(merge_rows).collect()
}

/// Merges the rows of one receipt. Returns `None` for an empty slice.
pub(crate) fn merge_rows(rows: Vec<ReportRow>) -> Option<ReportGroup> {
    let canonical = rows
        .iter()
        .enumerate()
        .max_by_key(|(index, row)| (row.registered_at, row.report.created_at, *index))
        .map(|(index, _)| index)?;

    let row_count = rows.len();
    let collected_at = rows[canonical].collected_at();
    let test_results = rows
        .iter()
        .flat_map(|row| row.report.test_results.iter().cloned())
        .collect();

    let mut report = rows.into_iter().nth(canonical)?.report;
    report.test_results = test_results;

    Some(ReportGroup {
        report,
        collected_at,
        row_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResolvedTestLine;
    use crate::testing::sample_report;
    use chrono::Duration;

    fn row_with_tests(report_id: &str, seq: u32, receipt: Option<&str>, tests: &[&str]) -> ReportRow {
        let mut report = sample_report(report_id, seq, receipt);
        report.test_results = tests
            .iter()
            .map(|name| ResolvedTestLine {
                test_name: name.to_string(),
                ..Default::default()
            })
            .collect();
        ReportRow {
            report,
            registered_at: None,
        }
    }

    #[test]
    fn test_rows_sharing_receipt_merge_all_test_lines() {
        let first = row_with_tests("RPT000001", 1, Some("500"), &["CBC", "ESR"]);
        let mut second = row_with_tests("RPT000002", 2, Some("500"), &["LFT", "KFT", "TSH"]);
        second.report.created_at = first.report.created_at + Duration::minutes(5);

        let groups = group_rows(vec![first, second]);

        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.row_count, 2);
        assert_eq!(group.report.report_id, "RPT000002");
        let names: Vec<_> = group
            .report
            .test_results
            .iter()
            .map(|t| t.test_name.as_str())
            .collect();
        assert_eq!(names, vec!["CBC", "ESR", "LFT", "KFT", "TSH"]);
    }

    #[test]
    fn test_rows_without_receipt_stay_separate() {
        let a = row_with_tests("RPT000001", 1, None, &["CBC"]);
        let b = row_with_tests("RPT000002", 2, None, &["CBC"]);
        let c = row_with_tests("RPT000003", 3, Some("7"), &["CBC"]);

        let groups = group_rows(vec![a, b, c]);
        let ids: Vec<_> = groups.iter().map(|g| g.report.report_id.as_str()).collect();
        assert_eq!(ids, vec!["RPT000001", "RPT000002", "RPT000003"]);
    }

    #[test]
    fn test_canonical_row_prefers_latest_registration() {
        let mut early = row_with_tests("RPT000001", 1, Some("500"), &["CBC"]);
        let late = row_with_tests("RPT000002", 2, Some("500"), &["ESR"]);
        let registered = late.report.created_at - Duration::hours(1);
        early.registered_at = Some(registered);

        let groups = group_rows(vec![early, late]);
        assert_eq!(groups[0].report.report_id, "RPT000001");
        assert_eq!(groups[0].collected_at, registered);
    }
}
