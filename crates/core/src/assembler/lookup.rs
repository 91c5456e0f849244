//! Single-report reads, deletion, existence checks and counts.

use super::grouping::merge_rows;
use super::{ReportBackend, ReportEngine};
use crate::model::CanonicalReport;
use crate::sequence::SequenceGenerator;
use crate::store::ReportRow;
use crate::{ReportError, ReportResult};
use chrono::NaiveDate;
use lab_uuid::RecordId;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ExistsResult {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<String>,
}

impl<S: ReportBackend> ReportEngine<S> {
    /// Finds a stored report by opaque id or by report id (`RPT000123`).
    pub fn find_report(&self, key: &str) -> ReportResult<Option<CanonicalReport>> {
        let key = key.trim();
        if let Ok(id) = RecordId::parse(key) {
            if let Some(report) = self.store.report_by_id(id)? {
                return Ok(Some(report));
            }
        }
        Ok(self.store.report_by_report_id(key)?)
    }

    /// Fetches one report, unified with every other row of its receipt.
    ///
    /// The requested row keeps its own scalar fields; its test lines are replaced by the lines of
    /// all rows of the receipt, in creation order. The patient type is re-resolved.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::NotFound` if no report matches `key`.
    pub fn get(&self, key: &str, populate: bool) -> ReportResult<CanonicalReport> {
        let mut report = self
            .find_report(key)?
            .ok_or_else(|| ReportError::NotFound(key.to_string()))?;

        if let Some(receipt) = report.receipt_no.as_deref() {
            let rows = self.store.reports_by_receipt(receipt)?;
            if rows.len() > 1 {
                report.test_results = rows.into_iter().flat_map(|r| r.test_results).collect();
            }
        }

        self.apply_authority(&mut report);
        if populate {
            self.populate(&mut report);
        }
        Ok(report)
    }

    /// Fetches the merged view of every row carrying `receipt_no`.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::NotFound` if no report has this receipt number.
    pub fn get_by_receipt(&self, receipt_no: &str, populate: bool) -> ReportResult<CanonicalReport> {
        let receipt_no = receipt_no.trim();
        let rows = self
            .store
            .reports_by_receipt(receipt_no)?
            .into_iter()
            .map(|report| ReportRow {
                report,
                registered_at: None,
            })
            .collect();

        let mut report = merge_rows(rows)
            .ok_or_else(|| ReportError::NotFound(receipt_no.to_string()))?
            .report;

        self.apply_authority(&mut report);
        if populate {
            self.populate(&mut report);
        }
        Ok(report)
    }

    /// Deletes a report.
    ///
    /// The year counter steps back once when the deleted report held the highest sequence of
    /// its year and the counter still points at it; it is never compacted.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::NotFound` if no report matches `key`.
    pub fn delete(&self, key: &str) -> ReportResult<CanonicalReport> {
        let report = self
            .find_report(key)?
            .ok_or_else(|| ReportError::NotFound(key.to_string()))?;

        if !self.store.delete_report(report.id)? {
            return Err(ReportError::NotFound(key.to_string()));
        }

        let remaining_max = self.store.max_sequence(report.report_year)?;
        if remaining_max.is_none_or(|max| max < report.sequence) {
            let released = SequenceGenerator::new(self.store.as_ref())
                .release(report.report_year, report.sequence)?;
            tracing::debug!(report_id = %report.report_id, released, "released report sequence");
        }

        tracing::info!(report_id = %report.report_id, "deleted report");
        Ok(report)
    }

    /// Whether a report exists for `receipt_no`, optionally limited to a report year and a
    /// creation date.
    pub fn exists(
        &self,
        receipt_no: &str,
        year: Option<i32>,
        date: Option<NaiveDate>,
    ) -> ReportResult<ExistsResult> {
        let report_id = self.store.find_receipt(receipt_no.trim(), year, date)?;
        Ok(ExistsResult {
            exists: report_id.is_some(),
            report_id,
        })
    }

    /// [`ReportEngine::exists`] for several receipts at once. Blank and repeated receipts are
    /// skipped.
    pub fn exists_bulk(
        &self,
        receipts: &[String],
        year: Option<i32>,
    ) -> ReportResult<BTreeMap<String, ExistsResult>> {
        let mut results = BTreeMap::new();
        for receipt in receipts.iter().map(|r| r.trim()).filter(|r| !r.is_empty()) {
            if !results.contains_key(receipt) {
                results.insert(receipt.to_string(), self.exists(receipt, year, None)?);
            }
        }
        Ok(results)
    }

    /// Number of physical report rows.
    pub fn count_total(&self) -> ReportResult<u64> {
        Ok(self.store.count_reports()?)
    }

    /// Number of reports created on `date` (UTC).
    pub fn daily_count(&self, date: NaiveDate) -> ReportResult<u64> {
        Ok(self.store.count_reports_created_on(date)?)
    }
}
