use super::{ReportBackend, ReportEngine};
use crate::constants::{DEFAULT_REPAIR_LIMIT, MAX_REPAIR_LIMIT};
use crate::ReportResult;
use chrono::Utc;
use serde::Serialize;

/// Outcome of a repair-links run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RepairSummary {
    pub processed: usize,
    pub updated: usize,
    pub errors_count: usize,
}

impl<S: ReportBackend> ReportEngine<S> {
    /// Re-runs the full resolution cascade over reports that still have unresolved fields.
    ///
    /// At most `limit` reports are processed (default 100, capped at 1000): reports never looked
    /// at come first, oldest first, then those checked longest ago. Every processed report is
    /// marked as checked, so reports that stay unresolved cannot hold later ones back.
    ///
    /// A report is written back only when resolution changed it; no edit-history entry is added.
    /// A failure on one report is counted and logged, and the run continues.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::Store` only if the candidate reports cannot be loaded.
    pub fn repair_links(&self, limit: Option<u32>) -> ReportResult<RepairSummary> {
        let limit = limit.unwrap_or(DEFAULT_REPAIR_LIMIT).clamp(1, MAX_REPAIR_LIMIT);
        let candidates = self.store.reports_needing_repair(limit)?;
        let checked_at = Utc::now();
        let mut summary = RepairSummary::default();

        for existing in candidates {
            summary.processed += 1;

            let input = existing.to_raw();
            let assembly = self.assemble(&input);
            let mut repaired = existing.clone();
            Self::apply_assembly(&mut repaired, &input, assembly);

            if repaired != existing {
                match self.store.update_report(&repaired) {
                    Ok(_) => summary.updated += 1,
                    Err(e) => {
                        summary.errors_count += 1;
                        tracing::warn!(report_id = %existing.report_id, error = %e,
                            "failed to write repaired report");
                    }
                }
            }

            if let Err(e) = self.store.mark_repair_checked(existing.id, checked_at) {
                tracing::warn!(report_id = %existing.report_id, error = %e,
                    "failed to mark report as repair-checked");
            }
        }

        tracing::info!(
            processed = summary.processed,
            updated = summary.updated,
            errors = summary.errors_count,
            "repair-links run finished"
        );
        Ok(summary)
    }
}
