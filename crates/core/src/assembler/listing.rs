//! Grouped, paginated report listing.
//!
//! Pipeline: store-level filters, grouping by receipt, sort by collection date (newest first),
//! authority resolution, pagination. When a patient type filter is present, authority runs over
//! every group before paginating so the counts match what each row will report; otherwise it
//! runs only over the returned page.

use super::grouping::{group_rows, ReportGroup};
use super::{ReportBackend, ReportEngine};
use crate::authority::AuthoritySource;
use crate::constants::MAX_PAGE_LIMIT;
use crate::model::CanonicalReport;
use crate::store::{ReportFilter, SearchType};
use crate::{ReportError, ReportResult};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use lab_types::PatientType;
use serde::Serialize;

/// Collection date filter. All bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFilter {
    Particular(NaiveDate),
    Range {
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
    Month {
        year: i32,
        month: u32,
    },
}

impl DateFilter {
    /// Parses a `YYYY-MM` month.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::InvalidInput` if `raw` is not a valid year and month.
    pub fn parse_month(raw: &str) -> ReportResult<Self> {
        let invalid = || ReportError::InvalidInput(format!("month must be YYYY-MM, got '{raw}'"));
        let (year, month) = raw.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(invalid());
        }
        Ok(DateFilter::Month { year, month })
    }

    fn bounds(&self) -> (Option<NaiveDate>, Option<NaiveDate>) {
        match *self {
            DateFilter::Particular(date) => (Some(date), Some(date)),
            DateFilter::Range { from, to } => (from, to),
            DateFilter::Month { year, month } => {
                let first = NaiveDate::from_ymd_opt(year, month, 1);
                let last = first.and_then(|first| {
                    let (next_year, next_month) = if first.month() == 12 {
                        (year + 1, 1)
                    } else {
                        (year, month + 1)
                    };
                    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
                });
                (first, last)
            }
        }
    }
}

/// Parameters of a listing request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    /// One-based page number; 0 is treated as 1.
    pub page: u32,
    /// Page size; the configured default when `None`, capped at the maximum.
    pub limit: Option<u32>,
    pub receipt_no: Option<String>,
    pub lab_yearly_no: Option<String>,
    pub q: Option<String>,
    pub search_type: SearchType,
    pub date: Option<DateFilter>,
    pub patient_type: Option<PatientType>,
    /// Inline display names for every test line.
    pub enrich: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_reports: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    fn new(page: u32, limit: u32, total: u64) -> Self {
        let total_pages = total.div_ceil(u64::from(limit)) as u32;
        Self {
            current_page: page,
            total_pages,
            total_reports: total,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

/// One logical report as returned by a listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ListedReport {
    #[serde(flatten)]
    pub report: CanonicalReport,
    pub collected_at: DateTime<Utc>,
    /// Number of physical rows merged into this report.
    pub row_count: usize,
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub patient_type_source: AuthoritySource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ReportPage {
    pub data: Vec<ListedReport>,
    pub pagination: Pagination,
}

fn blank_to_none(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl<S: ReportBackend> ReportEngine<S> {
    /// Lists logical reports matching `query`.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::Store` if the store query fails. Authority lookups never fail the
    /// listing: a group whose lookup fails keeps its stored patient type.
    pub fn list(&self, query: &ListQuery) -> ReportResult<ReportPage> {
        let limit = query
            .limit
            .unwrap_or(self.config.default_page_limit())
            .clamp(1, MAX_PAGE_LIMIT);
        let page = query.page.max(1);

        let (date_from, date_to) = query.date.map(|d| d.bounds()).unwrap_or_default();
        let filter = ReportFilter {
            date_from,
            date_to,
            receipt_no: blank_to_none(&query.receipt_no),
            lab_yearly_prefix: blank_to_none(&query.lab_yearly_no),
            search: blank_to_none(&query.q).map(|q| (query.search_type, q)),
        };

        let mut groups = group_rows(self.store.query_reports(&filter)?);
        groups.sort_by(|a, b| {
            b.collected_at
                .cmp(&a.collected_at)
                .then_with(|| {
                    (b.report.report_year, b.report.sequence)
                        .cmp(&(a.report.report_year, a.report.sequence))
                })
        });

        let offset = ((page - 1) as usize).saturating_mul(limit as usize);
        let (total, mut data) = match query.patient_type {
            Some(wanted) => {
                let matching: Vec<ListedReport> = groups
                    .into_iter()
                    .map(|group| self.listed(group))
                    .filter(|listed| listed.report.patient_type == wanted)
                    .collect();
                let total = matching.len() as u64;
                let page_items = matching.into_iter().skip(offset).take(limit as usize);
                (total, page_items.collect::<Vec<_>>())
            }
            None => {
                let total = groups.len() as u64;
                let page_groups = groups.into_iter().skip(offset).take(limit as usize);
                (total, page_groups.map(|group| self.listed(group)).collect::<Vec<_>>())
            }
        };

        if query.enrich {
            for listed in &mut data {
                self.populate(&mut listed.report);
            }
        }

        Ok(ReportPage {
            data,
            pagination: Pagination::new(page, limit, total),
        })
    }

    fn listed(&self, group: ReportGroup) -> ListedReport {
        let mut report = group.report;
        let decision = self.apply_authority(&mut report);
        ListedReport {
            report,
            collected_at: group.collected_at,
            row_count: group.row_count,
            patient_type_source: decision.source,
        }
    }
}
