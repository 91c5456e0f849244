//! `/reports` handlers.

use crate::auth::ActorHeader;
use crate::error::{bad_request, report_error, ApiError};
use crate::AppState;
use api_shared::{CountTotalRes, DailyCountRes, DeleteReportRes, ErrorBody, ExistsBulkRes};
use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{NaiveDate, Utc};
use lab_core::{
    CanonicalReport, DateFilter, ExistsResult, ListQuery, RawReportInput, RepairSummary,
    ReportPage, SearchType,
};
use lab_types::PatientType;
use serde::Deserialize;
use utoipa::IntoParams;

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| bad_request(format!("{field} must be a date in YYYY-MM-DD format")))
}

fn parse_optional_date(field: &str, raw: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => parse_date(field, raw).map(Some),
        None => Ok(None),
    }
}

/// Query string of `GET /reports`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    /// One-based page number (default 1).
    pub page: Option<u32>,
    /// Page size (default 20, max 100).
    pub limit: Option<u32>,
    /// Exact receipt number.
    pub receipt: Option<String>,
    /// Lab yearly number prefix.
    pub lab_yearly_no: Option<String>,
    /// Free-text search term.
    pub q: Option<String>,
    /// What `q` searches: `name` (default), `phone`, `receipt` or `reportId`.
    pub search_type: Option<String>,
    pub particular_date: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    /// Collection month, `YYYY-MM`.
    pub month: Option<String>,
    /// `OPD` or `IPD`.
    pub patient_type: Option<String>,
    /// Inline display names for every test line.
    pub enrich: Option<bool>,
}

impl ListParams {
    /// Converts the raw query string into a [`ListQuery`].
    ///
    /// A particular date wins over a month, which wins over a from/to range.
    ///
    /// # Errors
    ///
    /// Returns 400 for malformed dates, months, search types or patient types.
    pub fn into_query(self) -> Result<ListQuery, ApiError> {
        let date = if let Some(date) = parse_optional_date("particularDate", self.particular_date.as_deref())? {
            Some(DateFilter::Particular(date))
        } else if let Some(month) = self.month.as_deref().filter(|m| !m.trim().is_empty()) {
            Some(DateFilter::parse_month(month).map_err(report_error)?)
        } else {
            let from = parse_optional_date("dateFrom", self.date_from.as_deref())?;
            let to = parse_optional_date("dateTo", self.date_to.as_deref())?;
            (from.is_some() || to.is_some()).then_some(DateFilter::Range { from, to })
        };

        let search_type = match self.search_type.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(raw) => SearchType::parse(raw)
                .ok_or_else(|| bad_request(format!("unknown searchType '{raw}'")))?,
            None => SearchType::default(),
        };

        let patient_type = match self.patient_type.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(raw) => Some(
                PatientType::normalise(raw)
                    .ok_or_else(|| bad_request(format!("patientType must be OPD or IPD, got '{raw}'")))?,
            ),
            None => None,
        };

        Ok(ListQuery {
            page: self.page.unwrap_or(1),
            limit: self.limit,
            receipt_no: self.receipt,
            lab_yearly_no: self.lab_yearly_no,
            q: self.q,
            search_type,
            date,
            patient_type,
            enrich: self.enrich.unwrap_or(false),
        })
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PopulateParams {
    /// Inline test definition, category and service names.
    pub populate: Option<bool>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExistsParams {
    #[serde(alias = "receiptNo")]
    pub receipt: Option<String>,
    pub year: Option<i32>,
    /// Creation date, `YYYY-MM-DD`.
    pub date: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExistsBulkParams {
    /// Comma-separated receipt numbers.
    pub receipts: Option<String>,
    pub year: Option<i32>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DailyCountParams {
    /// Day to count, `YYYY-MM-DD`; today (UTC) when absent.
    pub date: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RepairParams {
    /// Maximum reports to process (default 100, max 1000).
    pub limit: Option<u32>,
}

#[utoipa::path(
    post,
    path = "/reports",
    request_body = RawReportInput,
    responses(
        (status = 201, description = "Report created", body = CanonicalReport),
        (status = 400, description = "Validation error", body = ErrorBody),
        (status = 401, description = "Missing actor or API key", body = ErrorBody),
        (status = 409, description = "Receipt number already used", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
/// Create a report
///
/// Validates the submission, allocates the next report id for the current year, resolves every
/// reference and test line, and stores the result.
///
/// # Errors
/// Returns `409 Conflict` with `{code: 11000, field: "receiptNo"}` if the receipt number is
/// already used by another report.
#[axum::debug_handler]
pub(crate) async fn create_report(
    State(state): State<AppState>,
    ActorHeader(actor): ActorHeader,
    Json(input): Json<RawReportInput>,
) -> Result<(StatusCode, Json<CanonicalReport>), ApiError> {
    let report = state.engine.create(input, &actor).map_err(report_error)?;
    Ok((StatusCode::CREATED, Json(report)))
}

#[utoipa::path(
    get,
    path = "/reports",
    params(ListParams),
    responses(
        (status = 200, description = "One page of grouped reports", body = ReportPage),
        (status = 400, description = "Malformed filter", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
/// List reports
///
/// Rows sharing a receipt number are returned as one report, newest collection date first.
#[axum::debug_handler]
pub(crate) async fn list_reports(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ReportPage>, ApiError> {
    let query = params.into_query()?;
    let page = state.engine.list(&query).map_err(report_error)?;
    Ok(Json(page))
}

#[utoipa::path(
    get,
    path = "/reports/by-receipt/{receipt_no}",
    params(
        ("receipt_no" = String, Path, description = "Receipt number"),
        PopulateParams
    ),
    responses(
        (status = 200, description = "Merged report for the receipt", body = CanonicalReport),
        (status = 404, description = "No report for this receipt", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub(crate) async fn get_by_receipt(
    State(state): State<AppState>,
    AxumPath(receipt_no): AxumPath<String>,
    Query(params): Query<PopulateParams>,
) -> Result<Json<CanonicalReport>, ApiError> {
    let report = state
        .engine
        .get_by_receipt(&receipt_no, params.populate.unwrap_or(false))
        .map_err(report_error)?;
    Ok(Json(report))
}

#[utoipa::path(
    get,
    path = "/reports/{id}",
    params(
        ("id" = String, Path, description = "Opaque id or report id (RPT000123)"),
        PopulateParams
    ),
    responses(
        (status = 200, description = "Report", body = CanonicalReport),
        (status = 404, description = "Report not found", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub(crate) async fn get_report(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Query(params): Query<PopulateParams>,
) -> Result<Json<CanonicalReport>, ApiError> {
    let report = state
        .engine
        .get(&id, params.populate.unwrap_or(false))
        .map_err(report_error)?;
    Ok(Json(report))
}

#[utoipa::path(
    put,
    path = "/reports/{id}",
    params(("id" = String, Path, description = "Opaque id or report id (RPT000123)")),
    request_body = RawReportInput,
    responses(
        (status = 200, description = "Report updated", body = CanonicalReport),
        (status = 400, description = "Validation error", body = ErrorBody),
        (status = 404, description = "Report not found", body = ErrorBody),
        (status = 409, description = "Receipt number already used", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
/// Update a report
///
/// Fields present in the body replace the stored ones; a non-empty `testResults` replaces every
/// test line. Changes to tracked fields are appended to the edit history.
#[axum::debug_handler]
pub(crate) async fn update_report(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    ActorHeader(actor): ActorHeader,
    Json(input): Json<RawReportInput>,
) -> Result<Json<CanonicalReport>, ApiError> {
    let report = state.engine.update(&id, input, &actor).map_err(report_error)?;
    Ok(Json(report))
}

#[utoipa::path(
    delete,
    path = "/reports/{id}",
    params(("id" = String, Path, description = "Opaque id or report id (RPT000123)")),
    responses(
        (status = 200, description = "Report deleted", body = DeleteReportRes),
        (status = 404, description = "Report not found", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub(crate) async fn delete_report(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    ActorHeader(actor): ActorHeader,
) -> Result<Json<DeleteReportRes>, ApiError> {
    let report = state.engine.delete(&id).map_err(report_error)?;
    tracing::info!(report_id = %report.report_id, actor = %actor.id, "report deleted via REST");
    Ok(Json(DeleteReportRes {
        deleted: true,
        report_id: report.report_id,
    }))
}

#[utoipa::path(
    get,
    path = "/reports/exists",
    params(ExistsParams),
    responses(
        (status = 200, description = "Whether a report exists for the receipt", body = ExistsResult),
        (status = 400, description = "Missing receipt or malformed date", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub(crate) async fn report_exists(
    State(state): State<AppState>,
    Query(params): Query<ExistsParams>,
) -> Result<Json<ExistsResult>, ApiError> {
    let receipt = params
        .receipt
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| bad_request("receipt is required"))?;
    let date = parse_optional_date("date", params.date.as_deref())?;

    let result = state
        .engine
        .exists(receipt, params.year, date)
        .map_err(report_error)?;
    Ok(Json(result))
}

#[utoipa::path(
    get,
    path = "/reports/exists-bulk",
    params(ExistsBulkParams),
    responses(
        (status = 200, description = "Existence per receipt", body = ExistsBulkRes),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub(crate) async fn reports_exist_bulk(
    State(state): State<AppState>,
    Query(params): Query<ExistsBulkParams>,
) -> Result<Json<ExistsBulkRes>, ApiError> {
    let receipts: Vec<String> = params
        .receipts
        .unwrap_or_default()
        .split(',')
        .map(str::to_string)
        .collect();

    let results = state
        .engine
        .exists_bulk(&receipts, params.year)
        .map_err(report_error)?
        .into_iter()
        .map(|(receipt, result)| (receipt, result.exists))
        .collect();
    Ok(Json(ExistsBulkRes { results }))
}

#[utoipa::path(
    get,
    path = "/reports/count-total",
    responses(
        (status = 200, description = "Number of stored report rows", body = CountTotalRes),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub(crate) async fn count_total(
    State(state): State<AppState>,
) -> Result<Json<CountTotalRes>, ApiError> {
    let total = state.engine.count_total().map_err(report_error)?;
    Ok(Json(CountTotalRes { total }))
}

#[utoipa::path(
    get,
    path = "/reports/daily-count",
    params(DailyCountParams),
    responses(
        (status = 200, description = "Reports created on the day", body = DailyCountRes),
        (status = 400, description = "Malformed date", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub(crate) async fn daily_count(
    State(state): State<AppState>,
    Query(params): Query<DailyCountParams>,
) -> Result<Json<DailyCountRes>, ApiError> {
    let date = parse_optional_date("date", params.date.as_deref())?
        .unwrap_or_else(|| Utc::now().date_naive());
    let count = state.engine.daily_count(date).map_err(report_error)?;
    Ok(Json(DailyCountRes {
        date: date.format("%Y-%m-%d").to_string(),
        count,
    }))
}

#[utoipa::path(
    post,
    path = "/reports/admin/repair-links",
    params(RepairParams),
    responses(
        (status = 200, description = "Repair run summary", body = RepairSummary),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
/// Re-run reference resolution over reports with unresolved fields
///
/// Useful after master data has been added. Reports are only written back when resolution
/// changed them.
#[axum::debug_handler]
pub(crate) async fn repair_links(
    State(state): State<AppState>,
    Query(params): Query<RepairParams>,
) -> Result<Json<RepairSummary>, ApiError> {
    let summary = state.engine.repair_links(params.limit).map_err(report_error)?;
    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_params_particular_date_wins() {
        let params = ListParams {
            particular_date: Some("2025-03-11".into()),
            month: Some("2025-02".into()),
            ..Default::default()
        };
        let query = params.into_query().expect("params should convert");
        assert_eq!(
            query.date,
            Some(DateFilter::Particular(
                NaiveDate::from_ymd_opt(2025, 3, 11).expect("valid date")
            ))
        );
        assert_eq!(query.page, 1);
    }

    #[test]
    fn test_list_params_range_and_search_type() {
        let params = ListParams {
            date_from: Some("2025-03-01".into()),
            search_type: Some("reportId".into()),
            patient_type: Some("ipd".into()),
            ..Default::default()
        };
        let query = params.into_query().expect("params should convert");
        assert!(matches!(
            query.date,
            Some(DateFilter::Range { from: Some(_), to: None })
        ));
        assert_eq!(query.search_type, SearchType::ReportId);
        assert_eq!(query.patient_type, Some(PatientType::Ipd));
    }

    #[test]
    fn test_list_params_reject_malformed_values() {
        let bad_date = ListParams {
            date_to: Some("11/03/2025".into()),
            ..Default::default()
        };
        assert_eq!(bad_date.into_query().unwrap_err().0, StatusCode::BAD_REQUEST);

        let bad_month = ListParams {
            month: Some("2025-13".into()),
            ..Default::default()
        };
        assert_eq!(bad_month.into_query().unwrap_err().0, StatusCode::BAD_REQUEST);

        let bad_type = ListParams {
            patient_type: Some("ward".into()),
            ..Default::default()
        };
        assert_eq!(bad_type.into_query().unwrap_err().0, StatusCode::BAD_REQUEST);
    }
}
