//! # API REST
//!
//! REST API implementation for the lab report service.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialisation, CORS, API-key gate, actor headers)
//!
//! Uses `api-shared` for common types and utilities. The server binary lives in the workspace
//! root and only builds an [`AppState`] and calls [`router`].

#![warn(rust_2018_idioms)]

mod auth;
mod error;
mod reports;

pub use auth::{ActorHeader, ACTOR_HEADER, API_KEY_HEADER, TENANT_HEADER};
pub use error::ApiError;

use api_shared::{
    CountTotalRes, DailyCountRes, DeleteReportRes, ErrorBody, ExistsBulkRes, HealthRes,
    HealthService,
};
use axum::{
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use lab_core::{
    model::PopulatedRefs, CanonicalReport, EditEntry, ExistsResult, FieldChange, ListedReport,
    Pagination, PatientSnapshot, RawParameter, RawReportInput, RawTestLine, RepairSummary,
    ReportEngine, ReportPage, ReportStatus, ResolvedParameter, ResolvedTestLine, SqliteStore,
    UnresolvedField, UnresolvedReason,
};
use lab_types::PatientType;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application state for the REST API server
///
/// Holds the report engine (which owns the store handle and core configuration) and the API key
/// resolved at startup.
#[derive(Clone)]
pub struct AppState {
    engine: ReportEngine<SqliteStore>,
    api_key: Option<Arc<str>>,
}

impl AppState {
    /// # Arguments
    /// * `engine` - Engine over the opened store
    /// * `api_key` - Key required in `x-api-key`; `None` or blank leaves the API open
    pub fn new(engine: ReportEngine<SqliteStore>, api_key: Option<String>) -> Self {
        let api_key = api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .map(Arc::from);
        Self { engine, api_key }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        reports::create_report,
        reports::list_reports,
        reports::get_by_receipt,
        reports::get_report,
        reports::update_report,
        reports::delete_report,
        reports::report_exists,
        reports::reports_exist_bulk,
        reports::count_total,
        reports::daily_count,
        reports::repair_links,
    ),
    components(schemas(
        HealthRes,
        ErrorBody,
        ExistsBulkRes,
        CountTotalRes,
        DailyCountRes,
        DeleteReportRes,
        RawReportInput,
        RawTestLine,
        RawParameter,
        PatientSnapshot,
        PatientType,
        ReportStatus,
        CanonicalReport,
        ResolvedTestLine,
        ResolvedParameter,
        PopulatedRefs,
        UnresolvedField,
        UnresolvedReason,
        EditEntry,
        FieldChange,
        ReportPage,
        ListedReport,
        Pagination,
        ExistsResult,
        RepairSummary,
    ))
)]
pub struct ApiDoc;

/// Builds the full application router.
///
/// `/health` and the documentation routes are open; every `/reports` route sits behind the
/// API-key gate.
pub fn router(state: AppState) -> Router {
    let reports = Router::new()
        .route("/reports", post(reports::create_report).get(reports::list_reports))
        .route("/reports/exists", get(reports::report_exists))
        .route("/reports/exists-bulk", get(reports::reports_exist_bulk))
        .route("/reports/count-total", get(reports::count_total))
        .route("/reports/daily-count", get(reports::daily_count))
        .route("/reports/admin/repair-links", post(reports::repair_links))
        .route("/reports/by-receipt/:receipt_no", get(reports::get_by_receipt))
        .route(
            "/reports/:id",
            get(reports::get_report)
                .put(reports::update_report)
                .delete(reports::delete_report),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(reports)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks; never requires an API key.
async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use lab_core::{CoreConfig, MasterSeed};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const SEED: &str = r#"
categories:
  - name: HAEMATOLOGY
testDefinitions:
  - name: CBC
    category: HAEMATOLOGY
    parameters:
      - name: Haemoglobin
invoices:
  - receiptNo: "1024"
    mode: IPD
"#;

    fn state(api_key: Option<&str>) -> AppState {
        let store = SqliteStore::open_in_memory().expect("in-memory store should open");
        store
            .seed(&MasterSeed::from_yaml(SEED).expect("seed should parse"))
            .expect("seed should load");
        let engine = ReportEngine::new(Arc::new(store), Arc::new(CoreConfig::default()));
        AppState::new(engine, api_key.map(str::to_string))
    }

    fn submission(receipt: &str) -> Value {
        json!({
            "receiptNo": receipt,
            "patient": { "name": "Asha Verma", "phone": "98450" },
            "testResults": [
                { "testName": "C.B.C", "parameters": [{ "name": "Haemoglobin", "value": "13.5" }] }
            ]
        })
    }

    fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .header(ACTOR_HEADER, "tech-1")
            .body(Body::from(body.to_string()))
            .expect("request should build")
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request should build")
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should be readable")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("body should be JSON")
        };
        (status, body)
    }

    #[tokio::test]
    async fn test_health_is_open() {
        let app = router(state(Some("s3cret")));
        let (status, body) = send(&app, get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn test_create_then_duplicate_receipt_conflicts() {
        let app = router(state(None));

        let (status, created) = send(&app, json_request("POST", "/reports", &submission("1024"))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["reportId"], "RPT000001");
        assert_eq!(created["patientType"], "IPD");
        assert_eq!(created["testResults"][0]["category"], "HAEMATOLOGY");

        let (status, body) = send(&app, json_request("POST", "/reports", &submission("1024"))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], 11000);
        assert_eq!(body["field"], "receiptNo");

        let (_, count) = send(&app, get_request("/reports/count-total")).await;
        assert_eq!(count["total"], 1);
    }

    #[tokio::test]
    async fn test_create_requires_actor_and_identifier() {
        let app = router(state(None));

        let request = Request::builder()
            .method("POST")
            .uri("/reports")
            .header("content-type", "application/json")
            .body(Body::from(submission("1").to_string()))
            .expect("request should build");
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let no_identifier = json!({ "patient": { "name": "Asha Verma" }, "testResults": [] });
        let (status, body) = send(&app, json_request("POST", "/reports", &no_identifier)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn test_api_key_gate() {
        let app = router(state(Some("s3cret")));

        let (status, _) = send(&app, get_request("/reports")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let request = Request::builder()
            .uri("/reports")
            .header(API_KEY_HEADER, "s3cret")
            .body(Body::empty())
            .expect("request should build");
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pagination"]["totalReports"], 0);
    }

    #[tokio::test]
    async fn test_get_update_delete_round() {
        let app = router(state(None));
        let (_, created) = send(&app, json_request("POST", "/reports", &submission("500"))).await;
        let report_id = created["reportId"].as_str().expect("reportId").to_string();

        let (status, fetched) = send(&app, get_request(&format!("/reports/{report_id}?populate=true"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            fetched["testResults"][0]["populated"]["testDefinitionName"],
            "CBC"
        );

        let (status, by_receipt) = send(&app, get_request("/reports/by-receipt/500")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(by_receipt["reportId"], report_id.as_str());

        let change = json!({ "patient": { "name": "Asha Verma", "phone": "12345" } });
        let (status, updated) = send(
            &app,
            json_request("PUT", &format!("/reports/{report_id}"), &change),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["isEdited"], true);
        assert_eq!(updated["updatedBy"], "tech-1");

        let (status, exists) = send(&app, get_request("/reports/exists?receipt=500")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(exists["exists"], true);

        let (status, bulk) = send(&app, get_request("/reports/exists-bulk?receipts=500,777")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bulk["results"]["500"], true);
        assert_eq!(bulk["results"]["777"], false);

        let (status, deleted) = send(
            &app,
            json_request("DELETE", &format!("/reports/{report_id}"), &Value::Null),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted["deleted"], true);

        let (status, body) = send(&app, get_request(&format!("/reports/{report_id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["message"].as_str().expect("message").contains(&report_id));
    }

    #[tokio::test]
    async fn test_listing_filters_and_counts() {
        let app = router(state(None));
        send(&app, json_request("POST", "/reports", &submission("1024"))).await;
        send(&app, json_request("POST", "/reports", &submission("500"))).await;

        let (status, page) = send(&app, get_request("/reports?patientType=IPD")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["pagination"]["totalReports"], 1);
        assert_eq!(page["data"][0]["receiptNo"], "1024");
        assert_eq!(page["data"][0]["patientTypeSource"], "invoice");

        let (status, _) = send(&app, get_request("/reports?month=2025-13")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, daily) = send(&app, get_request("/reports/daily-count")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(daily["count"], 2);

        let (status, summary) = send(
            &app,
            json_request("POST", "/reports/admin/repair-links?limit=5", &Value::Null),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["errorsCount"], 0);
    }
}
