//! Mapping of engine errors onto HTTP responses.

use api_shared::ErrorBody;
use axum::{http::StatusCode, Json};
use lab_core::ReportError;

/// Error half of every handler result.
pub type ApiError = (StatusCode, Json<ErrorBody>);

pub(crate) fn bad_request(message: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorBody::new(message)))
}

pub(crate) fn unauthorised(message: impl Into<String>) -> ApiError {
    (StatusCode::UNAUTHORIZED, Json(ErrorBody::new(message)))
}

/// Maps a [`ReportError`] to its status code and body.
///
/// Server-side failures are logged here and answered with a generic message; store details never
/// reach the client.
pub(crate) fn report_error(err: ReportError) -> ApiError {
    match &err {
        ReportError::InvalidInput(message) => bad_request(message.clone()),
        ReportError::NotFound(key) => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody::new(format!("Report not found: {key}"))),
        ),
        ReportError::DuplicateReceipt(_) => (
            StatusCode::CONFLICT,
            Json(ErrorBody::duplicate(err.to_string(), "receiptNo")),
        ),
        ReportError::SequenceExhausted { .. } | ReportError::Store(_) => {
            tracing::error!("Report engine error: {:?}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody::new("Internal error")),
            )
        }
    }
}
