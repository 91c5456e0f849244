//! API-key gate and caller identity.

use crate::error::{unauthorised, ApiError};
use crate::AppState;
use api_shared::validate_api_key;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use lab_core::Actor;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const ACTOR_HEADER: &str = "x-actor-id";
pub const TENANT_HEADER: &str = "x-tenant-id";

fn header_text<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Rejects requests whose `x-api-key` does not match the configured key.
///
/// A server started without `API_KEY` lets every request through.
pub(crate) async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    validate_api_key(
        header_text(request.headers(), API_KEY_HEADER),
        state.api_key.as_deref(),
    )
    .map_err(|e| unauthorised(e.to_string()))?;

    Ok(next.run(request).await)
}

/// The caller of a write, taken from `x-actor-id` and `x-tenant-id`.
///
/// Requests without an actor id are rejected with 401.
#[derive(Debug, Clone)]
pub struct ActorHeader(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for ActorHeader
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header_text(&parts.headers, ACTOR_HEADER)
            .ok_or_else(|| unauthorised(format!("missing {ACTOR_HEADER} header")))?;

        let mut actor = Actor::new(id);
        actor.tenant_id = header_text(&parts.headers, TENANT_HEADER).map(str::to_string);
        Ok(ActorHeader(actor))
    }
}
