//! Bearer-token request gating.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

use warden_auth::TokenClaims;

use crate::error::{ApiError, ApiResult};
use crate::state::ApiState;

/// Extracts and validates the bearer token, attaching the claims to
/// the request. Each rejection mode gets its own 401 message.
pub async fn require_auth(
    State(state): State<ApiState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let claims = claims_from_request(&state, &request)?;
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Attaches claims when a valid token is present but never rejects.
pub async fn optional_auth(
    State(state): State<ApiState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Ok(claims) = claims_from_request(&state, &request) {
        request.extensions_mut().insert(claims);
    }
    next.run(request).await
}

fn claims_from_request(state: &ApiState, request: &Request) -> ApiResult<TokenClaims> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| ApiError::Unauthorized("Authorization header missing".to_string()))?;

    let header = header
        .to_str()
        .map_err(|_| ApiError::Unauthorized("Authorization header malformed".to_string()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("Authorization scheme must be Bearer".to_string()))?
        .trim();

    if token.is_empty() {
        return Err(ApiError::Unauthorized("Bearer token is empty".to_string()));
    }

    Ok(state.tokens.validate(token)?)
}
