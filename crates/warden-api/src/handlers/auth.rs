//! `/auth` handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde_json::json;
use tracing::info;

use warden_auth::TokenClaims;
use warden_store::User;

use crate::error::{ApiError, ApiResult};
use crate::state::ApiState;
use crate::types::{
    AuthResponse, ChangePasswordRequest, LoginRequest, ProfileUpdateRequest, RefreshRequest,
    RegisterRequest, UserView,
};

/// Minimum accepted password length.
const MIN_PASSWORD_LEN: usize = 8;

fn validate_registration(req: &RegisterRequest) -> ApiResult<()> {
    if req.username.trim().is_empty() {
        return Err(ApiError::Validation("Username is required".to_string()));
    }
    if req.email.trim().is_empty() || !req.email.contains('@') {
        return Err(ApiError::Validation("A valid email is required".to_string()));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn auth_response(state: &ApiState, user: User) -> ApiResult<AuthResponse> {
    let token = state
        .tokens
        .generate(&user.id, &user.username)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let claims = state.tokens.validate(&token)?;
    Ok(AuthResponse {
        token,
        expires_at: claims.expires_at(),
        user: user.into(),
    })
}

/// `POST /auth/register`
pub async fn register(
    State(state): State<ApiState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    validate_registration(&req)?;

    let user =
        state
            .store
            .create_user_with_credentials(req.username.trim(), req.email.trim(), &req.password)?;
    info!(username = %user.username, "user registered");

    Ok((StatusCode::CREATED, Json(auth_response(&state, user)?)))
}

/// `POST /auth/login`
pub async fn login(
    State(state): State<ApiState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let user = state.store.authenticate_user(&req.username, &req.password)?;
    info!(username = %user.username, "user logged in");
    Ok(Json(auth_response(&state, user)?))
}

/// `POST /auth/refresh`
pub async fn refresh(
    State(state): State<ApiState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let token = state.tokens.refresh(&req.token)?;
    let claims = state.tokens.validate(&token)?;
    let user = state.store.get_user(&claims.user_id)?;
    Ok(Json(AuthResponse {
        token,
        expires_at: claims.expires_at(),
        user: user.into(),
    }))
}

/// `GET /auth/profile`
pub async fn get_profile(
    State(state): State<ApiState>,
    Extension(claims): Extension<TokenClaims>,
) -> ApiResult<Json<UserView>> {
    let user = state.store.get_user(&claims.user_id)?;
    Ok(Json(user.into()))
}

/// `PUT /auth/profile`
pub async fn update_profile(
    State(state): State<ApiState>,
    Extension(claims): Extension<TokenClaims>,
    Json(req): Json<ProfileUpdateRequest>,
) -> ApiResult<Json<UserView>> {
    if req.email.trim().is_empty() || !req.email.contains('@') {
        return Err(ApiError::Validation("A valid email is required".to_string()));
    }
    let user = state.store.update_user_email(&claims.user_id, req.email.trim())?;
    Ok(Json(user.into()))
}

/// `POST /auth/change-password`
pub async fn change_password(
    State(state): State<ApiState>,
    Extension(claims): Extension<TokenClaims>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if req.new_password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let user = state.store.get_user(&claims.user_id)?;
    if !warden_auth::verify_password(&req.current_password, &user.password_hash) {
        return Err(ApiError::Unauthorized(
            "Current password is incorrect".to_string(),
        ));
    }

    state
        .store
        .update_user_password(&claims.user_id, &req.new_password)?;
    info!(username = %user.username, "password changed");
    Ok(Json(json!({"message": "Password changed"})))
}

/// `POST /auth/logout`
///
/// Tokens are stateless; invalidation is the client's responsibility.
/// This endpoint exists as an explicit acknowledgement.
pub async fn logout(
    Extension(claims): Extension<TokenClaims>,
) -> Json<serde_json::Value> {
    info!(username = %claims.username, "user logged out");
    Json(json!({"message": "Logged out"}))
}
