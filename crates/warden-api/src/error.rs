//! API error type and its mapping onto HTTP responses.
//!
//! Every error leaves the server as `{"error": "<terse message>"}`
//! with the appropriate status code. Internal detail (tool stderr,
//! paths, IO kinds) goes to the log, never to the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Result type alias for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors surfaced by the admin API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request was malformed. 400.
    #[error("{0}")]
    Validation(String),

    /// Missing, malformed, or expired credentials. 401.
    #[error("{0}")]
    Unauthorized(String),

    /// The referenced entity does not exist. 404.
    #[error("{0}")]
    NotFound(String),

    /// A uniqueness constraint was violated. 409.
    #[error("{0}")]
    Conflict(String),

    /// A host tool or privilege is missing. 500; detail logged.
    #[error("{0}")]
    Resource(String),

    /// Everything else. 500 with a generic message; detail logged.
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Unauthorized(msg) => {
                warn!(error = %msg, "request rejected");
                (StatusCode::UNAUTHORIZED, msg.clone())
            }
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::Resource(msg) => {
                error!(error = %msg, "resource failure");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            Self::Internal(detail) => {
                error!(error = %detail, "internal failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<warden_store::StoreError> for ApiError {
    fn from(err: warden_store::StoreError) -> Self {
        use warden_store::StoreError;
        match err {
            StoreError::NotFound { entity } => {
                let mut msg = entity.to_string();
                if let Some(first) = msg.get_mut(..1) {
                    first.make_ascii_uppercase();
                }
                Self::NotFound(format!("{msg} not found"))
            }
            StoreError::DuplicateUsername
            | StoreError::DuplicateEmail
            | StoreError::DuplicatePeerName
            | StoreError::DuplicatePublicKey
            | StoreError::DuplicateAddress => Self::Conflict(err.to_string()),
            StoreError::InvalidCredentials | StoreError::UserInactive => {
                Self::Unauthorized(err.to_string())
            }
            StoreError::Auth(e) => Self::Internal(e.to_string()),
            StoreError::Serialization(e) => Self::Internal(e.to_string()),
            StoreError::Io(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<warden_pool::PoolError> for ApiError {
    fn from(err: warden_pool::PoolError) -> Self {
        use warden_pool::PoolError;
        match err {
            PoolError::AlreadyAllocated { .. } => Self::Conflict(err.to_string()),
            PoolError::Exhausted => Self::Conflict(err.to_string()),
            PoolError::InvalidCidr { .. }
            | PoolError::NotIpv4
            | PoolError::NetworkTooSmall { .. }
            | PoolError::InvalidAddress { .. }
            | PoolError::OutsideNetwork { .. }
            | PoolError::NetworkAddress { .. }
            | PoolError::BroadcastAddress { .. }
            | PoolError::ReservedForServer { .. } => Self::Validation(err.to_string()),
            PoolError::NotAllocated { .. } => Self::Internal(err.to_string()),
        }
    }
}

impl From<warden_wireguard::WireGuardError> for ApiError {
    fn from(err: warden_wireguard::WireGuardError) -> Self {
        use warden_wireguard::WireGuardError;
        match err {
            WireGuardError::ToolMissing { .. } | WireGuardError::CommandFailed { .. } => {
                Self::Resource(err.to_string())
            }
            WireGuardError::ConfigMissing(_) => {
                Self::Resource("WireGuard config file is missing".to_string())
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<warden_firewall::FirewallError> for ApiError {
    fn from(err: warden_firewall::FirewallError) -> Self {
        use warden_firewall::FirewallError;
        match err {
            FirewallError::EmptyInterface
            | FirewallError::InvalidCidr { .. }
            | FirewallError::InvalidPort { .. } => Self::Validation(err.to_string()),
            FirewallError::ToolMissing
            | FirewallError::PermissionDenied { .. }
            | FirewallError::CommandFailed { .. } => Self::Resource(err.to_string()),
            FirewallError::BackupMissing { .. } => Self::NotFound(err.to_string()),
            FirewallError::Io(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<warden_auth::AuthError> for ApiError {
    fn from(err: warden_auth::AuthError) -> Self {
        use warden_auth::AuthError;
        match err {
            AuthError::TokenExpired | AuthError::InvalidToken { .. } => {
                Self::Unauthorized("Invalid or expired token".to_string())
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<warden_alerts::AlertError> for ApiError {
    fn from(err: warden_alerts::AlertError) -> Self {
        use warden_alerts::AlertError;
        match err {
            AlertError::NotFound { .. } => Self::NotFound("Alert not found".to_string()),
            AlertError::AlreadyResolved { .. } | AlertError::NotActive { .. } => {
                Self::Conflict(err.to_string())
            }
        }
    }
}

impl From<warden_qr::QrError> for ApiError {
    fn from(err: warden_qr::QrError) -> Self {
        use warden_qr::QrError;
        match err {
            QrError::EmptyInput | QrError::NotWireGuardConfig => {
                Self::Validation(err.to_string())
            }
            other => Self::Internal(other.to_string()),
        }
    }
}
