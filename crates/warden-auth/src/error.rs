//! Error types for authentication.

use thiserror::Error;

/// Result type alias for auth operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur hashing passwords or handling tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The signing secret is too short for HMAC-SHA256.
    #[error("token secret must be at least 32 bytes")]
    WeakSecret,

    /// Password hashing failed.
    #[error("password hashing failed: {reason}")]
    HashError {
        /// Description of the failure.
        reason: String,
    },

    /// The token has expired.
    #[error("token expired")]
    TokenExpired,

    /// The token is malformed or its signature does not verify.
    #[error("invalid token: {reason}")]
    InvalidToken {
        /// Description of the failure.
        reason: String,
    },

    /// Token encoding failed.
    #[error("token error: {reason}")]
    TokenError {
        /// Description of the failure.
        reason: String,
    },
}
