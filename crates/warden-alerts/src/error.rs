//! Error types for alerting.

use thiserror::Error;

/// Result type alias for alert operations.
pub type Result<T> = std::result::Result<T, AlertError>;

/// Errors that can occur managing alerts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlertError {
    /// No alert with the given id.
    #[error("alert not found: {id}")]
    NotFound {
        /// The unknown id.
        id: String,
    },

    /// The alert is already resolved.
    #[error("alert already resolved: {id}")]
    AlreadyResolved {
        /// The offending id.
        id: String,
    },

    /// The operation needs an active alert.
    #[error("alert is not active: {id}")]
    NotActive {
        /// The offending id.
        id: String,
    },
}
