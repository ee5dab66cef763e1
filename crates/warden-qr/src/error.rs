//! Error types for QR encoding.

use thiserror::Error;

/// Result type alias for QR operations.
pub type Result<T> = std::result::Result<T, QrError>;

/// Errors that can occur during QR encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QrError {
    /// The input was empty.
    #[error("no data to encode")]
    EmptyInput,

    /// The input does not look like a WireGuard client config.
    #[error("input is not a WireGuard config")]
    NotWireGuardConfig,

    /// The QR library refused the input (typically: too long).
    #[error("QR encoding failed: {reason}")]
    Encode {
        /// Description of the failure.
        reason: String,
    },

    /// PNG serialization failed.
    #[error("PNG encoding failed: {reason}")]
    Png {
        /// Description of the failure.
        reason: String,
    },
}
