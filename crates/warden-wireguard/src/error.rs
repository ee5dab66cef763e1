//! Error types for the WireGuard control layer.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for WireGuard operations.
pub type Result<T> = std::result::Result<T, WireGuardError>;

/// Errors that can occur in the WireGuard control layer.
#[derive(Debug, Error)]
pub enum WireGuardError {
    /// A key was not exactly 32 bytes.
    #[error("invalid key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    /// A key was not valid base64.
    #[error("invalid base64 key: {0}")]
    InvalidBase64(String),

    /// A configuration file failed to parse.
    #[error("config parse error at line {line}: {message}")]
    ParseError {
        /// 1-indexed line number.
        line: usize,
        /// Description of the failure.
        message: String,
    },

    /// A configuration value was rejected.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The interface config file does not exist yet.
    #[error("config file not found: {0}")]
    ConfigMissing(PathBuf),

    /// A required tool is not installed on the host.
    #[error("{tool} not found; is wireguard-tools installed?")]
    ToolMissing {
        /// The missing binary.
        tool: String,
    },

    /// A tool invocation exited non-zero.
    #[error("{tool} failed: {stderr}")]
    CommandFailed {
        /// The binary that failed.
        tool: String,
        /// Captured stderr, trimmed.
        stderr: String,
    },

    /// Filesystem failure reading or writing the config.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
