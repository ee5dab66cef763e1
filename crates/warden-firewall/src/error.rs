//! Error types for the packet filter driver.

use thiserror::Error;

/// Result type alias for firewall operations.
pub type Result<T> = std::result::Result<T, FirewallError>;

/// Errors that can occur driving the host packet filter.
#[derive(Debug, Error)]
pub enum FirewallError {
    /// An interface name was empty.
    #[error("interface name cannot be empty")]
    EmptyInterface,

    /// The VPN network CIDR could not be parsed.
    #[error("invalid CIDR: {message}")]
    InvalidCidr {
        /// Description of the parse failure.
        message: String,
    },

    /// A port was outside 1-65535.
    #[error("invalid port: {port}")]
    InvalidPort {
        /// The offending port.
        port: u32,
    },

    /// The pfctl tool is not installed.
    #[error("pfctl not found on this host")]
    ToolMissing,

    /// The caller lacks the privileges pfctl requires.
    #[error("permission denied: {detail}")]
    PermissionDenied {
        /// Captured tool stderr.
        detail: String,
    },

    /// pfctl exited non-zero.
    #[error("pfctl failed: {stderr}")]
    CommandFailed {
        /// Captured stderr, trimmed.
        stderr: String,
    },

    /// A named backup does not exist.
    #[error("backup not found: {path}")]
    BackupMissing {
        /// The path that was requested.
        path: String,
    },

    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
