//! Error types for the monitor.

use thiserror::Error;

/// Result type alias for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Errors that can occur controlling the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    /// `start` was called while the task is running.
    #[error("monitor is already running")]
    AlreadyRunning,

    /// `stop` was called while no task is running.
    #[error("monitor is not running")]
    NotRunning,
}
