//! Monitoring engine for the Warden control plane.
//!
//! One background task samples connection, network, system, security,
//! and WireGuard statistics on a fixed tick, derives an overall health
//! state, and feeds the alert manager. Readers get deep copies of the
//! latest snapshot.

pub mod error;
pub mod monitor;
pub mod reconcile;
pub mod types;

pub use error::{MonitorError, Result};
pub use monitor::{Monitor, MonitorConfig};
pub use reconcile::{Reconciler, ReconcilerConfig};
pub use types::{
    ConnectionStats, HealthState, MetricsSnapshot, NetworkStats, SecurityStats, SystemStats,
    WireGuardStats, ACTIVITY_WINDOW,
};
