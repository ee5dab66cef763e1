//! Metric snapshot types.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Handshakes older than this no longer count a peer as active.
pub const ACTIVITY_WINDOW: chrono::Duration = chrono::Duration::minutes(5);

/// Peer connection activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStats {
    /// All peers known to the store.
    pub total_peers: usize,
    /// Peers with a handshake inside the activity window.
    pub active_peers: usize,
    /// Connect events in the last hour.
    pub recent_connects: usize,
    /// Disconnect events in the last hour.
    pub recent_disconnects: usize,
}

/// Traffic and address-pool figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkStats {
    /// Bytes received, summed over peers.
    pub bytes_received: u64,
    /// Bytes sent, summed over peers.
    pub bytes_sent: u64,
    /// Allocated / total usable hosts, as a percentage.
    pub pool_utilization: f64,
    /// When the figures were read.
    pub sampled_at: DateTime<Utc>,
}

/// Host-level resource usage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemStats {
    /// CPU usage percent; 0 when unavailable.
    pub cpu_usage: f64,
    /// Memory usage percent; 0 when unavailable.
    pub memory_usage: f64,
    /// Fullest-disk usage percent; 0 when unavailable.
    pub disk_usage: f64,
    /// Live async tasks in the runtime.
    pub task_count: usize,
    /// Seconds since the monitor was created.
    pub uptime_secs: u64,
}

/// Firewall and login posture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityStats {
    /// Whether the packet filter reports enabled.
    pub firewall_enabled: bool,
    /// Rules currently loaded.
    pub active_rule_count: usize,
    /// Placeholder until the filter exports counters.
    pub blocked_connections: u64,
    /// Failed logins since startup.
    pub failed_logins: u64,
}

/// WireGuard interface posture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WireGuardStats {
    /// Whether the interface is up.
    pub interface_up: bool,
    /// Configured UDP listen port, when the server is initialised.
    pub listen_port: Option<u16>,
    /// Server public key, when the server is initialised.
    pub public_key: Option<String>,
    /// All peers.
    pub total_peers: usize,
    /// Peers with a recent handshake.
    pub active_peers: usize,
    /// The most recent handshake across all peers.
    pub last_handshake: Option<DateTime<Utc>>,
}

/// Overall server health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Everything nominal.
    Healthy,
    /// Running, but something needs attention.
    Degraded,
    /// Critical conditions present.
    Unhealthy,
}

impl HealthState {
    /// Returns the state as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }
}

/// One full sampling pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// Connection activity.
    pub connections: ConnectionStats,
    /// Traffic and pool figures.
    pub network: NetworkStats,
    /// Host resources; absent when system stats are disabled.
    pub system: Option<SystemStats>,
    /// Firewall and login posture.
    pub security: SecurityStats,
    /// WireGuard posture.
    pub wireguard: WireGuardStats,
    /// Derived overall health.
    pub health: HealthState,
    /// When the pass ran.
    pub sampled_at: DateTime<Utc>,
}

/// Memory percent above which the server counts as degraded.
const DEGRADED_MEMORY_PERCENT: f64 = 90.0;

/// Task count above which the server counts as degraded.
const DEGRADED_TASK_COUNT: usize = 1000;

/// Derives overall health from a sample.
///
/// Healthy unless the firewall is off, memory is above 90%, or the
/// task count passes 1000 — each of which degrades. Nothing sampled
/// today produces `Unhealthy`.
#[must_use]
pub fn derive_health(security: &SecurityStats, system: Option<&SystemStats>) -> HealthState {
    if !security.firewall_enabled {
        return HealthState::Degraded;
    }
    if let Some(system) = system {
        if system.memory_usage > DEGRADED_MEMORY_PERCENT {
            return HealthState::Degraded;
        }
        if system.task_count > DEGRADED_TASK_COUNT {
            return HealthState::Degraded;
        }
    }
    HealthState::Healthy
}
