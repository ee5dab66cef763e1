//! Core alert types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The subsystem an alert belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    /// Host CPU, memory, disk.
    System,
    /// VPN network and address pool.
    Network,
    /// Firewall and login activity.
    Security,
    /// Client connection volume.
    Connection,
    /// Latency and throughput.
    Performance,
    /// The control plane itself.
    Application,
}

impl AlertType {
    /// Returns the type as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Network => "network",
            Self::Security => "security",
            Self::Connection => "connection",
            Self::Performance => "performance",
            Self::Application => "application",
        }
    }
}

/// How urgent an alert is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// Informational.
    Low,
    /// Worth a look.
    Medium,
    /// Needs attention soon.
    High,
    /// Needs attention now.
    Critical,
}

impl AlertSeverity {
    /// Returns the severity as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Higher numbers are more urgent.
    #[must_use]
    pub const fn priority(&self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Critical => 4,
        }
    }
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    /// The condition currently holds.
    Active,
    /// The condition cleared or an operator resolved it.
    Resolved,
    /// Hidden by an operator for a window.
    Suppressed,
}

/// Metadata key holding the suppression deadline (RFC 3339).
pub const SUPPRESSED_UNTIL_KEY: &str = "suppressed_until";

/// A single deduplicated alert.
///
/// The id is derived from the triggering condition, so at most one
/// alert per condition exists at a time; re-triggers bump `count`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Stable condition-derived id, e.g. `system_cpu_high`.
    pub id: String,
    /// Subsystem.
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    /// Urgency.
    pub severity: AlertSeverity,
    /// Short headline.
    pub title: String,
    /// Longer description with the observed value.
    pub description: String,
    /// First trigger time.
    pub created_at: DateTime<Utc>,
    /// Most recent trigger or transition.
    pub updated_at: DateTime<Utc>,
    /// Set when the alert resolves.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Lifecycle state.
    pub status: AlertStatus,
    /// Free-form context.
    pub metadata: HashMap<String, String>,
    /// Number of times the condition has triggered while active.
    pub count: u32,
}

impl Alert {
    /// Creates a new active alert with `count = 1`.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        alert_type: AlertType,
        severity: AlertSeverity,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            alert_type,
            severity,
            title: title.into(),
            description: description.into(),
            created_at: now,
            updated_at: now,
            resolved_at: None,
            status: AlertStatus::Active,
            metadata: HashMap::new(),
            count: 1,
        }
    }

    /// Records a re-trigger: bumps the count, refreshes the
    /// description/severity, and merges metadata.
    pub fn retrigger(
        &mut self,
        severity: AlertSeverity,
        description: impl Into<String>,
        metadata: HashMap<String, String>,
    ) {
        self.count += 1;
        self.severity = severity;
        self.description = description.into();
        self.metadata.extend(metadata);
        self.updated_at = Utc::now();
    }

    /// Transitions to resolved, stamping `resolved_at`.
    pub fn resolve(&mut self) {
        if self.status != AlertStatus::Resolved {
            self.status = AlertStatus::Resolved;
            let now = Utc::now();
            self.resolved_at = Some(now);
            self.updated_at = now;
        }
    }

    /// Whether the alert counts as active (not resolved, not hidden).
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == AlertStatus::Active
    }

    /// Parses the suppression deadline from metadata, when present.
    #[must_use]
    pub fn suppressed_until(&self) -> Option<DateTime<Utc>> {
        self.metadata
            .get(SUPPRESSED_UNTIL_KEY)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Thresholds for the built-in rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// CPU usage percent above which to alert.
    pub cpu_percent: f64,
    /// Memory usage percent above which to alert.
    pub memory_percent: f64,
    /// Disk usage percent above which to alert.
    pub disk_percent: f64,
    /// Pool utilisation percent for the medium-severity alert.
    pub pool_percent_medium: f64,
    /// Pool utilisation percent at which the alert escalates to high.
    pub pool_percent_high: f64,
    /// Failed logins above which to alert.
    pub failed_logins: u64,
    /// Active clients above which to alert.
    pub max_connections: u64,
    /// Response time in milliseconds above which to alert.
    pub response_time_ms: f64,
    /// Error rate percent above which to alert.
    pub error_rate_percent: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            cpu_percent: 80.0,
            memory_percent: 85.0,
            disk_percent: 90.0,
            pool_percent_medium: 90.0,
            pool_percent_high: 95.0,
            failed_logins: 10,
            max_connections: 1000,
            response_time_ms: 1000.0,
            error_rate_percent: 5.0,
        }
    }
}
