//! The alert manager: rule evaluation, deduplication, suppression.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::{AlertError, Result};
use crate::types::{
    Alert, AlertSeverity, AlertStatus, AlertThresholds, AlertType, SUPPRESSED_UNTIL_KEY,
};

/// Resolved alerts older than this are deleted during evaluation.
const RESOLVED_RETENTION: Duration = Duration::hours(24);

/// A metrics sample for rule evaluation.
///
/// The monitor assembles this from its per-tick stats; defaults are
/// chosen so an all-default sample fires nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSample {
    /// CPU usage percent.
    pub cpu_usage: f64,
    /// Memory usage percent.
    pub memory_usage: f64,
    /// Disk usage percent.
    pub disk_usage: f64,
    /// IP-pool utilisation percent.
    pub pool_utilization: f64,
    /// Whether the host firewall is enabled.
    pub firewall_enabled: bool,
    /// Failed logins since startup.
    pub failed_logins: u64,
    /// Currently active clients.
    pub active_clients: u64,
    /// API response time in milliseconds.
    pub response_time_ms: f64,
    /// API error rate percent.
    pub error_rate: f64,
}

impl Default for MetricsSample {
    fn default() -> Self {
        Self {
            cpu_usage: 0.0,
            memory_usage: 0.0,
            disk_usage: 0.0,
            pool_utilization: 0.0,
            firewall_enabled: true,
            failed_logins: 0,
            active_clients: 0,
            response_time_ms: 0.0,
            error_rate: 0.0,
        }
    }
}

/// What one evaluation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationSummary {
    /// Ids that triggered (new or re-triggered).
    pub triggered: Vec<String>,
    /// Ids that transitioned to resolved.
    pub resolved: Vec<String>,
}

/// One rule's verdict for a sample.
struct RuleOutcome {
    id: &'static str,
    alert_type: AlertType,
    severity: AlertSeverity,
    title: &'static str,
    condition: bool,
    description: String,
    value: String,
}

/// Evaluates thresholds and owns the alert map.
#[derive(Debug)]
pub struct AlertManager {
    alerts: Mutex<HashMap<String, Alert>>,
    thresholds: AlertThresholds,
}

impl Default for AlertManager {
    fn default() -> Self {
        Self::new(AlertThresholds::default())
    }
}

impl AlertManager {
    /// Creates a manager with the given thresholds.
    #[must_use]
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self {
            alerts: Mutex::new(HashMap::new()),
            thresholds,
        }
    }

    /// Returns the configured thresholds.
    #[must_use]
    pub const fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    /// Evaluates every built-in rule against a sample.
    ///
    /// Holding conditions insert or re-trigger their alert; cleared
    /// conditions resolve it. Expired suppressions lift first, and
    /// stale resolved alerts are swept at the end.
    pub fn evaluate(&self, sample: &MetricsSample) -> EvaluationSummary {
        let mut alerts = self.alerts.lock();
        let mut summary = EvaluationSummary::default();
        let now = Utc::now();

        // Lift expired suppressions before rules run.
        for alert in alerts.values_mut() {
            if alert.status == AlertStatus::Suppressed {
                if let Some(until) = alert.suppressed_until() {
                    if until <= now {
                        alert.status = AlertStatus::Active;
                        alert.metadata.remove(SUPPRESSED_UNTIL_KEY);
                        alert.updated_at = now;
                        debug!(id = %alert.id, "suppression expired");
                    }
                }
            }
        }

        for outcome in self.rule_outcomes(sample) {
            if outcome.condition {
                let mut metadata = HashMap::new();
                metadata.insert("value".to_string(), outcome.value.clone());

                let retriggered = match alerts.get_mut(outcome.id) {
                    Some(alert) if alert.status != AlertStatus::Resolved => {
                        alert.retrigger(
                            outcome.severity,
                            outcome.description.clone(),
                            metadata.clone(),
                        );
                        true
                    }
                    _ => false,
                };

                if retriggered {
                    summary.triggered.push(outcome.id.to_string());
                } else {
                    // Unknown, or its previous incarnation resolved:
                    // start a fresh alert under this id.
                    let mut alert = Alert::new(
                        outcome.id,
                        outcome.alert_type,
                        outcome.severity,
                        outcome.title,
                        outcome.description,
                    );
                    alert.metadata = metadata;
                    info!(id = %alert.id, severity = %alert.severity, "alert triggered");
                    summary.triggered.push(alert.id.clone());
                    alerts.insert(alert.id.clone(), alert);
                }
            } else if let Some(alert) = alerts.get_mut(outcome.id) {
                if alert.is_active() {
                    alert.resolve();
                    info!(id = %alert.id, "alert resolved");
                    summary.resolved.push(alert.id.clone());
                }
            }
        }

        Self::cleanup(&mut alerts, now);
        summary
    }

    /// Manually resolves an alert.
    ///
    /// # Errors
    ///
    /// Fails on unknown ids and already-resolved alerts.
    pub fn resolve(&self, id: &str) -> Result<Alert> {
        let mut alerts = self.alerts.lock();
        let alert = alerts.get_mut(id).ok_or_else(|| AlertError::NotFound {
            id: id.to_string(),
        })?;
        if alert.status == AlertStatus::Resolved {
            return Err(AlertError::AlreadyResolved { id: id.to_string() });
        }
        alert.resolve();
        info!(id = %id, "alert manually resolved");
        Ok(alert.clone())
    }

    /// Suppresses an active alert for a window.
    ///
    /// Suppressed alerts disappear from [`AlertManager::active_alerts`]
    /// but stay queryable; the window's expiry restores them on the
    /// next evaluation.
    ///
    /// # Errors
    ///
    /// Fails on unknown ids and non-active alerts.
    pub fn suppress(&self, id: &str, window: Duration) -> Result<Alert> {
        let mut alerts = self.alerts.lock();
        let alert = alerts.get_mut(id).ok_or_else(|| AlertError::NotFound {
            id: id.to_string(),
        })?;
        if alert.status != AlertStatus::Active {
            return Err(AlertError::NotActive { id: id.to_string() });
        }

        let until = Utc::now() + window;
        alert.status = AlertStatus::Suppressed;
        alert
            .metadata
            .insert(SUPPRESSED_UNTIL_KEY.to_string(), until.to_rfc3339());
        alert.updated_at = Utc::now();
        info!(id = %id, until = %until, "alert suppressed");
        Ok(alert.clone())
    }

    /// Returns active alerts, most urgent first.
    #[must_use]
    pub fn active_alerts(&self) -> Vec<Alert> {
        let alerts = self.alerts.lock();
        let mut active: Vec<Alert> = alerts.values().filter(|a| a.is_active()).cloned().collect();
        active.sort_by(|a, b| b.severity.priority().cmp(&a.severity.priority()));
        active
    }

    /// Returns every alert touched since `since`, regardless of state.
    #[must_use]
    pub fn all_alerts(&self, since: DateTime<Utc>) -> Vec<Alert> {
        let alerts = self.alerts.lock();
        let mut all: Vec<Alert> = alerts
            .values()
            .filter(|a| a.updated_at >= since)
            .cloned()
            .collect();
        all.sort_by_key(|a| a.created_at);
        all
    }

    /// Fetches one alert by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Alert> {
        self.alerts.lock().get(id).cloned()
    }

    /// Number of alerts currently held, in any state.
    #[must_use]
    pub fn len(&self) -> usize {
        self.alerts.lock().len()
    }

    /// Whether the manager holds no alerts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alerts.lock().is_empty()
    }

    fn cleanup(alerts: &mut HashMap<String, Alert>, now: DateTime<Utc>) {
        alerts.retain(|_, alert| match alert.resolved_at {
            Some(resolved_at) if alert.status == AlertStatus::Resolved => {
                now - resolved_at <= RESOLVED_RETENTION
            }
            _ => true,
        });
    }

    fn rule_outcomes(&self, sample: &MetricsSample) -> Vec<RuleOutcome> {
        let t = &self.thresholds;

        let pool_severity = if sample.pool_utilization > t.pool_percent_high {
            AlertSeverity::High
        } else {
            AlertSeverity::Medium
        };

        vec![
            RuleOutcome {
                id: "system_cpu_high",
                alert_type: AlertType::System,
                severity: AlertSeverity::High,
                title: "High CPU usage",
                condition: sample.cpu_usage > t.cpu_percent,
                description: format!("CPU usage at {:.1}%", sample.cpu_usage),
                value: format!("{:.1}", sample.cpu_usage),
            },
            RuleOutcome {
                id: "system_memory_high",
                alert_type: AlertType::System,
                severity: AlertSeverity::High,
                title: "High memory usage",
                condition: sample.memory_usage > t.memory_percent,
                description: format!("Memory usage at {:.1}%", sample.memory_usage),
                value: format!("{:.1}", sample.memory_usage),
            },
            RuleOutcome {
                id: "system_disk_high",
                alert_type: AlertType::System,
                severity: AlertSeverity::Critical,
                title: "High disk usage",
                condition: sample.disk_usage > t.disk_percent,
                description: format!("Disk usage at {:.1}%", sample.disk_usage),
                value: format!("{:.1}", sample.disk_usage),
            },
            RuleOutcome {
                id: "network_pool_utilization_high",
                alert_type: AlertType::Network,
                severity: pool_severity,
                title: "IP pool nearly exhausted",
                condition: sample.pool_utilization > t.pool_percent_medium,
                description: format!("Pool utilisation at {:.1}%", sample.pool_utilization),
                value: format!("{:.1}", sample.pool_utilization),
            },
            RuleOutcome {
                id: "security_firewall_disabled",
                alert_type: AlertType::Security,
                severity: AlertSeverity::Critical,
                title: "Firewall disabled",
                condition: !sample.firewall_enabled,
                description: "Host packet filter is not enabled".to_string(),
                value: "disabled".to_string(),
            },
            RuleOutcome {
                id: "security_failed_logins",
                alert_type: AlertType::Security,
                severity: AlertSeverity::Medium,
                title: "Repeated failed logins",
                condition: sample.failed_logins > t.failed_logins,
                description: format!("{} failed logins", sample.failed_logins),
                value: sample.failed_logins.to_string(),
            },
            RuleOutcome {
                id: "connection_count_high",
                alert_type: AlertType::Connection,
                severity: AlertSeverity::Medium,
                title: "High client connection count",
                condition: sample.active_clients > t.max_connections,
                description: format!("{} active clients", sample.active_clients),
                value: sample.active_clients.to_string(),
            },
            RuleOutcome {
                id: "performance_response_time_high",
                alert_type: AlertType::Performance,
                severity: AlertSeverity::Medium,
                title: "Slow API responses",
                condition: sample.response_time_ms > t.response_time_ms,
                description: format!("Response time at {:.0} ms", sample.response_time_ms),
                value: format!("{:.0}", sample.response_time_ms),
            },
            RuleOutcome {
                id: "application_error_rate_high",
                alert_type: AlertType::Application,
                severity: AlertSeverity::High,
                title: "Elevated API error rate",
                condition: sample.error_rate > t.error_rate_percent,
                description: format!("Error rate at {:.1}%", sample.error_rate),
                value: format!("{:.1}", sample.error_rate),
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu_sample(cpu: f64) -> MetricsSample {
        MetricsSample {
            cpu_usage: cpu,
            ..Default::default()
        }
    }

    mod evaluation_tests {
        use super::*;

        #[test]
        fn quiet_sample_fires_nothing() {
            let manager = AlertManager::default();
            let summary = manager.evaluate(&MetricsSample::default());
            assert!(summary.triggered.is_empty());
            assert!(manager.active_alerts().is_empty());
        }

        #[test]
        fn cpu_over_threshold_triggers_high() {
            let manager = AlertManager::default();
            manager.evaluate(&cpu_sample(90.0));

            let active = manager.active_alerts();
            assert_eq!(active.len(), 1);
            assert_eq!(active[0].id, "system_cpu_high");
            assert_eq!(active[0].severity, AlertSeverity::High);
            assert_eq!(active[0].count, 1);
        }

        #[test]
        fn retrigger_increments_count_not_alerts() {
            let manager = AlertManager::default();
            manager.evaluate(&cpu_sample(90.0));
            manager.evaluate(&cpu_sample(92.0));

            let active = manager.active_alerts();
            assert_eq!(active.len(), 1);
            assert_eq!(active[0].count, 2);
            assert!(active[0].description.contains("92.0"));
        }

        #[test]
        fn clearing_condition_resolves() {
            let manager = AlertManager::default();
            manager.evaluate(&cpu_sample(90.0));

            let summary = manager.evaluate(&cpu_sample(50.0));
            assert_eq!(summary.resolved, vec!["system_cpu_high".to_string()]);
            assert!(manager.active_alerts().is_empty());

            let all = manager.all_alerts(DateTime::<Utc>::MIN_UTC);
            assert_eq!(all.len(), 1);
            assert_eq!(all[0].status, AlertStatus::Resolved);
            assert!(all[0].resolved_at.is_some());
        }

        #[test]
        fn retrigger_after_resolution_starts_fresh() {
            let manager = AlertManager::default();
            manager.evaluate(&cpu_sample(90.0));
            manager.evaluate(&cpu_sample(50.0));
            manager.evaluate(&cpu_sample(90.0));

            let active = manager.active_alerts();
            assert_eq!(active.len(), 1);
            assert_eq!(active[0].count, 1);
        }

        #[test]
        fn firewall_disabled_is_critical() {
            let manager = AlertManager::default();
            manager.evaluate(&MetricsSample {
                firewall_enabled: false,
                ..Default::default()
            });

            let active = manager.active_alerts();
            assert_eq!(active[0].id, "security_firewall_disabled");
            assert_eq!(active[0].severity, AlertSeverity::Critical);
        }

        #[test]
        fn pool_severity_escalates_at_high_threshold() {
            let manager = AlertManager::default();

            manager.evaluate(&MetricsSample {
                pool_utilization: 92.0,
                ..Default::default()
            });
            assert_eq!(
                manager.get("network_pool_utilization_high").unwrap().severity,
                AlertSeverity::Medium
            );

            manager.evaluate(&MetricsSample {
                pool_utilization: 96.0,
                ..Default::default()
            });
            assert_eq!(
                manager.get("network_pool_utilization_high").unwrap().severity,
                AlertSeverity::High
            );
        }

        #[test]
        fn multiple_rules_fire_together() {
            let manager = AlertManager::default();
            manager.evaluate(&MetricsSample {
                cpu_usage: 95.0,
                memory_usage: 90.0,
                disk_usage: 95.0,
                firewall_enabled: false,
                failed_logins: 25,
                ..Default::default()
            });

            let active = manager.active_alerts();
            assert_eq!(active.len(), 5);
            // Most urgent first.
            assert_eq!(active[0].severity, AlertSeverity::Critical);
        }

        #[test]
        fn boundary_values_do_not_fire() {
            let manager = AlertManager::default();
            manager.evaluate(&MetricsSample {
                cpu_usage: 80.0,
                memory_usage: 85.0,
                disk_usage: 90.0,
                pool_utilization: 90.0,
                failed_logins: 10,
                active_clients: 1000,
                error_rate: 5.0,
                ..Default::default()
            });
            assert!(manager.active_alerts().is_empty());
        }
    }

    mod manual_operation_tests {
        use super::*;

        #[test]
        fn manual_resolve() {
            let manager = AlertManager::default();
            manager.evaluate(&cpu_sample(90.0));

            let resolved = manager.resolve("system_cpu_high").expect("should resolve");
            assert_eq!(resolved.status, AlertStatus::Resolved);
            assert!(manager.active_alerts().is_empty());
        }

        #[test]
        fn resolve_unknown_fails() {
            let manager = AlertManager::default();
            assert!(matches!(
                manager.resolve("nope"),
                Err(AlertError::NotFound { .. })
            ));
        }

        #[test]
        fn resolve_twice_fails() {
            let manager = AlertManager::default();
            manager.evaluate(&cpu_sample(90.0));
            manager.resolve("system_cpu_high").expect("should resolve");

            assert!(matches!(
                manager.resolve("system_cpu_high"),
                Err(AlertError::AlreadyResolved { .. })
            ));
        }

        #[test]
        fn suppression_hides_from_active() {
            let manager = AlertManager::default();
            manager.evaluate(&cpu_sample(90.0));

            manager
                .suppress("system_cpu_high", Duration::minutes(30))
                .expect("should suppress");

            assert!(manager.active_alerts().is_empty());
            // Still visible in the full listing.
            let all = manager.all_alerts(DateTime::<Utc>::MIN_UTC);
            assert_eq!(all.len(), 1);
            assert_eq!(all[0].status, AlertStatus::Suppressed);
        }

        #[test]
        fn suppression_expiry_restores_on_next_evaluation() {
            let manager = AlertManager::default();
            manager.evaluate(&cpu_sample(90.0));
            manager
                .suppress("system_cpu_high", Duration::seconds(-1))
                .expect("should suppress");

            // Condition still holds; the expired suppression lifts and
            // the alert re-triggers.
            manager.evaluate(&cpu_sample(90.0));
            let active = manager.active_alerts();
            assert_eq!(active.len(), 1);
            assert_eq!(active[0].id, "system_cpu_high");
        }

        #[test]
        fn suppress_unknown_fails() {
            let manager = AlertManager::default();
            assert!(matches!(
                manager.suppress("nope", Duration::minutes(5)),
                Err(AlertError::NotFound { .. })
            ));
        }

        #[test]
        fn suppress_resolved_fails() {
            let manager = AlertManager::default();
            manager.evaluate(&cpu_sample(90.0));
            manager.resolve("system_cpu_high").expect("should resolve");

            assert!(matches!(
                manager.suppress("system_cpu_high", Duration::minutes(5)),
                Err(AlertError::NotActive { .. })
            ));
        }
    }

    mod cleanup_tests {
        use super::*;

        #[test]
        fn stale_resolved_alerts_are_swept() {
            let manager = AlertManager::default();
            manager.evaluate(&cpu_sample(90.0));
            manager.evaluate(&cpu_sample(50.0));
            assert_eq!(manager.len(), 1);

            // Age the resolution past retention.
            {
                let mut alerts = manager.alerts.lock();
                let alert = alerts.get_mut("system_cpu_high").unwrap();
                alert.resolved_at = Some(Utc::now() - Duration::hours(25));
            }

            manager.evaluate(&MetricsSample::default());
            assert!(manager.is_empty());
        }

        #[test]
        fn fresh_resolved_alerts_survive() {
            let manager = AlertManager::default();
            manager.evaluate(&cpu_sample(90.0));
            manager.evaluate(&cpu_sample(50.0));
            manager.evaluate(&MetricsSample::default());
            assert_eq!(manager.len(), 1);
        }
    }

    mod query_tests {
        use super::*;

        #[test]
        fn all_alerts_filters_by_since() {
            let manager = AlertManager::default();
            manager.evaluate(&cpu_sample(90.0));

            let future = Utc::now() + Duration::hours(1);
            assert!(manager.all_alerts(future).is_empty());
            assert_eq!(manager.all_alerts(DateTime::<Utc>::MIN_UTC).len(), 1);
        }

        #[test]
        fn get_returns_clone() {
            let manager = AlertManager::default();
            manager.evaluate(&cpu_sample(90.0));
            assert!(manager.get("system_cpu_high").is_some());
            assert!(manager.get("nope").is_none());
        }
    }
}
