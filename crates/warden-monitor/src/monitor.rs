//! The monitor task and its sampler.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use warden_alerts::{AlertManager, AlertThresholds, MetricsSample};
use warden_firewall::PfDriver;
use warden_pool::IpPool;
use warden_store::{ConnectionAction, Store};
use warden_wireguard::{InterfaceState, WgDriver};

use crate::error::{MonitorError, Result};
use crate::types::{
    derive_health, ConnectionStats, MetricsSnapshot, NetworkStats, SecurityStats, SystemStats,
    WireGuardStats, ACTIVITY_WINDOW,
};

/// Window for "recent" connect/disconnect counts.
const RECENT_WINDOW: chrono::Duration = chrono::Duration::hours(1);

/// Monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Time between sampling passes.
    pub update_interval: Duration,
    /// How much snapshot history to retain.
    pub metrics_retention: Duration,
    /// Whether to read host CPU/memory/disk figures.
    pub system_stats_enabled: bool,
    /// Thresholds handed to the alert manager.
    pub thresholds: AlertThresholds,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_secs(30),
            metrics_retention: Duration::from_secs(3600),
            system_stats_enabled: true,
            thresholds: AlertThresholds::default(),
        }
    }
}

/// Collects one snapshot from the store, drivers, and host.
#[derive(Clone)]
struct Sampler {
    store: Arc<Store>,
    wireguard: Arc<WgDriver>,
    pool: Arc<IpPool>,
    firewall: Arc<PfDriver>,
    system_stats_enabled: bool,
    started_at: Instant,
}

impl Sampler {
    async fn sample(&self) -> MetricsSnapshot {
        let now = Utc::now();
        let peers = self.store.list_peers();

        let active_peers = peers
            .iter()
            .filter(|p| {
                p.last_handshake
                    .is_some_and(|h| now - h <= ACTIVITY_WINDOW)
            })
            .count();

        let connections = ConnectionStats {
            total_peers: peers.len(),
            active_peers,
            recent_connects: self
                .store
                .count_connections_since(ConnectionAction::Connect, now - RECENT_WINDOW),
            recent_disconnects: self
                .store
                .count_connections_since(ConnectionAction::Disconnect, now - RECENT_WINDOW),
        };

        let network = NetworkStats {
            bytes_received: peers.iter().map(|p| p.bytes_received).sum(),
            bytes_sent: peers.iter().map(|p| p.bytes_sent).sum(),
            pool_utilization: self.pool.utilization(),
            sampled_at: now,
        };

        let system = self.system_stats_enabled.then(|| self.sample_system());

        // Both drivers shell out; on hosts without the tooling the
        // sample degrades rather than failing the tick.
        let security = match self.firewall.get_status().await {
            Ok(status) => SecurityStats {
                firewall_enabled: status.enabled,
                active_rule_count: status.rule_count,
                blocked_connections: 0,
                failed_logins: self.store.failed_login_count(),
            },
            Err(e) => {
                debug!(error = %e, "firewall status unavailable");
                SecurityStats {
                    firewall_enabled: false,
                    active_rule_count: 0,
                    blocked_connections: 0,
                    failed_logins: self.store.failed_login_count(),
                }
            }
        };

        let interface_up = match self.wireguard.status().await {
            Ok(status) => status.state == InterfaceState::Running,
            Err(e) => {
                debug!(error = %e, "wireguard status unavailable");
                false
            }
        };

        let server = self.store.get_server_config();
        let wireguard = WireGuardStats {
            interface_up,
            listen_port: server.as_ref().map(|s| s.listen_port),
            public_key: server.map(|s| s.public_key),
            total_peers: peers.len(),
            active_peers,
            last_handshake: peers.iter().filter_map(|p| p.last_handshake).max(),
        };

        let health = derive_health(&security, system.as_ref());

        MetricsSnapshot {
            connections,
            network,
            system,
            security,
            wireguard,
            health,
            sampled_at: now,
        }
    }

    fn sample_system(&self) -> SystemStats {
        let mut sys = sysinfo::System::new();
        sys.refresh_cpu_usage();
        sys.refresh_memory();

        let memory_usage = if sys.total_memory() == 0 {
            0.0
        } else {
            sys.used_memory() as f64 / sys.total_memory() as f64 * 100.0
        };

        let disks = sysinfo::Disks::new_with_refreshed_list();
        let disk_usage = disks
            .iter()
            .filter(|d| d.total_space() > 0)
            .map(|d| {
                (d.total_space() - d.available_space()) as f64 / d.total_space() as f64 * 100.0
            })
            .fold(0.0, f64::max);

        let task_count = tokio::runtime::Handle::try_current()
            .map(|h| h.metrics().num_alive_tasks())
            .unwrap_or(0);

        SystemStats {
            cpu_usage: f64::from(sys.global_cpu_usage()),
            memory_usage,
            disk_usage,
            task_count,
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }
}

/// Per-run state guarded by the monitor's lock.
struct RuntimeState {
    running: bool,
    stop: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

/// The monitoring engine.
///
/// `start` spawns a single background task; a second `start` before
/// `stop` errors. The latest snapshot is replaced atomically under a
/// lock and [`Monitor::get_metrics`] hands out deep copies.
pub struct Monitor {
    sampler: Sampler,
    alerts: Arc<AlertManager>,
    config: MonitorConfig,
    snapshot: Arc<Mutex<Option<MetricsSnapshot>>>,
    history: Arc<Mutex<VecDeque<MetricsSnapshot>>>,
    runtime: Mutex<RuntimeState>,
}

impl Monitor {
    /// Creates a monitor over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<Store>,
        wireguard: Arc<WgDriver>,
        pool: Arc<IpPool>,
        firewall: Arc<PfDriver>,
        config: MonitorConfig,
    ) -> Self {
        let alerts = Arc::new(AlertManager::new(config.thresholds.clone()));
        Self {
            sampler: Sampler {
                store,
                wireguard,
                pool,
                firewall,
                system_stats_enabled: config.system_stats_enabled,
                started_at: Instant::now(),
            },
            alerts,
            config,
            snapshot: Arc::new(Mutex::new(None)),
            history: Arc::new(Mutex::new(VecDeque::new())),
            runtime: Mutex::new(RuntimeState {
                running: false,
                stop: None,
                handle: None,
            }),
        }
    }

    /// The alert manager driven by this monitor.
    #[must_use]
    pub fn alerts(&self) -> Arc<AlertManager> {
        Arc::clone(&self.alerts)
    }

    /// Whether the background task is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.runtime.lock().running
    }

    /// Deep copy of the most recent snapshot.
    #[must_use]
    pub fn get_metrics(&self) -> Option<MetricsSnapshot> {
        self.snapshot.lock().clone()
    }

    /// Snapshots retained within the configured window, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<MetricsSnapshot> {
        self.history.lock().iter().cloned().collect()
    }

    /// Takes one sampling pass immediately, outside the tick.
    pub async fn sample_now(&self) -> MetricsSnapshot {
        let snapshot = self.sampler.sample().await;
        self.record(snapshot.clone());
        snapshot
    }

    /// Starts the background task.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::AlreadyRunning`] on a second start.
    pub fn start(&self) -> Result<()> {
        let mut runtime = self.runtime.lock();
        if runtime.running {
            return Err(MonitorError::AlreadyRunning);
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let sampler = self.sampler.clone();
        let alerts = Arc::clone(&self.alerts);
        let snapshot_slot = Arc::clone(&self.snapshot);
        let history = Arc::clone(&self.history);
        let interval = self.config.update_interval;
        let retention = self.config.metrics_retention;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let snapshot = sampler.sample().await;
                        alerts.evaluate(&sample_for_alerts(&snapshot));
                        record_snapshot(&snapshot_slot, &history, retention, snapshot);
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("monitor task exited");
        });

        runtime.running = true;
        runtime.stop = Some(stop_tx);
        runtime.handle = Some(handle);
        info!(interval_secs = interval.as_secs(), "monitor started");
        Ok(())
    }

    /// Signals the task and waits for it to exit.
    ///
    /// The task shuts down within one update interval of the signal.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::NotRunning`] when no task is running.
    pub async fn stop(&self) -> Result<()> {
        let handle = {
            let mut runtime = self.runtime.lock();
            if !runtime.running {
                return Err(MonitorError::NotRunning);
            }
            runtime.running = false;
            if let Some(stop) = runtime.stop.take() {
                let _ = stop.send(true);
            }
            runtime.handle.take()
        };

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "monitor task join failed");
            }
        }
        info!("monitor stopped");
        Ok(())
    }

    fn record(&self, snapshot: MetricsSnapshot) {
        self.alerts.evaluate(&sample_for_alerts(&snapshot));
        record_snapshot(
            &self.snapshot,
            &self.history,
            self.config.metrics_retention,
            snapshot,
        );
    }
}

/// Replaces the current snapshot and prunes history past retention.
fn record_snapshot(
    slot: &Mutex<Option<MetricsSnapshot>>,
    history: &Mutex<VecDeque<MetricsSnapshot>>,
    retention: Duration,
    snapshot: MetricsSnapshot,
) {
    *slot.lock() = Some(snapshot.clone());

    let mut history = history.lock();
    history.push_back(snapshot);
    let cutoff =
        Utc::now() - chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::hours(1));
    while history.front().is_some_and(|s| s.sampled_at < cutoff) {
        history.pop_front();
    }
}

/// Flattens a snapshot into the alert manager's input.
fn sample_for_alerts(snapshot: &MetricsSnapshot) -> MetricsSample {
    MetricsSample {
        cpu_usage: snapshot.system.as_ref().map_or(0.0, |s| s.cpu_usage),
        memory_usage: snapshot.system.as_ref().map_or(0.0, |s| s.memory_usage),
        disk_usage: snapshot.system.as_ref().map_or(0.0, |s| s.disk_usage),
        pool_utilization: snapshot.network.pool_utilization,
        firewall_enabled: snapshot.security.firewall_enabled,
        failed_logins: snapshot.security.failed_logins,
        active_clients: snapshot.connections.active_peers as u64,
        response_time_ms: 0.0,
        error_rate: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_store::NewPeer;

    fn make_monitor(config: MonitorConfig) -> (Monitor, Arc<Store>, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(Store::in_memory());
        let wireguard = Arc::new(WgDriver::new(dir.path(), "wg-test"));
        let pool = Arc::new(IpPool::new("10.8.0.0/24").expect("valid network"));
        let firewall = Arc::new(PfDriver::new(
            dir.path().join("pf.conf"),
            dir.path().join("anchor.conf"),
        ));
        let monitor = Monitor::new(store.clone(), wireguard, pool, firewall, config);
        (monitor, store, dir)
    }

    fn quick_config() -> MonitorConfig {
        MonitorConfig {
            update_interval: Duration::from_millis(20),
            ..Default::default()
        }
    }

    mod lifecycle_tests {
        use super::*;

        #[tokio::test]
        async fn start_then_stop() {
            let (monitor, _store, _dir) = make_monitor(quick_config());
            assert!(!monitor.is_running());

            monitor.start().expect("should start");
            assert!(monitor.is_running());

            monitor.stop().await.expect("should stop");
            assert!(!monitor.is_running());
        }

        #[tokio::test]
        async fn double_start_errors() {
            let (monitor, _store, _dir) = make_monitor(quick_config());
            monitor.start().expect("should start");

            assert_eq!(monitor.start().err(), Some(MonitorError::AlreadyRunning));

            monitor.stop().await.expect("should stop");
        }

        #[tokio::test]
        async fn stop_without_start_errors() {
            let (monitor, _store, _dir) = make_monitor(quick_config());
            assert_eq!(monitor.stop().await.err(), Some(MonitorError::NotRunning));
        }

        #[tokio::test]
        async fn stop_twice_errors_second_time() {
            let (monitor, _store, _dir) = make_monitor(quick_config());
            monitor.start().expect("should start");
            monitor.stop().await.expect("should stop");
            assert_eq!(monitor.stop().await.err(), Some(MonitorError::NotRunning));
        }

        #[tokio::test]
        async fn restart_after_stop_is_allowed() {
            let (monitor, _store, _dir) = make_monitor(quick_config());
            monitor.start().expect("should start");
            monitor.stop().await.expect("should stop");
            monitor.start().expect("should start again");
            monitor.stop().await.expect("should stop again");
        }

        #[tokio::test]
        async fn ticking_produces_snapshots() {
            let (monitor, _store, _dir) = make_monitor(quick_config());
            monitor.start().expect("should start");

            tokio::time::sleep(Duration::from_millis(120)).await;
            monitor.stop().await.expect("should stop");

            assert!(monitor.get_metrics().is_some());
            assert!(!monitor.history().is_empty());
        }
    }

    mod sampling_tests {
        use super::*;
        use chrono::Utc;

        #[tokio::test]
        async fn snapshot_counts_peers_and_activity() {
            let (monitor, store, _dir) = make_monitor(quick_config());

            let fresh = store
                .create_peer(NewPeer {
                    name: "fresh".to_string(),
                    private_key: "pk1".to_string(),
                    public_key: "pub1".to_string(),
                    address: "10.8.0.2".parse().unwrap(),
                })
                .expect("create");
            store
                .update_peer_stats(&fresh.id, 100, 50, Some(Utc::now()))
                .expect("stats");

            let stale = store
                .create_peer(NewPeer {
                    name: "stale".to_string(),
                    private_key: "pk2".to_string(),
                    public_key: "pub2".to_string(),
                    address: "10.8.0.3".parse().unwrap(),
                })
                .expect("create");
            store
                .update_peer_stats(
                    &stale.id,
                    10,
                    20,
                    Some(Utc::now() - chrono::Duration::minutes(10)),
                )
                .expect("stats");

            let snapshot = monitor.sample_now().await;
            assert_eq!(snapshot.connections.total_peers, 2);
            assert_eq!(snapshot.connections.active_peers, 1);
            assert_eq!(snapshot.network.bytes_received, 110);
            assert_eq!(snapshot.network.bytes_sent, 70);
            assert_eq!(snapshot.wireguard.total_peers, 2);
            assert!(snapshot.wireguard.last_handshake.is_some());
        }

        #[tokio::test]
        async fn pool_utilization_reflects_allocations() {
            let (monitor, _store, _dir) = make_monitor(quick_config());

            let before = monitor.sample_now().await;
            // Only the server slot is taken in a fresh /24.
            assert!(before.network.pool_utilization < 1.0);
        }

        #[tokio::test]
        async fn system_stats_can_be_disabled() {
            let config = MonitorConfig {
                system_stats_enabled: false,
                ..quick_config()
            };
            let (monitor, _store, _dir) = make_monitor(config);

            let snapshot = monitor.sample_now().await;
            assert!(snapshot.system.is_none());
        }

        #[tokio::test]
        async fn get_metrics_returns_deep_copy() {
            let (monitor, _store, _dir) = make_monitor(quick_config());
            monitor.sample_now().await;

            let a = monitor.get_metrics().expect("sampled");
            let b = monitor.get_metrics().expect("sampled");
            assert_eq!(a, b);
        }

        #[tokio::test]
        async fn sampling_drives_alert_evaluation() {
            let (monitor, _store, _dir) = make_monitor(quick_config());
            monitor.sample_now().await;

            // No pfctl in the test environment: the firewall reads as
            // disabled, which is exactly the critical alert condition.
            let active = monitor.alerts().active_alerts();
            assert!(active.iter().any(|a| a.id == "security_firewall_disabled"));
        }

        #[tokio::test]
        async fn connection_log_feeds_recent_counts() {
            let (monitor, store, _dir) = make_monitor(quick_config());
            let peer = store
                .create_peer(NewPeer {
                    name: "p".to_string(),
                    private_key: "pk".to_string(),
                    public_key: "pub".to_string(),
                    address: "10.8.0.2".parse().unwrap(),
                })
                .expect("create");

            store
                .log_connection(&peer.id, ConnectionAction::Connect, "203.0.113.7")
                .expect("log");
            store
                .log_connection(&peer.id, ConnectionAction::Disconnect, "203.0.113.7")
                .expect("log");

            let snapshot = monitor.sample_now().await;
            assert_eq!(snapshot.connections.recent_connects, 1);
            assert_eq!(snapshot.connections.recent_disconnects, 1);
        }
    }
}
