//! Runtime reconciliation: copying `wg show` state back onto rows.
//!
//! WireGuard itself has no notion of sessions, so "connected" is
//! derived: a peer whose latest handshake falls inside the activity
//! window counts as online. The reconciler polls the live interface,
//! overwrites each row's counters and handshake, and appends
//! connect/disconnect events to the audit log whenever a peer crosses
//! the window boundary. It runs as its own task, separate from the
//! metrics tick.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use warden_store::{ConnectionAction, Store};
use warden_wireguard::{RuntimePeer, WgDriver};

use crate::error::{MonitorError, Result};
use crate::types::ACTIVITY_WINDOW;

/// Reconciler configuration.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Time between polls of the live interface.
    pub poll_interval: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            // Half the activity window: tight enough to catch
            // transitions, loose enough to stay off the hot path.
            poll_interval: Duration::from_secs(150),
        }
    }
}

/// Decides whether an activity-window crossing happened.
///
/// `prev` and `next` are the stored and freshly observed handshake
/// times. Returns the audit event to record, if any.
fn transition(
    prev: Option<DateTime<Utc>>,
    next: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<ConnectionAction> {
    let was_active = prev.is_some_and(|h| now - h <= ACTIVITY_WINDOW);
    let is_active = next.is_some_and(|h| now - h <= ACTIVITY_WINDOW);

    match (was_active, is_active) {
        (false, true) => Some(ConnectionAction::Connect),
        (true, false) => Some(ConnectionAction::Disconnect),
        _ => None,
    }
}

struct RuntimeState {
    running: bool,
    stop: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

/// Background task syncing live WireGuard state into the store.
pub struct Reconciler {
    store: Arc<Store>,
    wireguard: Arc<WgDriver>,
    config: ReconcilerConfig,
    runtime: Mutex<RuntimeState>,
}

impl Reconciler {
    /// Creates a reconciler over the store and driver.
    #[must_use]
    pub fn new(store: Arc<Store>, wireguard: Arc<WgDriver>, config: ReconcilerConfig) -> Self {
        Self {
            store,
            wireguard,
            config,
            runtime: Mutex::new(RuntimeState {
                running: false,
                stop: None,
                handle: None,
            }),
        }
    }

    /// Whether the background task is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.runtime.lock().running
    }

    /// Runs one reconciliation pass immediately.
    ///
    /// Returns the number of rows updated; an unreachable interface
    /// (down, or no `wg` binary) reconciles nothing and is not an
    /// error.
    pub async fn reconcile_once(&self) -> usize {
        let runtime_peers = match self.wireguard.runtime_peers().await {
            Ok(peers) => peers,
            Err(e) => {
                debug!(error = %e, "interface not readable; skipping reconcile pass");
                return 0;
            }
        };
        apply_runtime_state(&self.store, &runtime_peers)
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
        let store = Arc::clone(&self.store);
        let wireguard = Arc::clone(&self.wireguard);
        let interval = self.config.poll_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match wireguard.runtime_peers().await {
                            Ok(peers) => {
                                let updated = apply_runtime_state(&store, &peers);
                                debug!(updated, "reconcile pass complete");
                            }
                            Err(e) => {
                                debug!(error = %e, "interface not readable; skipping reconcile pass");
                            }
                        }
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("reconciler task exited");
        });

        runtime.running = true;
        runtime.stop = Some(stop_tx);
        runtime.handle = Some(handle);
        info!(interval_secs = interval.as_secs(), "reconciler started");
        Ok(())
    }

    /// Signals the task and waits for it to exit.
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
                warn!(error = %e, "reconciler task join failed");
            }
        }
        info!("reconciler stopped");
        Ok(())
    }
}

/// Applies one batch of runtime peer state to the store.
///
/// Returns the number of rows updated. Peers present on the interface
/// but not in the store are skipped; the store is authoritative for
/// membership.
fn apply_runtime_state(store: &Store, runtime_peers: &[RuntimePeer]) -> usize {
    let now = Utc::now();
    let rows: HashMap<String, _> = store
        .list_peers()
        .into_iter()
        .map(|p| (p.public_key.clone(), p))
        .collect();

    let mut updated = 0;
    for runtime_peer in runtime_peers {
        let key = runtime_peer.public_key.to_base64();
        let Some(row) = rows.get(&key) else {
            debug!(peer = %key, "interface peer unknown to the store");
            continue;
        };

        if let Some(action) = transition(row.last_handshake, runtime_peer.latest_handshake, now) {
            let remote = runtime_peer.endpoint.clone().unwrap_or_default();
            if let Err(e) = store.log_connection(&row.id, action, &remote) {
                warn!(peer = %row.id, error = %e, "audit log append failed");
            }
        }

        if let Err(e) = store.update_peer_stats(
            &row.id,
            runtime_peer.bytes_received,
            runtime_peer.bytes_sent,
            runtime_peer.latest_handshake,
        ) {
            warn!(peer = %row.id, error = %e, "stats update failed");
        } else {
            updated += 1;
        }
    }
    updated
}
