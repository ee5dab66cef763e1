//! `wardend`: the Warden VPN control-plane daemon.
//!
//! Wires the store, address pool, WireGuard and firewall drivers,
//! monitor, and admin API together, then serves until ctrl-c.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use warden_api::{ApiServer, ApiSettings, ApiState};
use warden_auth::TokenManager;
use warden_firewall::PfDriver;
use warden_monitor::{Monitor, MonitorConfig, Reconciler, ReconcilerConfig};
use warden_pool::IpPool;
use warden_store::Store;
use warden_wireguard::WgDriver;

/// Command line and environment configuration.
#[derive(Debug, Parser)]
#[command(name = "wardend", version, about)]
struct Cli {
    /// Port the admin API listens on.
    #[arg(long, env = "WARDEN_WEB_PORT", default_value_t = 8080)]
    web_port: u16,

    /// Default WireGuard UDP listen port for server initialization.
    #[arg(long, env = "WARDEN_LISTEN_PORT", default_value_t = 51820)]
    listen_port: u16,

    /// WireGuard interface name.
    #[arg(long, env = "WARDEN_INTERFACE", default_value = "wg0")]
    interface: String,

    /// Directory holding WireGuard interface configs.
    #[arg(long, env = "WARDEN_CONFIG_DIR", default_value = "/etc/wireguard")]
    config_dir: PathBuf,

    /// Directory holding Warden state.
    #[arg(long, env = "WARDEN_STATE_DIR", default_value = "/var/lib/warden")]
    state_dir: PathBuf,

    /// The VPN network in CIDR notation.
    #[arg(long, env = "WARDEN_NETWORK", default_value = "10.8.0.0/24")]
    network: String,

    /// Public host clients dial; set to the server's public address
    /// in real deployments.
    #[arg(long, env = "WARDEN_ENDPOINT_HOST", default_value = "localhost")]
    endpoint_host: String,

    /// Uplink interface for NAT rules.
    #[arg(long, env = "WARDEN_EXTERNAL_INTERFACE", default_value = "eth0")]
    external_interface: String,

    /// Default DNS servers handed to clients, comma-joined.
    #[arg(long, env = "WARDEN_DNS", default_value = "1.1.1.1")]
    dns: String,

    /// Token signing secret. A fresh one is generated (and sessions
    /// won't survive restarts) when unset.
    #[arg(long, env = "WARDEN_TOKEN_SECRET")]
    token_secret: Option<String>,

    /// Token lifetime in hours.
    #[arg(long, env = "WARDEN_TOKEN_LIFETIME_HOURS", default_value_t = 24)]
    token_lifetime_hours: i64,

    /// Monitor sampling interval in seconds.
    #[arg(long, env = "WARDEN_MONITOR_INTERVAL", default_value_t = 30)]
    monitor_interval_secs: u64,

    /// Runtime reconciliation interval in seconds.
    #[arg(long, env = "WARDEN_RECONCILE_INTERVAL", default_value_t = 150)]
    reconcile_interval_secs: u64,

    /// Outbound TCP ports the firewall opens for clients.
    #[arg(long, env = "WARDEN_ALLOWED_PORTS", value_delimiter = ',')]
    allowed_ports: Vec<u16>,

    /// Disable host CPU/memory/disk sampling.
    #[arg(long, env = "WARDEN_NO_SYSTEM_STATS")]
    no_system_stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    info!(interface = %cli.interface, network = %cli.network, "starting wardend");

    let secret = cli.token_secret.clone().unwrap_or_else(|| {
        warn!("no token secret configured; generating one (tokens reset on restart)");
        warden_auth::generate_secret()
    });
    let tokens = TokenManager::new(secret.as_bytes())
        .context("token secret rejected")?
        .with_lifetime(chrono::Duration::hours(cli.token_lifetime_hours));

    let store = Arc::new(Store::open(&cli.state_dir).context("opening state store")?);
    let pool = Arc::new(IpPool::new(&cli.network).context("building address pool")?);

    // Re-mark every persisted peer address so the allocator and the
    // store agree after a restart.
    for address in store.peer_addresses() {
        if let Err(e) = pool.allocate_specific(address) {
            warn!(ip = %address, error = %e, "could not reserve persisted address");
        }
    }

    let wireguard = Arc::new(WgDriver::new(&cli.config_dir, &cli.interface));
    let firewall = Arc::new(PfDriver::default());

    let monitor_config = MonitorConfig {
        update_interval: std::time::Duration::from_secs(cli.monitor_interval_secs),
        system_stats_enabled: !cli.no_system_stats,
        ..Default::default()
    };
    let monitor = Arc::new(Monitor::new(
        store.clone(),
        wireguard.clone(),
        pool.clone(),
        firewall.clone(),
        monitor_config,
    ));
    monitor.start().context("starting monitor")?;

    let reconciler = Arc::new(Reconciler::new(
        store.clone(),
        wireguard.clone(),
        ReconcilerConfig {
            poll_interval: std::time::Duration::from_secs(cli.reconcile_interval_secs),
        },
    ));
    reconciler.start().context("starting reconciler")?;

    let state = ApiState::new(
        store,
        pool,
        wireguard,
        firewall,
        monitor.clone(),
        Arc::new(tokens),
        ApiSettings {
            endpoint_host: cli.endpoint_host.clone(),
            external_interface: cli.external_interface.clone(),
            default_listen_port: cli.listen_port,
            default_dns: cli.dns.clone(),
            allowed_ports: cli.allowed_ports.clone(),
        },
    );

    // Converge the on-disk interface config with the persisted rows;
    // best-effort peer mutations may have failed mid-flight last run.
    match warden_api::handlers::server::reconcile_interface_config(&state) {
        Ok(true) => info!("interface config reconciled"),
        Ok(false) => info!("server not initialized yet; skipping reconcile"),
        Err(e) => warn!(error = %e, "interface config reconcile failed"),
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.web_port));
    let server = ApiServer::new(state.clone());

    server
        .serve_with_shutdown(addr, shutdown_signal())
        .await
        .context("admin API failed")?;

    if let Err(e) = reconciler.stop().await {
        warn!(error = %e, "reconciler did not stop cleanly");
    }
    if let Err(e) = monitor.stop().await {
        warn!(error = %e, "monitor did not stop cleanly");
    }
    info!("wardend exited");
    Ok(())
}

/// Resolves when the process receives ctrl-c.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for shutdown signal");
    }
    info!("shutdown signal received");
}
