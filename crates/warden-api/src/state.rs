//! Shared state handed to every handler.

use std::sync::Arc;

use warden_auth::TokenManager;
use warden_firewall::PfDriver;
use warden_monitor::Monitor;
use warden_pool::IpPool;
use warden_store::Store;
use warden_wireguard::WgDriver;

/// Deployment-level settings the handlers need.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Public host clients dial, written into `Endpoint = host:port`.
    pub endpoint_host: String,
    /// Uplink interface used for firewall NAT rules.
    pub external_interface: String,
    /// Listen port used when `initialize` is called without one.
    pub default_listen_port: u16,
    /// DNS list used when `initialize` is called without one.
    pub default_dns: String,
    /// Outbound TCP ports the firewall opens for clients.
    pub allowed_ports: Vec<u16>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            endpoint_host: "localhost".to_string(),
            external_interface: "eth0".to_string(),
            default_listen_port: 51820,
            default_dns: "1.1.1.1".to_string(),
            allowed_ports: Vec::new(),
        }
    }
}

/// Everything the handlers share. Cheap to clone.
#[derive(Clone)]
pub struct ApiState {
    /// Persistence.
    pub store: Arc<Store>,
    /// Address allocator.
    pub pool: Arc<IpPool>,
    /// WireGuard interface driver.
    pub wireguard: Arc<WgDriver>,
    /// Packet filter driver.
    pub firewall: Arc<PfDriver>,
    /// Monitoring engine.
    pub monitor: Arc<Monitor>,
    /// Token issuing and validation.
    pub tokens: Arc<TokenManager>,
    /// Deployment settings.
    pub settings: ApiSettings,
}

impl ApiState {
    /// Bundles the collaborators into one state value.
    #[must_use]
    pub fn new(
        store: Arc<Store>,
        pool: Arc<IpPool>,
        wireguard: Arc<WgDriver>,
        firewall: Arc<PfDriver>,
        monitor: Arc<Monitor>,
        tokens: Arc<TokenManager>,
        settings: ApiSettings,
    ) -> Self {
        Self {
            store,
            pool,
            wireguard,
            firewall,
            monitor,
            tokens,
            settings,
        }
    }
}
