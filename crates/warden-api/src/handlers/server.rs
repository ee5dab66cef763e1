//! `/server` handlers: lifecycle, configuration, logs.

use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use warden_firewall::VpnRuleConfig;
use warden_store::{ConnectionLogEntry, ServerConfig};
use warden_wireguard::{
    InterfaceSection, KeyPair, PeerSection, PrivateKey, PublicKey, WgConfig,
};

use crate::error::{ApiError, ApiResult};
use crate::state::ApiState;
use crate::types::{
    InitializeRequest, LogsQuery, ServerConfigUpdateRequest, ServerConfigView,
};

/// Default log page size.
const DEFAULT_LOG_LIMIT: usize = 50;

fn require_initialized(state: &ApiState) -> ApiResult<ServerConfig> {
    state
        .store
        .get_server_config()
        .ok_or_else(|| ApiError::Validation("Server is not initialized".to_string()))
}

/// Rebuilds the interface file from the store: server `[Interface]`
/// plus one stanza per peer.
fn write_interface_config(state: &ApiState, server: &ServerConfig) -> ApiResult<()> {
    let private_key = PrivateKey::from_base64(&server.private_key)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let mut interface = InterfaceSection::new(private_key);
    interface.address = ipnet_for(server).map_err(ApiError::Internal)?;
    interface.listen_port = Some(server.listen_port);

    let mut config = WgConfig::new(interface);
    for peer in state.store.list_peers() {
        match PublicKey::from_base64(&peer.public_key) {
            Ok(key) => config.peers.push(PeerSection::for_client(key, peer.address)),
            Err(e) => warn!(peer = %peer.id, error = %e, "skipping peer with bad key"),
        }
    }

    state.wireguard.write_config(&config)?;
    Ok(())
}

fn ipnet_for(server: &ServerConfig) -> Result<Option<ipnet::Ipv4Net>, String> {
    ipnet::Ipv4Net::new(server.server_address(), server.network.prefix_len())
        .map(Some)
        .map_err(|e| e.to_string())
}

/// `GET /server/status`
pub async fn status(State(state): State<ApiState>) -> ApiResult<Json<serde_json::Value>> {
    let initialized = state.store.get_server_config().is_some();
    let status = state.wireguard.status().await?;
    Ok(Json(json!({
        "initialized": initialized,
        "state": status.state,
        "interface": status.interface,
        "peer_count": status.peer_count,
        "checked_at": status.checked_at,
        "message": status.message,
    })))
}

/// `POST /server/initialize`
///
/// Generates the server key pair on first call, persists the config,
/// rewrites the interface file, and installs firewall rules
/// best-effort (hosts without pfctl still initialize).
pub async fn initialize(
    State(state): State<ApiState>,
    Json(req): Json<InitializeRequest>,
) -> ApiResult<Json<ServerConfigView>> {
    let network = state.pool.network();

    let config = match state.store.get_server_config() {
        Some(mut existing) => {
            if let Some(port) = req.listen_port {
                existing.listen_port = port;
            }
            if let Some(dns) = req.dns {
                existing.dns = dns;
            }
            existing
        }
        None => {
            let keys = KeyPair::generate();
            ServerConfig {
                private_key: keys.private_key().to_base64(),
                public_key: keys.public_key().to_base64(),
                listen_port: req.listen_port.unwrap_or(state.settings.default_listen_port),
                network,
                interface: state.wireguard.interface().to_string(),
                dns: req.dns.unwrap_or_else(|| state.settings.default_dns.clone()),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            }
        }
    };

    if config.listen_port == 0 {
        return Err(ApiError::Validation("Listen port must be 1-65535".to_string()));
    }

    let config = state.store.set_server_config(config)?;
    write_interface_config(&state, &config)?;

    let rules = VpnRuleConfig {
        interface: config.interface.clone(),
        vpn_network: config.network,
        external_interface: state.settings.external_interface.clone(),
        listen_port: Some(config.listen_port),
        allowed_ports: state.settings.allowed_ports.clone(),
    };
    if let Err(e) = state.firewall.enable(&rules).await {
        warn!(error = %e, "firewall installation failed; continuing");
    }

    info!(interface = %config.interface, network = %config.network, "server initialized");
    Ok(Json(config.into()))
}

/// `GET /server/config`
pub async fn get_config(State(state): State<ApiState>) -> ApiResult<Json<ServerConfigView>> {
    Ok(Json(require_initialized(&state)?.into()))
}

/// `PUT /server/config`
pub async fn update_config(
    State(state): State<ApiState>,
    Json(req): Json<ServerConfigUpdateRequest>,
) -> ApiResult<Json<ServerConfigView>> {
    let mut config = require_initialized(&state)?;

    if let Some(port) = req.listen_port {
        if port == 0 {
            return Err(ApiError::Validation("Listen port must be 1-65535".to_string()));
        }
        config.listen_port = port;
    }
    if let Some(dns) = req.dns {
        config.dns = dns;
    }

    let config = state.store.set_server_config(config)?;
    write_interface_config(&state, &config)?;
    Ok(Json(config.into()))
}

/// `POST /server/start`
pub async fn start(State(state): State<ApiState>) -> ApiResult<Json<serde_json::Value>> {
    require_initialized(&state)?;
    state.wireguard.start().await?;
    Ok(Json(json!({"status": "started"})))
}

/// `POST /server/stop`
pub async fn stop(State(state): State<ApiState>) -> ApiResult<Json<serde_json::Value>> {
    state.wireguard.stop().await?;
    Ok(Json(json!({"status": "stopped"})))
}

/// `POST /server/restart`
pub async fn restart(State(state): State<ApiState>) -> ApiResult<Json<serde_json::Value>> {
    require_initialized(&state)?;
    state.wireguard.restart().await?;
    Ok(Json(json!({"status": "restarted"})))
}

/// `GET /server/logs?limit=N`
pub async fn logs(
    State(state): State<ApiState>,
    Query(query): Query<LogsQuery>,
) -> Json<Vec<ConnectionLogEntry>> {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT);
    Json(state.store.recent_connections(limit))
}

/// Rewrites the interface file from the store's current view.
///
/// Used by the binary at startup so best-effort config mutations that
/// failed mid-flight converge with the persisted rows.
pub fn reconcile_interface_config(state: &ApiState) -> ApiResult<bool> {
    match state.store.get_server_config() {
        Some(server) => {
            write_interface_config(state, &server)?;
            Ok(true)
        }
        None => Ok(false),
    }
}
