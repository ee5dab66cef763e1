//! `/clients` handlers: peer CRUD, config artifacts, QR codes.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{info, warn};

use warden_qr::DEFAULT_SIZE;
use warden_store::{NewPeer, Peer, PeerUpdate};
use warden_wireguard::{client_config, render_config, KeyPair, PeerSection, PrivateKey, PublicKey};

use crate::error::{ApiError, ApiResult};
use crate::state::ApiState;
use crate::types::{CreatePeerRequest, PeerView, QrQuery, QrResponse};

/// `GET /clients`
pub async fn list_peers(State(state): State<ApiState>) -> Json<Vec<PeerView>> {
    let peers = state.store.list_peers().into_iter().map(Into::into).collect();
    Json(peers)
}

/// `POST /clients`
///
/// Key generation, allocation, persistence, then a best-effort append
/// to the live WireGuard config. A persistence failure releases the
/// freshly allocated address; a config-append failure is logged and
/// left for the next full rewrite to reconcile.
pub async fn create_peer(
    State(state): State<ApiState>,
    Json(req): Json<CreatePeerRequest>,
) -> ApiResult<(StatusCode, Json<PeerView>)> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("Name is required".to_string()));
    }

    let keys = KeyPair::generate();
    let address = state.pool.allocate()?;

    let peer = match state.store.create_peer(NewPeer {
        name: name.to_string(),
        private_key: keys.private_key().to_base64(),
        public_key: keys.public_key().to_base64(),
        address,
    }) {
        Ok(peer) => peer,
        Err(e) => {
            if let Err(release_err) = state.pool.release(address) {
                warn!(ip = %address, error = %release_err, "rollback release failed");
            }
            return Err(e.into());
        }
    };

    let stanza = PeerSection::for_client(*keys.public_key(), address);
    if let Err(e) = state.wireguard.add_peer(stanza) {
        warn!(peer = %peer.id, error = %e, "could not append peer to live config");
    }

    info!(peer = %peer.id, name = %peer.name, ip = %address, "peer created");
    Ok((StatusCode::CREATED, Json(peer.into())))
}

/// `GET /clients/{id}`
pub async fn get_peer(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PeerView>> {
    Ok(Json(state.store.get_peer(&id)?.into()))
}

/// `PUT /clients/{id}`
pub async fn update_peer(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(update): Json<PeerUpdate>,
) -> ApiResult<Json<PeerView>> {
    if let Some(ref name) = update.name {
        if name.trim().is_empty() {
            return Err(ApiError::Validation("Name is required".to_string()));
        }
    }
    let peer = state.store.update_peer(&id, update)?;
    Ok(Json(peer.into()))
}

/// `DELETE /clients/{id}`
///
/// Removal from the live config and address release are best-effort;
/// only the row delete decides the response.
pub async fn delete_peer(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let peer = state.store.get_peer(&id)?;

    match PublicKey::from_base64(&peer.public_key) {
        Ok(key) => {
            if let Err(e) = state.wireguard.remove_peer(&key) {
                warn!(peer = %id, error = %e, "could not remove peer from live config");
            }
        }
        Err(e) => warn!(peer = %id, error = %e, "stored public key unparsable"),
    }

    if let Err(e) = state.pool.release(peer.address) {
        warn!(peer = %id, ip = %peer.address, error = %e, "address release failed");
    }

    state.store.delete_peer(&id)?;
    info!(peer = %id, "peer deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Renders the client config for a peer.
fn render_peer_config(state: &ApiState, peer: &Peer) -> ApiResult<String> {
    let server = state
        .store
        .get_server_config()
        .ok_or_else(|| ApiError::Validation("Server is not initialized".to_string()))?;

    let private_key = PrivateKey::from_base64(&peer.private_key)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let server_public = PublicKey::from_base64(&server.public_key)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let endpoint = format!("{}:{}", state.settings.endpoint_host, server.listen_port);
    let config = client_config(
        private_key,
        peer.address,
        &server.dns_list(),
        server_public,
        &endpoint,
    );
    Ok(render_config(&config))
}

/// `GET /clients/{id}/config`
///
/// Plain text, ready to drop into a client's `wg0.conf`.
pub async fn get_peer_config(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let peer = state.store.get_peer(&id)?;
    let text = render_peer_config(&state, &peer)?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        text,
    )
        .into_response())
}

/// `GET /clients/{id}/qr?format={base64|png|terminal}&size=N`
///
/// The format is validated before the peer is loaded; a non-positive
/// size silently falls back to the default.
pub async fn get_peer_qr(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Query(query): Query<QrQuery>,
) -> ApiResult<Response> {
    let format = query.format.as_deref().unwrap_or("base64");
    if !matches!(format, "base64" | "png" | "terminal") {
        return Err(ApiError::Validation(format!("Invalid QR format: {format}")));
    }

    let size = match query.size {
        Some(size) if size > 0 => size as u32,
        _ => DEFAULT_SIZE,
    };

    let peer = state.store.get_peer(&id)?;
    let config = render_peer_config(&state, &peer)?;

    match format {
        "png" => {
            let png = warden_qr::wireguard_config_png(&config, size)?;
            let disposition = format!("inline; filename=\"client-{id}-config.png\"");
            Ok((
                [
                    (header::CONTENT_TYPE, "image/png".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                png,
            )
                .into_response())
        }
        "terminal" => {
            let art = warden_qr::wireguard_config_terminal(&config)?;
            Ok(Json(QrResponse {
                data: art,
                format: "terminal".to_string(),
            })
            .into_response())
        }
        _ => {
            let data = warden_qr::wireguard_config_base64(&config, size)?;
            Ok(Json(QrResponse {
                data,
                format: "base64".to_string(),
            })
            .into_response())
        }
    }
}
