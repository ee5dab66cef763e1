//! Route table for `/api/v1`.

use std::time::Duration;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{auth, clients, monitoring, server};
use crate::middleware::require_auth;
use crate::state::ApiState;

/// Per-request deadline.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// `GET /api/v1/health` — unauthenticated liveness probe.
async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

/// Builds the full application router.
#[must_use]
pub fn create_router(state: ApiState) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh));

    let protected = Router::new()
        .route(
            "/auth/profile",
            get(auth::get_profile).put(auth::update_profile),
        )
        .route("/auth/change-password", post(auth::change_password))
        .route("/auth/logout", post(auth::logout))
        .route("/server/status", get(server::status))
        .route("/server/start", post(server::start))
        .route("/server/stop", post(server::stop))
        .route("/server/restart", post(server::restart))
        .route(
            "/server/config",
            get(server::get_config).put(server::update_config),
        )
        .route("/server/initialize", post(server::initialize))
        .route("/server/logs", get(server::logs))
        .route(
            "/clients",
            get(clients::list_peers).post(clients::create_peer),
        )
        .route(
            "/clients/{id}",
            get(clients::get_peer)
                .put(clients::update_peer)
                .delete(clients::delete_peer),
        )
        .route("/clients/{id}/config", get(clients::get_peer_config))
        .route("/clients/{id}/qr", get(clients::get_peer_qr))
        .route("/monitoring/metrics", get(monitoring::metrics))
        .route("/monitoring/alerts", get(monitoring::alerts))
        .route(
            "/monitoring/alerts/{id}/resolve",
            post(monitoring::resolve_alert),
        )
        .route(
            "/monitoring/alerts/{id}/suppress",
            post(monitoring::suppress_alert),
        )
        .route("/monitoring/logs", get(monitoring::logs))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api/v1", public.merge(protected))
        .with_state(state)
        .layer(cors)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
}
