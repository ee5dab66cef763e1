//! End-to-end flows through the full router: one operator journey per
//! test, from registration to peer artifacts, driven the way a client
//! would drive the HTTP surface.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use warden_api::{create_router, ApiSettings, ApiState};
use warden_auth::TokenManager;
use warden_firewall::PfDriver;
use warden_monitor::{Monitor, MonitorConfig};
use warden_pool::IpPool;
use warden_store::Store;
use warden_wireguard::WgDriver;

struct Harness {
    router: Router,
    state: ApiState,
    _dir: tempfile::TempDir,
}

fn harness_with_store(dir: tempfile::TempDir, store: Arc<Store>) -> Harness {
    let pool = Arc::new(IpPool::new("10.8.0.0/24").expect("valid network"));

    // Mirror the daemon's boot: every persisted peer address is
    // re-marked before the API starts answering.
    for address in store.peer_addresses() {
        pool.allocate_specific(address).expect("address re-mark");
    }

    let wireguard = Arc::new(WgDriver::new(dir.path(), "wg-test"));
    let firewall = Arc::new(PfDriver::new(
        dir.path().join("pf.conf"),
        dir.path().join("anchor.conf"),
    ));
    let monitor = Arc::new(Monitor::new(
        store.clone(),
        wireguard.clone(),
        pool.clone(),
        firewall.clone(),
        MonitorConfig::default(),
    ));
    let tokens = Arc::new(TokenManager::new([42u8; 32]).expect("secret"));

    let state = ApiState::new(
        store,
        pool,
        wireguard,
        firewall,
        monitor,
        tokens,
        ApiSettings {
            endpoint_host: "vpn.example.com".to_string(),
            ..ApiSettings::default()
        },
    );
    Harness {
        router: create_router(state.clone()),
        state,
        _dir: dir,
    }
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    harness_with_store(dir, Arc::new(Store::in_memory()))
}

async fn send(
    harness: &Harness,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };

    let response = harness
        .router
        .clone()
        .oneshot(request)
        .await
        .expect("infallible");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes()
        .to_vec();
    (status, bytes)
}

fn as_json(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).expect("json body")
}

async fn operator_token(harness: &Harness) -> String {
    let (status, body) = send(
        harness,
        Method::POST,
        "/api/v1/auth/register",
        None,
        Some(json!({
            "username": "operator",
            "email": "ops@example.com",
            "password": "pw12345678"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    as_json(&body)["token"]
        .as_str()
        .expect("token")
        .to_string()
}

#[tokio::test]
async fn full_operator_journey() {
    let harness = harness();
    let token = operator_token(&harness).await;

    // Initialize the server.
    let (status, body) = send(
        &harness,
        Method::POST,
        "/api/v1/server/initialize",
        Some(&token),
        Some(json!({"dns": "1.1.1.1, 9.9.9.9"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let server = as_json(&body);
    assert_eq!(server["server_address"], "10.8.0.1");

    // Two peers take the first two client slots.
    let (status, body) = send(
        &harness,
        Method::POST,
        "/api/v1/clients",
        Some(&token),
        Some(json!({"name": "laptop"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let laptop = as_json(&body);
    assert_eq!(laptop["ip_address"], "10.8.0.2");

    let (status, body) = send(
        &harness,
        Method::POST,
        "/api/v1/clients",
        Some(&token),
        Some(json!({"name": "phone"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let phone = as_json(&body);
    assert_eq!(phone["ip_address"], "10.8.0.3");

    // Both stanzas reached the interface file.
    let configured = harness.state.wireguard.get_peers().expect("config");
    assert_eq!(configured.len(), 2);

    // The laptop's client config carries its address, the custom DNS,
    // and the server's endpoint.
    let laptop_id = laptop["id"].as_str().expect("id");
    let (status, body) = send(
        &harness,
        Method::GET,
        &format!("/api/v1/clients/{laptop_id}/config"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).expect("utf8");
    assert!(text.contains("Address = 10.8.0.2/32"));
    assert!(text.contains("DNS = 1.1.1.1, 9.9.9.9"));
    assert!(text.contains("Endpoint = vpn.example.com:51820"));

    // QR artifact for the same config.
    let (status, body) = send(
        &harness,
        Method::GET,
        &format!("/api/v1/clients/{laptop_id}/qr?format=base64&size=128"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(as_json(&body)["data"]
        .as_str()
        .expect("data")
        .starts_with("data:image/png;base64,"));

    // Deleting the laptop frees 10.8.0.2 and removes its stanza.
    let (status, _) = send(
        &harness,
        Method::DELETE,
        &format!("/api/v1/clients/{laptop_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let configured = harness.state.wireguard.get_peers().expect("config");
    assert_eq!(configured.len(), 1);

    let (status, body) = send(
        &harness,
        Method::POST,
        "/api/v1/clients",
        Some(&token),
        Some(json!({"name": "tablet"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(as_json(&body)["ip_address"], "10.8.0.2");

    // Monitoring answers with the current peer count.
    let (status, body) = send(
        &harness,
        Method::GET,
        "/api/v1/monitoring/metrics",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_json(&body)["connections"]["total_peers"], 2);
}

#[tokio::test]
async fn state_survives_restart_with_pool_reseed() {
    // The state directory outlives both "processes".
    let state_holder = tempfile::tempdir().expect("tempdir");
    let state_dir = state_holder.path().join("state");
    let peer_id;

    {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(Store::open(&state_dir).expect("open"));
        let harness = harness_with_store(dir, store);
        let token = operator_token(&harness).await;

        send(
            &harness,
            Method::POST,
            "/api/v1/server/initialize",
            Some(&token),
            Some(json!({})),
        )
        .await;
        let (_, body) = send(
            &harness,
            Method::POST,
            "/api/v1/clients",
            Some(&token),
            Some(json!({"name": "laptop"})),
        )
        .await;
        peer_id = as_json(&body)["id"].as_str().expect("id").to_string();
    }

    // "Restart": fresh harness over the same state directory.
    let dir2 = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(Store::open(&state_dir).expect("reopen"));
    let harness = harness_with_store(dir2, store);

    let (status, body) = send(
        &harness,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({"username": "operator", "password": "pw12345678"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = as_json(&body)["token"].as_str().expect("token").to_string();

    // The persisted peer is still there and its address is still
    // reserved, so the next allocation skips 10.8.0.2.
    let (status, body) = send(
        &harness,
        Method::GET,
        &format!("/api/v1/clients/{peer_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_json(&body)["ip_address"], "10.8.0.2");

    let (status, body) = send(
        &harness,
        Method::POST,
        "/api/v1/clients",
        Some(&token),
        Some(json!({"name": "phone"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(as_json(&body)["ip_address"], "10.8.0.3");
}

#[tokio::test]
async fn exhausted_pool_surfaces_as_conflict() {
    // A /29 leaves five client slots once the server slot is taken.
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(Store::in_memory());
    let pool = Arc::new(IpPool::new("10.9.0.0/29").expect("valid network"));
    let wireguard = Arc::new(WgDriver::new(dir.path(), "wg-test"));
    let firewall = Arc::new(PfDriver::new(
        dir.path().join("pf.conf"),
        dir.path().join("anchor.conf"),
    ));
    let monitor = Arc::new(Monitor::new(
        store.clone(),
        wireguard.clone(),
        pool.clone(),
        firewall.clone(),
        MonitorConfig::default(),
    ));
    let tokens = Arc::new(TokenManager::new([42u8; 32]).expect("secret"));
    let state = ApiState::new(
        store,
        pool,
        wireguard,
        firewall,
        monitor,
        tokens,
        ApiSettings::default(),
    );
    let harness = Harness {
        router: create_router(state.clone()),
        state,
        _dir: dir,
    };

    let token = operator_token(&harness).await;
    send(
        &harness,
        Method::POST,
        "/api/v1/server/initialize",
        Some(&token),
        Some(json!({})),
    )
    .await;

    for i in 0..5 {
        let (status, _) = send(
            &harness,
            Method::POST,
            "/api/v1/clients",
            Some(&token),
            Some(json!({"name": format!("peer-{i}")})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(
        &harness,
        Method::POST,
        "/api/v1/clients",
        Some(&token),
        Some(json!({"name": "one-too-many"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(as_json(&body)["error"], "address pool exhausted");
}

#[tokio::test]
async fn config_artifacts_need_auth() {
    let harness = harness();
    let token = operator_token(&harness).await;
    send(
        &harness,
        Method::POST,
        "/api/v1/server/initialize",
        Some(&token),
        Some(json!({})),
    )
    .await;
    let (_, body) = send(
        &harness,
        Method::POST,
        "/api/v1/clients",
        Some(&token),
        Some(json!({"name": "laptop"})),
    )
    .await;
    let id = as_json(&body)["id"].as_str().expect("id").to_string();

    for uri in [
        format!("/api/v1/clients/{id}/config"),
        format!("/api/v1/clients/{id}/qr?format=base64"),
    ] {
        let (status, _) = send(&harness, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "unauthenticated {uri}");
    }
}
