//! Request and response bodies.
//!
//! Response types are separate from the persisted entities so nothing
//! sensitive (password hashes, peer private keys) can leak by accident.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_store::{Peer, ServerConfig, User, UserRole};

// ============ Auth ============

/// `POST /auth/register` body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// Desired login name.
    pub username: String,
    /// Contact email.
    pub email: String,
    /// Plaintext password; hashed before it reaches the store.
    pub password: String,
}

/// `POST /auth/login` body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Login name.
    pub username: String,
    /// Plaintext password.
    pub password: String,
}

/// `POST /auth/refresh` body.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    /// The still-valid token to reissue.
    pub token: String,
}

/// `PUT /auth/profile` body.
#[derive(Debug, Deserialize)]
pub struct ProfileUpdateRequest {
    /// New email address.
    pub email: String,
}

/// `POST /auth/change-password` body.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    /// The current password, verified before any change.
    pub current_password: String,
    /// The replacement password.
    pub new_password: String,
}

/// A user as the API presents it. Never includes the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    /// Opaque id.
    pub id: String,
    /// Login name.
    pub username: String,
    /// Email.
    pub email: String,
    /// Role.
    pub role: UserRole,
    /// Whether the account can log in.
    pub active: bool,
    /// Most recent login.
    pub last_login: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            active: user.active,
            last_login: user.last_login,
            created_at: user.created_at,
        }
    }
}

/// Login/register/refresh response.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    /// The bearer token.
    pub token: String,
    /// When the token stops working.
    pub expires_at: Option<DateTime<Utc>>,
    /// The authenticated user.
    pub user: UserView,
}

// ============ Peers ============

/// `POST /clients` body.
#[derive(Debug, Deserialize)]
pub struct CreatePeerRequest {
    /// Human-readable peer name.
    pub name: String,
}

/// A peer as the API presents it. The private key stays server-side;
/// it only ever leaves inside a rendered client config.
#[derive(Debug, Clone, Serialize)]
pub struct PeerView {
    /// Opaque id.
    pub id: String,
    /// Name.
    pub name: String,
    /// Public key, base64.
    pub public_key: String,
    /// Assigned VPN address.
    pub ip_address: String,
    /// Whether the peer is routed.
    pub enabled: bool,
    /// Received bytes.
    pub bytes_received: u64,
    /// Sent bytes.
    pub bytes_sent: u64,
    /// Most recent handshake.
    pub last_handshake: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl From<Peer> for PeerView {
    fn from(peer: Peer) -> Self {
        Self {
            id: peer.id,
            name: peer.name,
            public_key: peer.public_key,
            ip_address: peer.address.to_string(),
            enabled: peer.enabled,
            bytes_received: peer.bytes_received,
            bytes_sent: peer.bytes_sent,
            last_handshake: peer.last_handshake,
            created_at: peer.created_at,
        }
    }
}

/// `GET /clients/{id}/qr` query string.
#[derive(Debug, Deserialize)]
pub struct QrQuery {
    /// `base64`, `png`, or `terminal`.
    pub format: Option<String>,
    /// Requested pixel size; non-positive values fall back to the
    /// default.
    pub size: Option<i64>,
}

/// JSON shape of the non-PNG QR formats.
#[derive(Debug, Serialize)]
pub struct QrResponse {
    /// The encoded payload.
    pub data: String,
    /// Which format `data` is in.
    pub format: String,
}

// ============ Server ============

/// `POST /server/initialize` body. Everything optional; defaults come
/// from the deployment configuration.
#[derive(Debug, Default, Deserialize)]
pub struct InitializeRequest {
    /// UDP listen port.
    pub listen_port: Option<u16>,
    /// DNS servers, comma-joined.
    pub dns: Option<String>,
}

/// `PUT /server/config` body.
#[derive(Debug, Deserialize)]
pub struct ServerConfigUpdateRequest {
    /// New UDP listen port.
    pub listen_port: Option<u16>,
    /// New DNS list, comma-joined.
    pub dns: Option<String>,
}

/// Server config as the API presents it. The private key never leaves.
#[derive(Debug, Clone, Serialize)]
pub struct ServerConfigView {
    /// Server public key, base64.
    pub public_key: String,
    /// UDP listen port.
    pub listen_port: u16,
    /// The VPN network in CIDR notation.
    pub network: String,
    /// The server's own address.
    pub server_address: String,
    /// Interface name.
    pub interface: String,
    /// DNS servers, comma-joined.
    pub dns: String,
}

impl From<ServerConfig> for ServerConfigView {
    fn from(config: ServerConfig) -> Self {
        Self {
            public_key: config.public_key.clone(),
            listen_port: config.listen_port,
            network: config.network.to_string(),
            server_address: config.server_address().to_string(),
            interface: config.interface.clone(),
            dns: config.dns,
        }
    }
}

/// `GET /server/logs` and `GET /monitoring/logs` query string.
#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    /// Maximum entries to return.
    pub limit: Option<usize>,
}

/// `GET /monitoring/alerts` query string.
#[derive(Debug, Deserialize)]
pub struct AlertsQuery {
    /// When set, include resolved and suppressed alerts updated at or
    /// after this time.
    pub since: Option<DateTime<Utc>>,
}

/// `POST /monitoring/alerts/{id}/suppress` body.
#[derive(Debug, Deserialize)]
pub struct SuppressAlertRequest {
    /// How long to hide the alert, in seconds.
    pub duration_secs: u64,
}
