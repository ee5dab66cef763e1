//! Persisted entity types.

use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

/// A VPN peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// Opaque id.
    pub id: String,
    /// Human-readable name, unique.
    pub name: String,
    /// Curve25519 private key, base64.
    pub private_key: String,
    /// Curve25519 public key, base64; uniquely identifies the peer.
    pub public_key: String,
    /// Assigned VPN address, unique within the pool.
    pub address: Ipv4Addr,
    /// Disabled peers stay in the config file but are not routed.
    pub enabled: bool,
    /// Monotonic received-byte counter.
    pub bytes_received: u64,
    /// Monotonic sent-byte counter.
    pub bytes_sent: u64,
    /// Most recent handshake, when one has happened.
    pub last_handshake: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// Inputs for creating a peer.
#[derive(Debug, Clone)]
pub struct NewPeer {
    /// Human-readable name.
    pub name: String,
    /// Curve25519 private key, base64.
    pub private_key: String,
    /// Curve25519 public key, base64.
    pub public_key: String,
    /// Assigned VPN address.
    pub address: Ipv4Addr,
}

/// Mutable peer fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeerUpdate {
    /// New name, when renaming.
    pub name: Option<String>,
    /// New enabled flag.
    pub enabled: Option<bool>,
}

/// The server's own WireGuard configuration. Singleton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server private key, base64.
    pub private_key: String,
    /// Server public key, base64.
    pub public_key: String,
    /// UDP listen port.
    pub listen_port: u16,
    /// The VPN network. The server's address is its first usable host.
    pub network: Ipv4Net,
    /// Interface name, e.g. `wg0`.
    pub interface: String,
    /// Comma-joined DNS servers handed to clients.
    pub dns: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl ServerConfig {
    /// The server's address: the first usable host in the network.
    #[must_use]
    pub fn server_address(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.network.network()) + 1)
    }

    /// DNS entries as a list.
    #[must_use]
    pub fn dns_list(&self) -> Vec<String> {
        self.dns
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect()
    }
}

/// Role of an admin API user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Full access.
    Admin,
    /// Regular operator.
    #[default]
    User,
}

/// An admin API user.
///
/// The password hash lives here for persistence; API response types
/// must never include it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Opaque id.
    pub id: String,
    /// Unique login name.
    pub username: String,
    /// Unique email.
    pub email: String,
    /// Argon2id PHC hash string.
    pub password_hash: String,
    /// Role.
    pub role: UserRole,
    /// Inactive users cannot log in.
    pub active: bool,
    /// Most recent successful login.
    pub last_login: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// Direction of a connection-log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionAction {
    /// Peer connected.
    Connect,
    /// Peer disconnected.
    Disconnect,
}

/// One append-only audit log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionLogEntry {
    /// Opaque id.
    pub id: String,
    /// The peer this event belongs to.
    pub peer_id: String,
    /// Connect or disconnect.
    pub action: ConnectionAction,
    /// When the event was recorded (set at insert).
    pub timestamp: DateTime<Utc>,
    /// Remote address observed for the event.
    pub remote_addr: String,
}
