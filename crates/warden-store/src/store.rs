//! The store itself: in-memory tables with JSON snapshots.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::entities::{
    ConnectionAction, ConnectionLogEntry, NewPeer, Peer, PeerUpdate, ServerConfig, User, UserRole,
};
use crate::error::{Result, StoreError};

/// Everything that goes into the snapshot file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    peers: HashMap<String, Peer>,
    users: HashMap<String, User>,
    server: Option<ServerConfig>,
    connection_log: Vec<ConnectionLogEntry>,
}

/// Typed store for peers, users, server config, and the audit log.
///
/// All tables sit behind one lock; every mutation snapshots to
/// `<dir>/state.json` when a directory was given. Uniqueness
/// constraints are checked before insert, so callers can rely on a
/// conflict error arriving before any other side effect.
#[derive(Debug)]
pub struct Store {
    data: RwLock<StoreData>,
    path: Option<PathBuf>,
    failed_logins: AtomicU64,
}

impl Store {
    /// Opens a store rooted at `state_dir`, loading any existing
    /// snapshot. A corrupt snapshot is logged and replaced rather than
    /// refusing to start.
    ///
    /// # Errors
    ///
    /// Fails when the state directory cannot be created.
    pub fn open(state_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_dir)?;
        let path = state_dir.join("state.json");

        let data = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "corrupt state file, starting fresh");
                StoreData::default()
            }),
            Err(_) => {
                debug!(path = %path.display(), "no state file, starting fresh");
                StoreData::default()
            }
        };

        Ok(Self {
            data: RwLock::new(data),
            path: Some(path),
            failed_logins: AtomicU64::new(0),
        })
    }

    /// Creates a store that never touches disk. For tests.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            data: RwLock::new(StoreData::default()),
            path: None,
            failed_logins: AtomicU64::new(0),
        }
    }

    /// Writes the snapshot; called with the write lock held.
    fn snapshot(&self, data: &StoreData) -> Result<()> {
        if let Some(ref path) = self.path {
            let text = serde_json::to_string_pretty(data)?;
            std::fs::write(path, text)?;
        }
        Ok(())
    }

    // ============ Peers ============

    /// Creates a peer row.
    ///
    /// # Errors
    ///
    /// Returns a conflict error when the name, public key, or address
    /// is already taken.
    pub fn create_peer(&self, new: NewPeer) -> Result<Peer> {
        let mut data = self.data.write();

        if data.peers.values().any(|p| p.name == new.name) {
            return Err(StoreError::DuplicatePeerName);
        }
        if data.peers.values().any(|p| p.public_key == new.public_key) {
            return Err(StoreError::DuplicatePublicKey);
        }
        if data.peers.values().any(|p| p.address == new.address) {
            return Err(StoreError::DuplicateAddress);
        }

        let now = Utc::now();
        let peer = Peer {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            private_key: new.private_key,
            public_key: new.public_key,
            address: new.address,
            enabled: true,
            bytes_received: 0,
            bytes_sent: 0,
            last_handshake: None,
            created_at: now,
            updated_at: now,
        };

        data.peers.insert(peer.id.clone(), peer.clone());
        self.snapshot(&data)?;
        debug!(peer = %peer.id, name = %peer.name, "peer created");
        Ok(peer)
    }

    /// Fetches a peer by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown ids.
    pub fn get_peer(&self, id: &str) -> Result<Peer> {
        self.data
            .read()
            .peers
            .get(id)
            .cloned()
            .ok_or(StoreError::NotFound { entity: "peer" })
    }

    /// Fetches a peer by public key.
    #[must_use]
    pub fn get_peer_by_public_key(&self, public_key: &str) -> Option<Peer> {
        self.data
            .read()
            .peers
            .values()
            .find(|p| p.public_key == public_key)
            .cloned()
    }

    /// Returns all peers, sorted by creation time.
    #[must_use]
    pub fn list_peers(&self) -> Vec<Peer> {
        let mut peers: Vec<Peer> = self.data.read().peers.values().cloned().collect();
        peers.sort_by_key(|p| p.created_at);
        peers
    }

    /// Number of peers.
    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.data.read().peers.len()
    }

    /// Applies a partial update to a peer.
    ///
    /// # Errors
    ///
    /// Fails on unknown id or a rename colliding with another peer.
    pub fn update_peer(&self, id: &str, update: PeerUpdate) -> Result<Peer> {
        let mut data = self.data.write();

        if let Some(ref name) = update.name {
            if data.peers.values().any(|p| p.id != id && &p.name == name) {
                return Err(StoreError::DuplicatePeerName);
            }
        }

        let peer = data
            .peers
            .get_mut(id)
            .ok_or(StoreError::NotFound { entity: "peer" })?;

        if let Some(name) = update.name {
            peer.name = name;
        }
        if let Some(enabled) = update.enabled {
            peer.enabled = enabled;
        }
        peer.updated_at = Utc::now();

        let updated = peer.clone();
        self.snapshot(&data)?;
        Ok(updated)
    }

    /// Overwrites a peer's runtime statistics.
    ///
    /// Used by the runtime reconciliation that copies `wg show`
    /// counters back onto rows.
    ///
    /// # Errors
    ///
    /// Fails on unknown id.
    pub fn update_peer_stats(
        &self,
        id: &str,
        bytes_received: u64,
        bytes_sent: u64,
        last_handshake: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut data = self.data.write();
        let peer = data
            .peers
            .get_mut(id)
            .ok_or(StoreError::NotFound { entity: "peer" })?;
        peer.bytes_received = bytes_received;
        peer.bytes_sent = bytes_sent;
        peer.last_handshake = last_handshake;
        peer.updated_at = Utc::now();
        self.snapshot(&data)?;
        Ok(())
    }

    /// Deletes a peer and returns the removed row.
    ///
    /// # Errors
    ///
    /// Fails on unknown id.
    pub fn delete_peer(&self, id: &str) -> Result<Peer> {
        let mut data = self.data.write();
        let peer = data
            .peers
            .remove(id)
            .ok_or(StoreError::NotFound { entity: "peer" })?;
        self.snapshot(&data)?;
        debug!(peer = %peer.id, "peer deleted");
        Ok(peer)
    }

    // ============ Server config ============

    /// Returns the singleton server config, when initialised.
    #[must_use]
    pub fn get_server_config(&self) -> Option<ServerConfig> {
        self.data.read().server.clone()
    }

    /// Replaces the server config, maintaining timestamps.
    ///
    /// # Errors
    ///
    /// Fails only on snapshot IO.
    pub fn set_server_config(&self, mut config: ServerConfig) -> Result<ServerConfig> {
        let mut data = self.data.write();
        let now = Utc::now();
        if let Some(ref existing) = data.server {
            config.created_at = existing.created_at;
        } else {
            config.created_at = now;
        }
        config.updated_at = now;
        data.server = Some(config.clone());
        self.snapshot(&data)?;
        Ok(config)
    }

    // ============ Users ============

    /// Creates a user, hashing the password before insertion.
    ///
    /// # Errors
    ///
    /// Returns a conflict error for duplicate usernames or emails.
    pub fn create_user_with_credentials(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User> {
        let password_hash = warden_auth::hash_password(password)?;
        let mut data = self.data.write();

        if data.users.values().any(|u| u.username == username) {
            return Err(StoreError::DuplicateUsername);
        }
        if data.users.values().any(|u| u.email == email) {
            return Err(StoreError::DuplicateEmail);
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            role: UserRole::default(),
            active: true,
            last_login: None,
            created_at: now,
            updated_at: now,
        };

        data.users.insert(user.id.clone(), user.clone());
        self.snapshot(&data)?;
        debug!(user = %user.id, username = %user.username, "user created");
        Ok(user)
    }

    /// Verifies credentials and stamps the last login.
    ///
    /// Unknown users and wrong passwords produce the same error so the
    /// response does not leak which half failed; both bump the
    /// failed-login counter the monitor samples.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidCredentials`] or [`StoreError::UserInactive`].
    pub fn authenticate_user(&self, username: &str, password: &str) -> Result<User> {
        let user = match self.get_user_by_username(username) {
            Some(user) => user,
            None => {
                self.failed_logins.fetch_add(1, Ordering::Relaxed);
                return Err(StoreError::InvalidCredentials);
            }
        };

        if !user.active {
            return Err(StoreError::UserInactive);
        }

        if !warden_auth::verify_password(password, &user.password_hash) {
            self.failed_logins.fetch_add(1, Ordering::Relaxed);
            return Err(StoreError::InvalidCredentials);
        }

        let mut data = self.data.write();
        let now = Utc::now();
        if let Some(stored) = data.users.get_mut(&user.id) {
            stored.last_login = Some(now);
            stored.updated_at = now;
        }
        let authenticated = data
            .users
            .get(&user.id)
            .cloned()
            .ok_or(StoreError::NotFound { entity: "user" })?;
        self.snapshot(&data)?;
        Ok(authenticated)
    }

    /// Fetches a user by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown ids.
    pub fn get_user(&self, id: &str) -> Result<User> {
        self.data
            .read()
            .users
            .get(id)
            .cloned()
            .ok_or(StoreError::NotFound { entity: "user" })
    }

    /// Fetches a user by username.
    #[must_use]
    pub fn get_user_by_username(&self, username: &str) -> Option<User> {
        self.data
            .read()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned()
    }

    /// Returns all users, sorted by creation time.
    #[must_use]
    pub fn list_users(&self) -> Vec<User> {
        let mut users: Vec<User> = self.data.read().users.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        users
    }

    /// Deletes a user and returns the removed row.
    ///
    /// # Errors
    ///
    /// Fails on unknown id.
    pub fn delete_user(&self, id: &str) -> Result<User> {
        let mut data = self.data.write();
        let user = data
            .users
            .remove(id)
            .ok_or(StoreError::NotFound { entity: "user" })?;
        self.snapshot(&data)?;
        debug!(user = %user.id, "user deleted");
        Ok(user)
    }

    /// Updates a user's email.
    ///
    /// # Errors
    ///
    /// Fails on unknown id or a colliding email.
    pub fn update_user_email(&self, id: &str, email: &str) -> Result<User> {
        let mut data = self.data.write();

        if data.users.values().any(|u| u.id != id && u.email == email) {
            return Err(StoreError::DuplicateEmail);
        }

        let user = data
            .users
            .get_mut(id)
            .ok_or(StoreError::NotFound { entity: "user" })?;
        user.email = email.to_string();
        user.updated_at = Utc::now();

        let updated = user.clone();
        self.snapshot(&data)?;
        Ok(updated)
    }

    /// Replaces a user's password hash.
    ///
    /// # Errors
    ///
    /// Fails on unknown id.
    pub fn update_user_password(&self, id: &str, password: &str) -> Result<()> {
        let password_hash = warden_auth::hash_password(password)?;
        let mut data = self.data.write();
        let user = data
            .users
            .get_mut(id)
            .ok_or(StoreError::NotFound { entity: "user" })?;
        user.password_hash = password_hash;
        user.updated_at = Utc::now();
        self.snapshot(&data)?;
        Ok(())
    }

    /// Failed logins since the process started.
    #[must_use]
    pub fn failed_login_count(&self) -> u64 {
        self.failed_logins.load(Ordering::Relaxed)
    }

    // ============ Connection log ============

    /// Appends an audit log entry; the timestamp is set here.
    ///
    /// # Errors
    ///
    /// Fails only on snapshot IO.
    pub fn log_connection(
        &self,
        peer_id: &str,
        action: ConnectionAction,
        remote_addr: &str,
    ) -> Result<ConnectionLogEntry> {
        let entry = ConnectionLogEntry {
            id: Uuid::new_v4().to_string(),
            peer_id: peer_id.to_string(),
            action,
            timestamp: Utc::now(),
            remote_addr: remote_addr.to_string(),
        };

        let mut data = self.data.write();
        data.connection_log.push(entry.clone());
        self.snapshot(&data)?;
        Ok(entry)
    }

    /// Returns the most recent entries, newest first.
    #[must_use]
    pub fn recent_connections(&self, limit: usize) -> Vec<ConnectionLogEntry> {
        let data = self.data.read();
        data.connection_log
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Counts entries with the given action since a point in time.
    #[must_use]
    pub fn count_connections_since(
        &self,
        action: ConnectionAction,
        since: DateTime<Utc>,
    ) -> usize {
        self.data
            .read()
            .connection_log
            .iter()
            .filter(|e| e.action == action && e.timestamp >= since)
            .count()
    }

    /// Returns every allocated peer address; used to seed the pool on
    /// startup.
    #[must_use]
    pub fn peer_addresses(&self) -> Vec<Ipv4Addr> {
        self.data.read().peers.values().map(|p| p.address).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_peer(name: &str, key_seed: u8, last_octet: u8) -> NewPeer {
        NewPeer {
            name: name.to_string(),
            private_key: format!("priv-{key_seed}"),
            public_key: format!("pub-{key_seed}"),
            address: Ipv4Addr::new(10, 8, 0, last_octet),
        }
    }

    mod peer_tests {
        use super::*;

        #[test]
        fn create_and_get() {
            let store = Store::in_memory();
            let peer = store.create_peer(new_peer("laptop", 1, 2)).expect("create");

            let fetched = store.get_peer(&peer.id).expect("get");
            assert_eq!(fetched.name, "laptop");
            assert!(fetched.enabled);
            assert_eq!(fetched.bytes_received, 0);
            assert!(fetched.last_handshake.is_none());
        }

        #[test]
        fn duplicate_name_conflicts() {
            let store = Store::in_memory();
            store.create_peer(new_peer("laptop", 1, 2)).expect("create");
            let result = store.create_peer(new_peer("laptop", 2, 3));
            assert!(matches!(result, Err(StoreError::DuplicatePeerName)));
        }

        #[test]
        fn duplicate_public_key_conflicts() {
            let store = Store::in_memory();
            store.create_peer(new_peer("a", 1, 2)).expect("create");
            let result = store.create_peer(new_peer("b", 1, 3));
            assert!(matches!(result, Err(StoreError::DuplicatePublicKey)));
        }

        #[test]
        fn duplicate_address_conflicts() {
            let store = Store::in_memory();
            store.create_peer(new_peer("a", 1, 2)).expect("create");
            let result = store.create_peer(new_peer("b", 2, 2));
            assert!(matches!(result, Err(StoreError::DuplicateAddress)));
        }

        #[test]
        fn unknown_peer_not_found() {
            let store = Store::in_memory();
            assert!(matches!(
                store.get_peer("nope"),
                Err(StoreError::NotFound { entity: "peer" })
            ));
        }

        #[test]
        fn update_renames_and_disables() {
            let store = Store::in_memory();
            let peer = store.create_peer(new_peer("old", 1, 2)).expect("create");

            let updated = store
                .update_peer(
                    &peer.id,
                    PeerUpdate {
                        name: Some("new".to_string()),
                        enabled: Some(false),
                    },
                )
                .expect("update");

            assert_eq!(updated.name, "new");
            assert!(!updated.enabled);
            assert!(updated.updated_at >= peer.updated_at);
        }

        #[test]
        fn rename_collision_conflicts() {
            let store = Store::in_memory();
            store.create_peer(new_peer("a", 1, 2)).expect("create");
            let b = store.create_peer(new_peer("b", 2, 3)).expect("create");

            let result = store.update_peer(
                &b.id,
                PeerUpdate {
                    name: Some("a".to_string()),
                    enabled: None,
                },
            );
            assert!(matches!(result, Err(StoreError::DuplicatePeerName)));
        }

        #[test]
        fn delete_frees_the_name() {
            let store = Store::in_memory();
            let peer = store.create_peer(new_peer("laptop", 1, 2)).expect("create");
            store.delete_peer(&peer.id).expect("delete");
            assert_eq!(store.peer_count(), 0);
            // Name and address are reusable afterwards.
            store.create_peer(new_peer("laptop", 2, 2)).expect("create");
        }

        #[test]
        fn stats_update_sets_handshake() {
            let store = Store::in_memory();
            let peer = store.create_peer(new_peer("laptop", 1, 2)).expect("create");

            let now = Utc::now();
            store
                .update_peer_stats(&peer.id, 100, 200, Some(now))
                .expect("update stats");

            let fetched = store.get_peer(&peer.id).expect("get");
            assert_eq!(fetched.bytes_received, 100);
            assert_eq!(fetched.bytes_sent, 200);
            assert_eq!(fetched.last_handshake, Some(now));
        }

        #[test]
        fn list_is_creation_ordered() {
            let store = Store::in_memory();
            store.create_peer(new_peer("first", 1, 2)).expect("create");
            store.create_peer(new_peer("second", 2, 3)).expect("create");

            let names: Vec<String> =
                store.list_peers().into_iter().map(|p| p.name).collect();
            assert_eq!(names, vec!["first", "second"]);
        }
    }

    mod user_tests {
        use super::*;

        #[test]
        fn create_hashes_password() {
            let store = Store::in_memory();
            let user = store
                .create_user_with_credentials("alice", "alice@example.com", "pw12345678")
                .expect("create");

            assert_ne!(user.password_hash, "pw12345678");
            assert!(user.password_hash.starts_with("$argon2id$"));
            assert!(user.active);
            assert_eq!(user.role, UserRole::User);
        }

        #[test]
        fn duplicate_username_conflicts() {
            let store = Store::in_memory();
            store
                .create_user_with_credentials("alice", "a@example.com", "pw12345678")
                .expect("create");
            let result =
                store.create_user_with_credentials("alice", "b@example.com", "pw12345678");
            assert!(matches!(result, Err(StoreError::DuplicateUsername)));
        }

        #[test]
        fn duplicate_email_conflicts() {
            let store = Store::in_memory();
            store
                .create_user_with_credentials("alice", "a@example.com", "pw12345678")
                .expect("create");
            let result = store.create_user_with_credentials("bob", "a@example.com", "pw12345678");
            assert!(matches!(result, Err(StoreError::DuplicateEmail)));
        }

        #[test]
        fn authenticate_stamps_last_login() {
            let store = Store::in_memory();
            store
                .create_user_with_credentials("alice", "a@example.com", "pw12345678")
                .expect("create");

            let user = store
                .authenticate_user("alice", "pw12345678")
                .expect("should authenticate");
            assert!(user.last_login.is_some());
        }

        #[test]
        fn wrong_password_is_invalid_credentials() {
            let store = Store::in_memory();
            store
                .create_user_with_credentials("alice", "a@example.com", "pw12345678")
                .expect("create");

            let result = store.authenticate_user("alice", "wrong");
            assert!(matches!(result, Err(StoreError::InvalidCredentials)));
            assert_eq!(store.failed_login_count(), 1);
        }

        #[test]
        fn unknown_user_is_invalid_credentials() {
            let store = Store::in_memory();
            let result = store.authenticate_user("ghost", "whatever");
            assert!(matches!(result, Err(StoreError::InvalidCredentials)));
            assert_eq!(store.failed_login_count(), 1);
        }

        #[test]
        fn inactive_user_cannot_log_in() {
            let store = Store::in_memory();
            let user = store
                .create_user_with_credentials("alice", "a@example.com", "pw12345678")
                .expect("create");

            {
                let mut data = store.data.write();
                data.users.get_mut(&user.id).unwrap().active = false;
            }

            let result = store.authenticate_user("alice", "pw12345678");
            assert!(matches!(result, Err(StoreError::UserInactive)));
        }

        #[test]
        fn password_change_invalidates_old() {
            let store = Store::in_memory();
            let user = store
                .create_user_with_credentials("alice", "a@example.com", "old-password")
                .expect("create");

            store
                .update_user_password(&user.id, "new-password")
                .expect("update");

            assert!(store.authenticate_user("alice", "old-password").is_err());
            assert!(store.authenticate_user("alice", "new-password").is_ok());
        }

        #[test]
        fn list_users_is_creation_ordered() {
            let store = Store::in_memory();
            store
                .create_user_with_credentials("alice", "a@example.com", "pw12345678")
                .expect("create");
            store
                .create_user_with_credentials("bob", "b@example.com", "pw12345678")
                .expect("create");

            let names: Vec<String> =
                store.list_users().into_iter().map(|u| u.username).collect();
            assert_eq!(names, vec!["alice", "bob"]);
        }

        #[test]
        fn delete_user_frees_the_username() {
            let store = Store::in_memory();
            let user = store
                .create_user_with_credentials("alice", "a@example.com", "pw12345678")
                .expect("create");

            store.delete_user(&user.id).expect("delete");
            assert!(store.get_user(&user.id).is_err());
            store
                .create_user_with_credentials("alice", "a2@example.com", "pw12345678")
                .expect("name is reusable");
        }

        #[test]
        fn delete_unknown_user_fails() {
            let store = Store::in_memory();
            assert!(matches!(
                store.delete_user("nope"),
                Err(StoreError::NotFound { entity: "user" })
            ));
        }

        #[test]
        fn email_update_checks_collisions() {
            let store = Store::in_memory();
            store
                .create_user_with_credentials("alice", "a@example.com", "pw12345678")
                .expect("create");
            let bob = store
                .create_user_with_credentials("bob", "b@example.com", "pw12345678")
                .expect("create");

            let result = store.update_user_email(&bob.id, "a@example.com");
            assert!(matches!(result, Err(StoreError::DuplicateEmail)));

            let updated = store
                .update_user_email(&bob.id, "bob@new.example.com")
                .expect("update");
            assert_eq!(updated.email, "bob@new.example.com");
        }
    }

    mod server_config_tests {
        use super::*;

        fn config() -> ServerConfig {
            ServerConfig {
                private_key: "priv".to_string(),
                public_key: "pub".to_string(),
                listen_port: 51820,
                network: "10.8.0.0/24".parse().unwrap(),
                interface: "wg0".to_string(),
                dns: "1.1.1.1".to_string(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            }
        }

        #[test]
        fn starts_uninitialized() {
            let store = Store::in_memory();
            assert!(store.get_server_config().is_none());
        }

        #[test]
        fn set_and_get() {
            let store = Store::in_memory();
            store.set_server_config(config()).expect("set");
            let fetched = store.get_server_config().expect("configured");
            assert_eq!(fetched.listen_port, 51820);
        }

        #[test]
        fn update_preserves_created_at() {
            let store = Store::in_memory();
            let first = store.set_server_config(config()).expect("set");

            let mut changed = config();
            changed.listen_port = 51821;
            let second = store.set_server_config(changed).expect("set");

            assert_eq!(second.created_at, first.created_at);
            assert_eq!(second.listen_port, 51821);
        }
    }

    mod connection_log_tests {
        use super::*;
        use chrono::Duration;

        #[test]
        fn append_sets_timestamp() {
            let store = Store::in_memory();
            let before = Utc::now();
            let entry = store
                .log_connection("peer-1", ConnectionAction::Connect, "203.0.113.9:51820")
                .expect("log");
            assert!(entry.timestamp >= before);
        }

        #[test]
        fn recent_is_newest_first() {
            let store = Store::in_memory();
            store
                .log_connection("p1", ConnectionAction::Connect, "a")
                .expect("log");
            store
                .log_connection("p2", ConnectionAction::Disconnect, "b")
                .expect("log");

            let recent = store.recent_connections(10);
            assert_eq!(recent.len(), 2);
            assert_eq!(recent[0].peer_id, "p2");
        }

        #[test]
        fn recent_respects_limit() {
            let store = Store::in_memory();
            for i in 0..5 {
                store
                    .log_connection(&format!("p{i}"), ConnectionAction::Connect, "x")
                    .expect("log");
            }
            assert_eq!(store.recent_connections(3).len(), 3);
        }

        #[test]
        fn count_since_filters_by_action_and_time() {
            let store = Store::in_memory();
            store
                .log_connection("p1", ConnectionAction::Connect, "a")
                .expect("log");
            store
                .log_connection("p1", ConnectionAction::Disconnect, "a")
                .expect("log");

            let hour_ago = Utc::now() - Duration::hours(1);
            assert_eq!(
                store.count_connections_since(ConnectionAction::Connect, hour_ago),
                1
            );
            let future = Utc::now() + Duration::hours(1);
            assert_eq!(
                store.count_connections_since(ConnectionAction::Connect, future),
                0
            );
        }
    }

    mod persistence_tests {
        use super::*;

        #[test]
        fn state_survives_reopen() {
            let dir = tempfile::tempdir().expect("tempdir");

            {
                let store = Store::open(dir.path()).expect("open");
                store.create_peer(new_peer("laptop", 1, 2)).expect("create");
                store
                    .create_user_with_credentials("alice", "a@example.com", "pw12345678")
                    .expect("create");
            }

            let reopened = Store::open(dir.path()).expect("open");
            assert_eq!(reopened.peer_count(), 1);
            assert!(reopened.get_user_by_username("alice").is_some());
        }

        #[test]
        fn corrupt_state_starts_fresh() {
            let dir = tempfile::tempdir().expect("tempdir");
            std::fs::write(dir.path().join("state.json"), "{ this is not json")
                .expect("write");

            let store = Store::open(dir.path()).expect("open");
            assert_eq!(store.peer_count(), 0);
        }

        #[test]
        fn peer_addresses_lists_all() {
            let store = Store::in_memory();
            store.create_peer(new_peer("a", 1, 2)).expect("create");
            store.create_peer(new_peer("b", 2, 3)).expect("create");

            let mut addrs = store.peer_addresses();
            addrs.sort_unstable();
            assert_eq!(
                addrs,
                vec![
                    Ipv4Addr::new(10, 8, 0, 2),
                    Ipv4Addr::new(10, 8, 0, 3),
                ]
            );
        }
    }
}
