//! Typed persistence for the Warden control plane.
//!
//! Entities live in memory behind a single lock and snapshot to a JSON
//! state file on every mutation. Uniqueness (usernames, emails, peer
//! names, public keys, addresses) is enforced here, before any side
//! effect reaches the WireGuard driver.

pub mod entities;
pub mod error;
mod store;

pub use entities::{
    ConnectionAction, ConnectionLogEntry, NewPeer, Peer, PeerUpdate, ServerConfig, User, UserRole,
};
pub use error::{Result, StoreError};
pub use store::Store;
