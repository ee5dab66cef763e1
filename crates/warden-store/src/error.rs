//! Error types for the store.

use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No entity with the given id.
    #[error("{entity} not found")]
    NotFound {
        /// Entity kind, e.g. `peer`.
        entity: &'static str,
    },

    /// A username is already taken.
    #[error("Username already exists")]
    DuplicateUsername,

    /// An email is already registered.
    #[error("Email already exists")]
    DuplicateEmail,

    /// A peer name is already taken.
    #[error("Peer name already exists")]
    DuplicatePeerName,

    /// A public key is already registered.
    #[error("Peer public key already exists")]
    DuplicatePublicKey,

    /// An address is already assigned to another peer.
    #[error("Address already assigned")]
    DuplicateAddress,

    /// Login failed; deliberately does not say which half was wrong.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// The account exists but is disabled.
    #[error("User account is inactive")]
    UserInactive,

    /// Password hashing failed.
    #[error(transparent)]
    Auth(#[from] warden_auth::AuthError),

    /// Snapshot serialization failed.
    #[error("state serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Snapshot IO failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
