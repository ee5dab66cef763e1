//! Authentication primitives for the Warden admin API.
//!
//! Two halves: memory-hard password hashing (Argon2id with per-user
//! salts) and stateless signed bearer tokens (HMAC-SHA256). Tokens are
//! self-describing; logout is a client-side affordance and revocation
//! would require a denylist layered on top.

pub mod error;
pub mod password;
pub mod token;

pub use error::{AuthError, Result};
pub use password::{hash_password, verify_password};
pub use token::{generate_secret, TokenClaims, TokenManager, TOKEN_ISSUER};
