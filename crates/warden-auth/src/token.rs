//! Signed stateless bearer tokens.

use base64::Engine;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};

/// Issuer written into every token.
pub const TOKEN_ISSUER: &str = "vpn-server";

/// Default token lifetime in hours.
const DEFAULT_LIFETIME_HOURS: i64 = 24;

/// Minimum secret length for HMAC-SHA256.
const MIN_SECRET_LEN: usize = 32;

/// Claims carried by a Warden bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// The authenticated user's id.
    pub user_id: String,
    /// The authenticated user's name.
    pub username: String,
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Not-before (Unix timestamp).
    pub nbf: i64,
    /// Expiry (Unix timestamp).
    pub exp: i64,
    /// Issuer; always [`TOKEN_ISSUER`].
    pub iss: String,
    /// Subject; `user-<id>`.
    pub sub: String,
}

impl TokenClaims {
    /// Returns the expiry as a `DateTime`.
    #[must_use]
    pub fn expires_at(&self) -> Option<chrono::DateTime<Utc>> {
        chrono::DateTime::from_timestamp(self.exp, 0)
    }
}

/// Generates a fresh 256-bit signing secret, base64url encoded.
#[must_use]
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Issues and validates HMAC-SHA256 signed tokens.
pub struct TokenManager {
    secret: Vec<u8>,
    lifetime: Duration,
}

impl TokenManager {
    /// Creates a manager over a signing secret.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::WeakSecret`] for secrets shorter than
    /// 32 bytes.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self> {
        let secret = secret.as_ref();
        if secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::WeakSecret);
        }
        Ok(Self {
            secret: secret.to_vec(),
            lifetime: Duration::hours(DEFAULT_LIFETIME_HOURS),
        })
    }

    /// Overrides the token lifetime.
    #[must_use]
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Returns the configured lifetime.
    #[must_use]
    pub const fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Generates a token for a user.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TokenError`] on encoding failure.
    pub fn generate(&self, user_id: &str, username: &str) -> Result<String> {
        let now = Utc::now();
        let claims = TokenClaims {
            user_id: user_id.to_string(),
            username: username.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
            iss: TOKEN_ISSUER.to_string(),
            sub: format!("user-{user_id}"),
        };
        self.encode_claims(&claims)
    }

    /// Validates a token and returns its claims.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TokenExpired`] for expired tokens and
    /// [`AuthError::InvalidToken`] for anything malformed or signed
    /// with a different secret.
    pub fn validate(&self, token: &str) -> Result<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.set_required_spec_claims(&["exp", "iat", "nbf", "sub"]);
        validation.validate_aud = false;
        // Expiry is exact; no clock-skew grace.
        validation.leeway = 0;

        let data = decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(&self.secret),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken {
                reason: e.to_string(),
            },
        })?;

        Ok(data.claims)
    }

    /// Validates a token and reissues it with a fresh expiry.
    ///
    /// # Errors
    ///
    /// Fails when the presented token does not validate.
    pub fn refresh(&self, token: &str) -> Result<String> {
        let claims = self.validate(token)?;
        self.generate(&claims.user_id, &claims.username)
    }

    fn encode_claims(&self, claims: &TokenClaims) -> Result<String> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|e| AuthError::TokenError {
            reason: e.to_string(),
        })
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("secret", &"[REDACTED]")
            .field("lifetime", &self.lifetime)
            .finish()
    }
}
