//! Argon2id password hashing.
//!
//! Hashes carry their own salt and parameters in PHC string format, so
//! two hashes of the same password never match and verification needs
//! no external state.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

use crate::error::{AuthError, Result};

/// Hashes a password with Argon2id and a fresh random salt.
///
/// # Errors
///
/// Returns [`AuthError::HashError`] if hashing fails.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::HashError {
            reason: e.to_string(),
        })
}

/// Verifies a password against a stored PHC hash string.
///
/// The underlying comparison is constant-time. Unparseable hashes
/// verify as `false` rather than erroring, so a corrupt row cannot be
/// distinguished from a wrong password by a caller.
#[must_use]
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("correct horse battery staple").expect("should hash");
        assert!(verify_password("correct horse battery staple", &hash));
    }

    #[test]
    fn wrong_password_fails() {
        let hash = hash_password("password-one").expect("should hash");
        assert!(!verify_password("password-two", &hash));
    }

    #[test]
    fn same_password_hashes_differently() {
        let a = hash_password("repeated").expect("should hash");
        let b = hash_password("repeated").expect("should hash");
        // Per-hash random salt.
        assert_ne!(a, b);
        assert!(verify_password("repeated", &a));
        assert!(verify_password("repeated", &b));
    }

    #[test]
    fn hash_is_phc_argon2id() {
        let hash = hash_password("whatever").expect("should hash");
        assert!(hash.starts_with("$argon2id$"));
    }

    #[test]
    fn garbage_hash_verifies_false() {
        assert!(!verify_password("anything", "not-a-phc-string"));
        assert!(!verify_password("anything", ""));
    }

    #[test]
    fn empty_password_roundtrips() {
        let hash = hash_password("").expect("should hash");
        assert!(verify_password("", &hash));
        assert!(!verify_password("x", &hash));
    }
}
