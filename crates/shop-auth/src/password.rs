//! Password and email rules, and Argon2id hashing.

use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash of a random per-process password, checked when no account matches
static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();

/// Validate password meets requirements.
pub fn validate_password(password: &str) -> AuthResult<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Basic shape check on an already normalised email.
pub fn validate_email(email: &str) -> AuthResult<()> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(AuthError::InvalidEmail("missing @".into()));
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(AuthError::InvalidEmail("malformed address".into()));
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(AuthError::InvalidEmail("domain must contain a dot".into()));
    }
    if email.chars().any(char::is_whitespace) {
        return Err(AuthError::InvalidEmail("contains whitespace".into()));
    }
    Ok(())
}

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
pub fn verify_password(password: &str, hash: &str) -> AuthResult<()> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// Reject a login for an unknown account after the same Argon2 work a real
/// check costs, so response time does not reveal which emails exist.
pub fn reject_unknown_account(password: &str) -> AuthError {
    let dummy = DUMMY_HASH.get_or_init(|| hash_password(&Uuid::new_v4().to_string()).ok());
    if let Some(hash) = dummy {
        let _ = verify_password(password, hash);
    }
    AuthError::InvalidCredentials
}
