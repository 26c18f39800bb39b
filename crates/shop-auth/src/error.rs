//! # Authentication Errors
//!
//! Every token failure kind is kept for server-side diagnostics, but callers
//! only ever see "unauthenticated" (see [`AuthError::is_token_failure`]).

use shop_core::StoreError;
use thiserror::Error;

/// Authentication and account error
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token could not be decoded
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// Token signature did not verify
    #[error("Token signature invalid")]
    SignatureInvalid,

    /// Token `exp` has passed
    #[error("Token expired")]
    Expired,

    /// Token `typ` is not the one this operation requires
    #[error("Wrong token type: expected {expected}, got {actual}")]
    WrongType {
        expected: &'static str,
        actual: String,
    },

    /// Token is not (or no longer) in the registry
    #[error("Token revoked or unknown")]
    Revoked,

    /// Email/password did not match an account
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Email failed basic validation
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Password failed strength rules
    #[error("Weak password: {0}")]
    WeakPassword(String),

    /// Email already registered
    #[error("Email already in use")]
    EmailTaken,

    /// Hashing the password failed
    #[error("Password hashing failed")]
    PasswordHash,

    /// Configuration errors (missing secret, invalid TTL)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Registry or user store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    /// True for failures that must be reported as a bare "unauthenticated"
    pub fn is_token_failure(&self) -> bool {
        matches!(
            self,
            AuthError::Malformed(_)
                | AuthError::SignatureInvalid
                | AuthError::Expired
                | AuthError::WrongType { .. }
                | AuthError::Revoked
        )
    }

    /// Short, stable name of the failure kind for logs
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Malformed(_) => "malformed",
            AuthError::SignatureInvalid => "signature_invalid",
            AuthError::Expired => "expired",
            AuthError::WrongType { .. } => "wrong_type",
            AuthError::Revoked => "revoked",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::InvalidEmail(_) => "invalid_email",
            AuthError::WeakPassword(_) => "weak_password",
            AuthError::EmailTaken => "email_taken",
            AuthError::PasswordHash => "password_hash",
            AuthError::Configuration(_) => "configuration",
            AuthError::Store(_) => "store",
        }
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            _ if self.is_token_failure() => 401,
            AuthError::InvalidCredentials => 401,
            AuthError::InvalidEmail(_) | AuthError::WeakPassword(_) => 400,
            AuthError::EmailTaken => 409,
            AuthError::Store(err) => err.status_code(),
            _ => 500,
        }
    }
}

/// Result type alias for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;
