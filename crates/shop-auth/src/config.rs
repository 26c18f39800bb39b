//! # Auth Configuration
//!
//! Token signing configuration. All values come from the environment and
//! none of them has a default.

use std::env;
use std::time::Duration;

use crate::error::AuthError;

/// Token signing configuration
#[derive(Clone)]
pub struct AuthConfig {
    /// Signing secret (base64 or raw text)
    pub secret: String,

    /// Access token lifetime
    pub access_ttl: Duration,

    /// Refresh token lifetime
    pub refresh_ttl: Duration,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

impl AuthConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `AUTH_JWT_SECRET`
    /// - `AUTH_ACCESS_TTL_SECS`
    /// - `AUTH_REFRESH_TTL_SECS`
    pub fn from_env() -> Result<Self, AuthError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let secret = env::var("AUTH_JWT_SECRET")
            .map_err(|_| AuthError::Configuration("AUTH_JWT_SECRET not set".to_string()))?;
        let access_ttl = ttl_from_env("AUTH_ACCESS_TTL_SECS")?;
        let refresh_ttl = ttl_from_env("AUTH_REFRESH_TTL_SECS")?;

        Ok(Self::new(secret, access_ttl, refresh_ttl))
    }

    /// Create config with explicit values
    pub fn new(secret: impl Into<String>, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            access_ttl,
            refresh_ttl,
        }
    }
}

fn ttl_from_env(name: &str) -> Result<Duration, AuthError> {
    let raw = env::var(name).map_err(|_| AuthError::Configuration(format!("{name} not set")))?;
    parse_ttl(name, &raw)
}

/// Longest accepted token lifetime (ten years)
pub const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Parse a positive number of seconds, at most [`MAX_TTL_SECS`]
fn parse_ttl(name: &str, raw: &str) -> Result<Duration, AuthError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 && secs <= MAX_TTL_SECS => Ok(Duration::from_secs(secs)),
        _ => Err(AuthError::Configuration(format!(
            "{name} must be between 1 and {MAX_TTL_SECS} seconds"
        ))),
    }
}
