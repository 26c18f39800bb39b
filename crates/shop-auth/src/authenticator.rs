//! # Request Authenticator
//!
//! Turns a raw bearer token into a [`Principal`]. A token is accepted only if
//! it verifies, is unexpired, is an access token, and is still in the
//! registry. The authenticator never writes to the registry.

use std::time::Duration;

use shop_core::{with_timeout, Principal};
use tracing::debug;

use crate::error::{AuthError, AuthResult};
use crate::registry::{SharedRegistry, TokenRegistry};
use crate::token::{Claims, TokenIssuer, TokenKind};

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Validates bearer tokens against signature, expiry, type and registry
#[derive(Clone)]
pub struct Authenticator {
    issuer: TokenIssuer,
    registry: SharedRegistry,
    timeout: Duration,
}

impl Authenticator {
    pub fn new(issuer: TokenIssuer, registry: SharedRegistry, timeout: Duration) -> Self {
        Self {
            issuer,
            registry,
            timeout,
        }
    }

    /// Authenticate a raw access token
    pub async fn authenticate(&self, token: &str) -> AuthResult<Principal> {
        let claims = self.verify(token, TokenKind::Access).await?;
        Ok(Principal {
            user_id: claims.sub,
            role: claims.role,
        })
    }

    /// Validate a token of `kind` and confirm it is still registered
    pub async fn verify(&self, token: &str, kind: TokenKind) -> AuthResult<Claims> {
        let claims = self.issuer.validate(token)?;
        claims.require(kind)?;

        let allowed = with_timeout(
            self.timeout,
            "registry lookup",
            self.registry.is_allowed(kind, claims.sub, token),
        )
        .await?;

        if !allowed {
            debug!(user_id = %claims.sub, typ = %kind, "Token not in registry");
            return Err(AuthError::Revoked);
        }
        Ok(claims)
    }
}
