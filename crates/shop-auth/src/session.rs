//! # Sessions
//!
//! Account registration, login, refresh rotation and logout. Every issued
//! token is recorded in the registry with its own TTL; logout and rotation
//! revoke by deleting registry entries.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use shop_core::{normalize_email, with_timeout, Role, SharedUsers, StoreError, User, UserStore};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::password::{
    hash_password, reject_unknown_account, validate_email, validate_password, verify_password,
};
use crate::registry::{SharedRegistry, TokenRegistry};
use crate::token::{TokenIssuer, TokenKind};
use crate::Authenticator;

/// Access/refresh token pair returned to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Login, registration and token lifecycle
#[derive(Clone)]
pub struct SessionService {
    users: SharedUsers,
    issuer: TokenIssuer,
    registry: SharedRegistry,
    authenticator: Authenticator,
    timeout: Duration,
}

impl SessionService {
    pub fn new(
        users: SharedUsers,
        issuer: TokenIssuer,
        registry: SharedRegistry,
        timeout: Duration,
    ) -> Self {
        let authenticator = Authenticator::new(issuer.clone(), registry.clone(), timeout);
        Self {
            users,
            issuer,
            registry,
            authenticator,
            timeout,
        }
    }

    /// Register a new account with the given role
    #[instrument(skip(self, password))]
    pub async fn register(&self, email: &str, password: &str, role: Role) -> AuthResult<User> {
        let email = normalize_email(email);
        validate_email(&email)?;
        validate_password(password)?;

        let user = User::new(email, hash_password(password)?, role);
        let user = with_timeout(self.timeout, "user insert", self.users.insert(user))
            .await
            .map_err(|err| match err {
                StoreError::Conflict(_) => AuthError::EmailTaken,
                other => AuthError::Store(other),
            })?;

        info!(user_id = %user.id, role = %user.role, "Registered account");
        Ok(user)
    }

    /// Check credentials and issue a recorded token pair
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<TokenPair> {
        let email = normalize_email(email);
        let Some(user) =
            with_timeout(self.timeout, "user lookup", self.users.find_by_email(&email)).await?
        else {
            return Err(reject_unknown_account(password));
        };

        if let Err(err) = verify_password(password, &user.password_hash) {
            warn!(user_id = %user.id, "Password mismatch");
            return Err(err);
        }

        let pair = self.issue_pair(user.id, user.role).await?;
        info!(user_id = %user.id, "Logged in");
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair, revoking the presented token
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let claims = self
            .authenticator
            .verify(refresh_token, TokenKind::Refresh)
            .await?;

        // Role may have changed since the refresh token was minted
        let user = with_timeout(self.timeout, "user lookup", self.users.find_by_id(claims.sub))
            .await?
            .ok_or(AuthError::Revoked)?;

        self.revoke(TokenKind::Refresh, claims.sub, refresh_token).await?;
        let pair = self.issue_pair(user.id, user.role).await?;
        info!(user_id = %user.id, "Rotated refresh token");
        Ok(pair)
    }

    /// Revoke the current access token and, if it belongs to the same user,
    /// the supplied refresh token
    #[instrument(skip_all)]
    pub async fn logout(&self, access_token: &str, refresh_token: Option<&str>) -> AuthResult<()> {
        let claims = self.authenticator.verify(access_token, TokenKind::Access).await?;
        self.revoke(TokenKind::Access, claims.sub, access_token).await?;

        if let Some(refresh_token) = refresh_token {
            match self.issuer.validate(refresh_token) {
                Ok(refresh) if refresh.sub == claims.sub && refresh.require(TokenKind::Refresh).is_ok() => {
                    self.revoke(TokenKind::Refresh, claims.sub, refresh_token).await?;
                }
                Ok(_) => warn!(user_id = %claims.sub, "Ignoring refresh token of another user or type"),
                Err(err) => warn!(user_id = %claims.sub, kind = err.kind(), "Ignoring invalid refresh token"),
            }
        }

        info!(user_id = %claims.sub, "Logged out");
        Ok(())
    }

    /// Create an admin account unless the email is already registered
    pub async fn ensure_admin(&self, email: &str, password: &str) -> AuthResult<User> {
        let normalized = normalize_email(email);
        if let Some(existing) =
            with_timeout(self.timeout, "user lookup", self.users.find_by_email(&normalized)).await?
        {
            if existing.role != Role::Admin {
                warn!(user_id = %existing.id, "Bootstrap admin email belongs to a non-admin account");
            }
            return Ok(existing);
        }
        self.register(&normalized, password, Role::Admin).await
    }

    async fn issue_pair(&self, user_id: Uuid, role: Role) -> AuthResult<TokenPair> {
        let access = self.issuer.issue(user_id, role, TokenKind::Access)?;
        let refresh = self.issuer.issue(user_id, role, TokenKind::Refresh)?;

        for (kind, issued) in [(TokenKind::Access, &access), (TokenKind::Refresh, &refresh)] {
            with_timeout(
                self.timeout,
                "registry record",
                self.registry.record(kind, user_id, &issued.token, issued.ttl),
            )
            .await?;
        }

        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
        })
    }

    async fn revoke(&self, kind: TokenKind, user_id: Uuid, token: &str) -> AuthResult<()> {
        with_timeout(
            self.timeout,
            "registry revoke",
            self.registry.revoke(kind, user_id, token),
        )
        .await?;
        Ok(())
    }
}
