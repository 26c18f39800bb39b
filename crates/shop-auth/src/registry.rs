//! # Token Registry
//!
//! Server-side allowlist of live tokens. A token is accepted only while its
//! registry entry exists, so deleting the entry revokes it immediately even
//! though its signature and `exp` are still good.
//!
//! Entries are keyed `auth:{typ}:{userId}:{token}` and expire with the token.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use shop_core::{KeyValueStore, SharedKv, StoreResult};
use tracing::debug;
use uuid::Uuid;

use crate::token::TokenKind;

/// Registry key for a token
pub fn registry_key(kind: TokenKind, user_id: Uuid, token: &str) -> String {
    format!("auth:{}:{}:{}", kind.as_str(), user_id, token)
}

/// Allowlist of live tokens
#[async_trait]
pub trait TokenRegistry: Send + Sync {
    /// Record a freshly issued token for `ttl`
    async fn record(
        &self,
        kind: TokenKind,
        user_id: Uuid,
        token: &str,
        ttl: Duration,
    ) -> StoreResult<()>;

    /// Whether the token is still allowed
    async fn is_allowed(&self, kind: TokenKind, user_id: Uuid, token: &str) -> StoreResult<bool>;

    /// Revoke a token. Revoking an unknown token is not an error.
    async fn revoke(&self, kind: TokenKind, user_id: Uuid, token: &str) -> StoreResult<()>;
}

/// Type alias for a shared registry
pub type SharedRegistry = Arc<dyn TokenRegistry>;

/// [`TokenRegistry`] backed by a [`shop_core::KeyValueStore`]
#[derive(Clone)]
pub struct KvTokenRegistry {
    kv: SharedKv,
}

impl KvTokenRegistry {
    pub fn new(kv: SharedKv) -> Self {
        Self { kv }
    }
}

#[async_trait]
impl TokenRegistry for KvTokenRegistry {
    async fn record(
        &self,
        kind: TokenKind,
        user_id: Uuid,
        token: &str,
        ttl: Duration,
    ) -> StoreResult<()> {
        let key = registry_key(kind, user_id, token);
        self.kv.set_with_ttl(&key, "1".to_string(), ttl).await?;
        debug!(user_id = %user_id, typ = %kind, ttl_secs = ttl.as_secs(), "Recorded token");
        Ok(())
    }

    async fn is_allowed(&self, kind: TokenKind, user_id: Uuid, token: &str) -> StoreResult<bool> {
        self.kv.exists(&registry_key(kind, user_id, token)).await
    }

    async fn revoke(&self, kind: TokenKind, user_id: Uuid, token: &str) -> StoreResult<()> {
        self.kv.delete(&registry_key(kind, user_id, token)).await?;
        debug!(user_id = %user_id, typ = %kind, "Revoked token");
        Ok(())
    }
}
