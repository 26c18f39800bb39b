//! # Key-Value Cache
//!
//! A small TTL key-value abstraction. The token registry and the cart cache
//! both sit on top of it, the way they would sit on top of Redis.
//!
//! [`MemoryKv`] expires entries lazily on read; [`MemoryKv::spawn_janitor`]
//! additionally sweeps expired entries in the background.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::StoreResult;

/// TTL key-value store
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get a live value
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Set a value that expires after `ttl`
    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> StoreResult<()>;

    /// Check whether a live value exists
    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Delete a value. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;
}

/// Type alias for a shared key-value store
pub type SharedKv = Arc<dyn KeyValueStore>;

/// Expiry used when `now + ttl` is not representable
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

fn expiry(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-memory [`KeyValueStore`]
///
/// Cheaply cloneable; all clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every expired entry, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Number of stored entries, expired or not
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawn a background task that purges expired entries every `interval`.
    ///
    /// The task holds a clone of the store; abort the handle to stop it.
    pub fn spawn_janitor(&self, interval: Duration) -> JoinHandle<()> {
        let kv = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = kv.purge_expired();
                if removed > 0 {
                    tracing::debug!(removed, "purged expired cache entries");
                }
            }
        })
    }
}

#[async_trait]
impl KeyValueStore for MemoryKv {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }
        // Expired: drop it unless it was replaced in between
        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|e| e.expires_at <= now) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> StoreResult<()> {
        let entry = Entry {
            value,
            expires_at: expiry(Instant::now(), ttl),
        };
        self.entries.write().insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}
