//! # Cart
//!
//! The cart is a long-lived, client-writable cache keyed by user. It is
//! stored as a versioned [`CartSnapshot`] encoded to JSON at the cache
//! boundary, and is never the source of truth for prices or stock.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::kv::{KeyValueStore, SharedKv};
use crate::product::Product;
use crate::store::{with_timeout, InventoryStore, SharedInventory};

/// Current snapshot schema version
pub const CART_SNAPSHOT_VERSION: u32 = 1;

/// Default cart lifetime in the cache
pub const DEFAULT_CART_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Largest quantity a single cart line can hold
pub const MAX_LINE_QUANTITY: i64 = u32::MAX as i64;

/// One cart line as cached.
///
/// Both fields are optional because the cache is client-written; consumers
/// skip lines with a missing product or a non-positive quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    #[serde(default)]
    pub product_id: Option<Uuid>,
    #[serde(default)]
    pub quantity: Option<i64>,
}

impl CartLine {
    pub fn new(product_id: Uuid, quantity: i64) -> Self {
        Self {
            product_id: Some(product_id),
            quantity: Some(quantity),
        }
    }

    /// The usable (product, quantity) pair, if this line is well-formed
    pub fn usable(&self) -> Option<(Uuid, u32)> {
        let product_id = self.product_id?;
        let quantity = self.quantity.filter(|q| *q > 0)?;
        Some((product_id, u32::try_from(quantity).unwrap_or(u32::MAX)))
    }
}

/// Versioned copy of a user's cart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub version: u32,
    #[serde(default)]
    pub items: Vec<CartLine>,
}

impl Default for CartSnapshot {
    fn default() -> Self {
        Self {
            version: CART_SNAPSHOT_VERSION,
            items: Vec::new(),
        }
    }
}

impl CartSnapshot {
    pub fn new(items: Vec<CartLine>) -> Self {
        Self {
            version: CART_SNAPSHOT_VERSION,
            items,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Encode for the cache
    pub fn encode(&self) -> StoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from the cache, rejecting unknown schema versions
    pub fn decode(raw: &str) -> StoreResult<Self> {
        let snapshot: CartSnapshot = serde_json::from_str(raw)?;
        if snapshot.version != CART_SNAPSHOT_VERSION {
            return Err(StoreError::Serialization(format!(
                "unsupported cart snapshot version {}",
                snapshot.version
            )));
        }
        Ok(snapshot)
    }

    /// Add `quantity` of a product, merging with an existing line.
    ///
    /// Merged quantities saturate at [`MAX_LINE_QUANTITY`].
    pub fn add(&mut self, product_id: Uuid, quantity: i64) {
        let quantity = if quantity <= 0 { 1 } else { quantity.min(MAX_LINE_QUANTITY) };
        match self
            .items
            .iter_mut()
            .find(|line| line.product_id == Some(product_id))
        {
            Some(line) => {
                let merged = line
                    .quantity
                    .unwrap_or(0)
                    .clamp(0, MAX_LINE_QUANTITY)
                    .saturating_add(quantity)
                    .min(MAX_LINE_QUANTITY);
                line.quantity = Some(merged);
            }
            None => self.items.push(CartLine::new(product_id, quantity)),
        }
    }

    /// Remove every line for a product
    pub fn remove(&mut self, product_id: Uuid) {
        self.items.retain(|line| line.product_id != Some(product_id));
    }
}

/// Per-user cart cache
#[async_trait]
pub trait CartCache: Send + Sync {
    /// Load the snapshot; a missing cart is an empty snapshot
    async fn load(&self, user_id: Uuid) -> StoreResult<CartSnapshot>;

    /// Replace the snapshot and refresh its TTL
    async fn save(&self, user_id: Uuid, snapshot: &CartSnapshot) -> StoreResult<()>;

    /// Drop the cart. Idempotent.
    async fn clear(&self, user_id: Uuid) -> StoreResult<()>;
}

/// Shared cart cache handle
pub type SharedCarts = std::sync::Arc<dyn CartCache>;

/// [`CartCache`] stored in a key-value cache under `cart:{userId}`
pub struct KvCartCache {
    kv: SharedKv,
    ttl: Duration,
}

impl KvCartCache {
    pub fn new(kv: SharedKv, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    fn key(user_id: Uuid) -> String {
        format!("cart:{user_id}")
    }
}

#[async_trait]
impl CartCache for KvCartCache {
    async fn load(&self, user_id: Uuid) -> StoreResult<CartSnapshot> {
        let Some(raw) = self.kv.get(&Self::key(user_id)).await? else {
            return Ok(CartSnapshot::default());
        };
        if raw.trim().is_empty() {
            return Ok(CartSnapshot::default());
        }
        match CartSnapshot::decode(&raw) {
            Ok(snapshot) => Ok(snapshot),
            Err(err) => {
                warn!(%user_id, error = %err, "Unreadable cart snapshot; treating as empty");
                Ok(CartSnapshot::default())
            }
        }
    }

    async fn save(&self, user_id: Uuid, snapshot: &CartSnapshot) -> StoreResult<()> {
        let encoded = snapshot.encode()?;
        self.kv
            .set_with_ttl(&Self::key(user_id), encoded, self.ttl)
            .await
    }

    async fn clear(&self, user_id: Uuid) -> StoreResult<()> {
        self.kv.delete(&Self::key(user_id)).await
    }
}

/// A cart line joined with its live product
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartViewItem {
    pub product: Product,
    pub quantity: u32,
    pub item_total_cents: i64,
}

/// Cart priced at current catalog prices
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartViewItem>,
    pub total_cents: i64,
}

/// Cart operations used by the HTTP layer
pub struct CartService {
    carts: SharedCarts,
    inventory: SharedInventory,
    timeout: Duration,
}

impl CartService {
    pub fn new(carts: SharedCarts, inventory: SharedInventory, timeout: Duration) -> Self {
        Self {
            carts,
            inventory,
            timeout,
        }
    }

    /// Add a product to the cart. The product must exist.
    pub async fn add_item(&self, user_id: Uuid, product_id: Uuid, quantity: i64) -> StoreResult<CartView> {
        if quantity > MAX_LINE_QUANTITY {
            return Err(StoreError::InvalidInput(format!(
                "quantity must be at most {MAX_LINE_QUANTITY}"
            )));
        }
        let exists = with_timeout(self.timeout, "inventory.get", self.inventory.get(product_id))
            .await?
            .is_some();
        if !exists {
            return Err(StoreError::NotFound(format!("product {product_id}")));
        }

        let mut snapshot = with_timeout(self.timeout, "cart.load", self.carts.load(user_id)).await?;
        snapshot.add(product_id, quantity);
        with_timeout(self.timeout, "cart.save", self.carts.save(user_id, &snapshot)).await?;
        info!(%user_id, %product_id, lines = snapshot.items.len(), "Cart item added");

        self.view(user_id).await
    }

    /// Remove a product from the cart
    pub async fn remove_item(&self, user_id: Uuid, product_id: Uuid) -> StoreResult<CartView> {
        let mut snapshot = with_timeout(self.timeout, "cart.load", self.carts.load(user_id)).await?;
        snapshot.remove(product_id);
        with_timeout(self.timeout, "cart.save", self.carts.save(user_id, &snapshot)).await?;
        info!(%user_id, %product_id, lines = snapshot.items.len(), "Cart item removed");

        self.view(user_id).await
    }

    /// Price the cart at current catalog prices, dropping vanished products
    pub async fn view(&self, user_id: Uuid) -> StoreResult<CartView> {
        let snapshot = with_timeout(self.timeout, "cart.load", self.carts.load(user_id)).await?;
        let mut view = CartView::default();

        for line in &snapshot.items {
            let Some((product_id, quantity)) = line.usable() else {
                continue;
            };
            let product =
                with_timeout(self.timeout, "inventory.get", self.inventory.get(product_id)).await?;
            let Some(product) = product else {
                warn!(%user_id, %product_id, "Cart references a missing product; skipping");
                continue;
            };
            let item_total_cents = product.line_total(quantity);
            view.total_cents = view.total_cents.saturating_add(item_total_cents);
            view.items.push(CartViewItem {
                product,
                quantity,
                item_total_cents,
            });
        }

        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;
    use crate::memory::MemoryInventory;
    use std::sync::Arc;

    fn service(inventory: Arc<MemoryInventory>) -> (CartService, Arc<KvCartCache>) {
        let carts = Arc::new(KvCartCache::new(Arc::new(MemoryKv::new()), DEFAULT_CART_TTL));
        let service = CartService::new(carts.clone(), inventory, Duration::from_secs(1));
        (service, carts)
    }

    #[test]
    fn test_usable_lines() {
        let id = Uuid::new_v4();
        assert_eq!(CartLine::new(id, 2).usable(), Some((id, 2)));
        assert_eq!(CartLine::new(id, 0).usable(), None);
        assert_eq!(CartLine::new(id, -3).usable(), None);
        assert_eq!(
            CartLine {
                product_id: None,
                quantity: Some(1)
            }
            .usable(),
            None
        );
    }

    #[test]
    fn test_snapshot_rejects_unknown_version() {
        let err = CartSnapshot::decode(r#"{"version":99,"items":[]}"#).unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }

    #[test]
    fn test_add_merges_and_defaults_quantity() {
        let id = Uuid::new_v4();
        let mut snapshot = CartSnapshot::default();
        snapshot.add(id, 2);
        snapshot.add(id, 0);
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.items[0].quantity, Some(3));

        snapshot.remove(id);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_add_saturates_huge_quantities() {
        let id = Uuid::new_v4();
        let mut snapshot = CartSnapshot::default();
        snapshot.add(id, i64::MAX);
        snapshot.add(id, 1);
        assert_eq!(snapshot.items[0].quantity, Some(MAX_LINE_QUANTITY));
        assert_eq!(snapshot.items[0].usable(), Some((id, u32::MAX)));

        // A client-written negative line is reset before merging
        let mut snapshot = CartSnapshot::new(vec![CartLine::new(id, i64::MIN)]);
        snapshot.add(id, 2);
        assert_eq!(snapshot.items[0].quantity, Some(2));
    }

    #[tokio::test]
    async fn test_add_rejects_quantity_beyond_line_limit() {
        let inventory = Arc::new(MemoryInventory::new());
        let mug = inventory.seed(Product::new("Mug", 1000, 5));
        let (service, carts) = service(inventory);
        let user = Uuid::new_v4();

        let err = service
            .add_item(user, mug.id, MAX_LINE_QUANTITY + 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
        assert_eq!(err.status_code(), 400);
        assert!(carts.load(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_cache_entry_loads_empty() {
        let kv = Arc::new(MemoryKv::new());
        let user = Uuid::new_v4();
        kv.set_with_ttl(&format!("cart:{user}"), "{not json".into(), DEFAULT_CART_TTL)
            .await
            .unwrap();

        let carts = KvCartCache::new(kv, DEFAULT_CART_TTL);
        assert!(carts.load(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_view_uses_live_prices_and_skips_missing() {
        let inventory = Arc::new(MemoryInventory::new());
        let mug = inventory.seed(Product::new("Mug", 1000, 5));
        let (service, carts) = service(inventory.clone());
        let user = Uuid::new_v4();

        service.add_item(user, mug.id, 2).await.unwrap();
        let mut snapshot = carts.load(user).await.unwrap();
        snapshot.items.push(CartLine::new(Uuid::new_v4(), 1));
        carts.save(user, &snapshot).await.unwrap();

        let mut repriced = mug.clone();
        repriced.price_cents = 1500;
        inventory.upsert(repriced).await.unwrap();

        let view = service.view(user).await.unwrap();
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.total_cents, 3000);
    }

    #[tokio::test]
    async fn test_add_unknown_product_fails() {
        let (service, _) = service(Arc::new(MemoryInventory::new()));
        let err = service
            .add_item(Uuid::new_v4(), Uuid::new_v4(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
