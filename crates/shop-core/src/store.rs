//! # Store Traits
//!
//! Persistence seams for the storefront. Each backing store (Postgres, Redis,
//! in-memory) implements these traits so handlers and the checkout reconciler
//! stay independent of the storage technology.
//!
//! ```text
//! ┌──────────────┐  ┌──────────────────┐  ┌──────────────┐  ┌───────────┐
//! │  UserStore   │  │  InventoryStore  │  │  OrderStore  │  │ CartCache │
//! └──────┬───────┘  └────────┬─────────┘  └──────┬───────┘  └─────┬─────┘
//!        │                   │                   │                │
//!        └───────────────────┴─────────┬─────────┴────────────────┘
//!                                      │
//!                           CheckoutReconciler / handlers
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::order::Order;
use crate::product::Product;
use crate::user::User;

/// Optimistic attempts before [`InventoryStore::take_up_to`] gives up
pub const MAX_STOCK_RETRIES: u32 = 8;

/// Run a store call with a deadline.
///
/// Elapsed deadlines surface as [`StoreError::Timeout`] naming `operation`.
pub async fn with_timeout<T, F>(timeout: Duration, operation: &'static str, fut: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout { operation }),
    }
}

/// Account lookup and creation (the credential store)
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find an account by normalised email
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Find an account by ID
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Insert a new account. Fails with `Conflict` if the email is taken.
    async fn insert(&self, user: User) -> StoreResult<User>;
}

/// Product catalog with stock accounting
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Current state of a product
    async fn get(&self, id: Uuid) -> StoreResult<Option<Product>>;

    /// All products, oldest first
    async fn list(&self) -> StoreResult<Vec<Product>>;

    /// Insert or replace a product
    async fn upsert(&self, product: Product) -> StoreResult<Product>;

    /// Delete a product; returns whether it existed
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;

    /// Set stock to `new` only if it is still `expected`.
    ///
    /// Returns `false` when the stock moved (or the product vanished).
    async fn compare_and_set_stock(&self, id: Uuid, expected: u32, new: u32) -> StoreResult<bool>;

    /// Add units back to stock (compensation, restocking)
    async fn restock(&self, id: Uuid, quantity: u32) -> StoreResult<()>;

    /// Take up to `requested` units: all of them if enough are on hand,
    /// otherwise whatever is left. Returns the number taken.
    ///
    /// Stores with a native conditional decrement should override this. The
    /// default runs a bounded compare-and-set loop and fails with
    /// [`StoreError::Contention`] after [`MAX_STOCK_RETRIES`] lost races.
    async fn take_up_to(&self, id: Uuid, requested: u32) -> StoreResult<u32> {
        for _ in 0..MAX_STOCK_RETRIES {
            let Some(product) = self.get(id).await? else {
                return Ok(0);
            };
            let take = requested.min(product.stock);
            if take == 0 {
                return Ok(0);
            }
            if self
                .compare_and_set_stock(id, product.stock, product.stock - take)
                .await?
            {
                return Ok(take);
            }
        }
        Err(StoreError::Contention {
            key: format!("stock:{id}"),
            attempts: MAX_STOCK_RETRIES,
        })
    }
}

/// Append-only order persistence
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a new order
    async fn insert(&self, order: Order) -> StoreResult<Order>;

    /// Orders of one user, newest first
    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Order>>;

    /// Every order, newest first
    async fn list_all(&self) -> StoreResult<Vec<Order>>;
}

/// Shared store handles
pub type SharedUsers = Arc<dyn UserStore>;
pub type SharedInventory = Arc<dyn InventoryStore>;
pub type SharedOrders = Arc<dyn OrderStore>;
