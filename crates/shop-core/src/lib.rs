//! # shop-core
//!
//! Core types, store traits and checkout reconciliation for the storefront.
//!
//! This crate provides:
//! - `Product`, `Order`, `User` and `Principal` domain types
//! - `UserStore`, `InventoryStore`, `OrderStore` and `CartCache` store traits
//! - In-memory implementations of every store
//! - `KeyValueStore`, the TTL cache the cart and the token registry sit on
//! - `CheckoutReconciler`, which turns a cached cart into a durable order
//! - `StoreError` and `CheckoutError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use shop_core::{CheckoutReconciler, CartService};
//!
//! // Add to the cart
//! cart_service.add_item(user_id, product_id, 2).await?;
//!
//! // Reconcile the cart against live stock and prices
//! let order = reconciler.checkout(user_id).await?;
//! println!("Order {} total {}", order.id, order.total_cents);
//! ```

pub mod cart;
pub mod checkout;
pub mod error;
pub mod kv;
pub mod memory;
pub mod order;
pub mod product;
pub mod store;
pub mod user;

// Re-exports for convenience
pub use cart::{
    CartCache, CartLine, CartService, CartSnapshot, CartView, CartViewItem, KvCartCache,
    SharedCarts, CART_SNAPSHOT_VERSION, DEFAULT_CART_TTL, MAX_LINE_QUANTITY,
};
pub use checkout::CheckoutReconciler;
pub use error::{CheckoutError, CheckoutResult, StoreError, StoreResult};
pub use kv::{KeyValueStore, MemoryKv, SharedKv};
pub use memory::{MemoryInventory, MemoryOrderStore, MemoryUserStore};
pub use order::{Order, OrderLine, OrderStatus};
pub use product::{display_cents, NewProduct, Product, ProductCatalog, ProductPatch};
pub use store::{
    with_timeout, InventoryStore, OrderStore, SharedInventory, SharedOrders, SharedUsers,
    UserStore, MAX_STOCK_RETRIES,
};
pub use user::{normalize_email, Principal, Role, User};
