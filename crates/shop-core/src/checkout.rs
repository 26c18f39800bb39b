//! # Checkout Reconciliation
//!
//! Converts a cached cart snapshot into a persisted order.
//!
//! The cart is client-writable and may be days old, so it only says *what*
//! the buyer asked for. Quantities are capped by live stock and the total is
//! priced from the inventory at the moment of purchase.
//!
//! ```text
//! load cart ──► resolve buyer ──► per line: lookup ─► take stock ─► price
//!                                                         │
//!            return ◄── clear cart ◄── persist order ◄────┘
//! ```
//!
//! If anything fails after stock was taken, the taken units are put back
//! before the error is returned.

use std::time::Duration;

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::cart::{CartCache, SharedCarts};
use crate::error::{CheckoutError, CheckoutResult, StoreError};
use crate::order::{Order, OrderLine};
use crate::product::display_cents;
use crate::store::{
    with_timeout, InventoryStore, OrderStore, SharedInventory, SharedOrders, SharedUsers, UserStore,
};

/// Checkout reconciler
pub struct CheckoutReconciler {
    carts: SharedCarts,
    users: SharedUsers,
    inventory: SharedInventory,
    orders: SharedOrders,
    timeout: Duration,
}

impl CheckoutReconciler {
    pub fn new(
        carts: SharedCarts,
        users: SharedUsers,
        inventory: SharedInventory,
        orders: SharedOrders,
        timeout: Duration,
    ) -> Self {
        Self {
            carts,
            users,
            inventory,
            orders,
            timeout,
        }
    }

    /// Check out the user's cart.
    ///
    /// # Errors
    ///
    /// - `CartEmpty` if the cart has no lines
    /// - `UserNotFound` if the buyer no longer exists
    /// - `NoStockAvailable` if no line could be fulfilled
    /// - `StockRace` if stock could not be taken within the retry budget
    /// - `OrderPersistenceFailure` if the order write failed (stock restored)
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn checkout(&self, user_id: Uuid) -> CheckoutResult<Order> {
        let snapshot =
            with_timeout(self.timeout, "cart.load", self.carts.load(user_id)).await?;
        if snapshot.is_empty() {
            warn!("Checkout attempted with empty cart");
            return Err(CheckoutError::CartEmpty);
        }

        let buyer = with_timeout(self.timeout, "users.find_by_id", self.users.find_by_id(user_id))
            .await?;
        if buyer.is_none() {
            error!("Buyer not found for checkout");
            return Err(CheckoutError::UserNotFound { user_id });
        }

        let mut taken: Vec<OrderLine> = Vec::new();
        let mut total_cents: i64 = 0;

        for line in &snapshot.items {
            let Some((product_id, requested)) = line.usable() else {
                continue;
            };

            let product = match with_timeout(
                self.timeout,
                "inventory.get",
                self.inventory.get(product_id),
            )
            .await
            {
                Ok(Some(product)) => product,
                Ok(None) => {
                    warn!(%product_id, "Cart references a missing product; skipping line");
                    continue;
                }
                Err(err) => return Err(self.abort(&taken, err.into()).await),
            };

            let purchasable = requested.min(product.stock);
            if purchasable == 0 {
                info!(%product_id, requested, "Out of stock; skipping line");
                continue;
            }

            let took = match with_timeout(
                self.timeout,
                "inventory.take_up_to",
                self.inventory.take_up_to(product_id, purchasable),
            )
            .await
            {
                Ok(took) => took,
                Err(StoreError::Contention { .. }) => {
                    return Err(self.abort(&taken, CheckoutError::StockRace { product_id }).await);
                }
                Err(err) => {
                    error!(%product_id, error = %err, "Stock decrement failed; line outcome unknown");
                    return Err(self.abort(&taken, err.into()).await);
                }
            };

            if took == 0 {
                info!(%product_id, "Stock sold out concurrently; skipping line");
                continue;
            }
            if took < requested {
                info!(%product_id, requested, took, "Quantity reduced to available stock");
            }

            total_cents = total_cents.saturating_add(product.line_total(took));
            taken.push(OrderLine {
                product_id,
                quantity: took,
            });
        }

        if taken.is_empty() {
            warn!("No line of the cart could be fulfilled");
            return Err(CheckoutError::NoStockAvailable);
        }

        let order = Order::completed(user_id, taken.clone(), total_cents);
        let order = match with_timeout(self.timeout, "orders.insert", self.orders.insert(order))
            .await
        {
            Ok(order) => order,
            Err(err) => {
                error!(error = %err, "Order write failed; restoring stock");
                return Err(self
                    .abort(&taken, CheckoutError::OrderPersistenceFailure(err))
                    .await);
            }
        };

        if let Err(err) = with_timeout(self.timeout, "cart.clear", self.carts.clear(user_id)).await
        {
            // The order stands; a stale cart is harmless and expires on its own
            warn!(error = %err, "Failed to clear cart after checkout");
        }

        info!(
            order_id = %order.id,
            items = order.item_count(),
            total = %display_cents(order.total_cents),
            "Order created"
        );
        Ok(order)
    }

    /// Put back every taken line, then hand back `cause`
    async fn abort(&self, taken: &[OrderLine], cause: CheckoutError) -> CheckoutError {
        for line in taken {
            let restored = with_timeout(
                self.timeout,
                "inventory.restock",
                self.inventory.restock(line.product_id, line.quantity),
            )
            .await;
            if let Err(err) = restored {
                error!(
                    product_id = %line.product_id,
                    quantity = line.quantity,
                    error = %err,
                    "Failed to restore stock"
                );
            }
        }
        cause
    }
}
