//! # In-Memory Stores
//!
//! Thread-safe in-memory implementations of the store traits, used for
//! development, tests and single-node deployments.
//!
//! All of them are cheaply cloneable; clones share the same data.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::order::Order;
use crate::product::Product;
use crate::store::{InventoryStore, OrderStore, UserStore};
use crate::user::{normalize_email, User};

/// In-memory [`UserStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove an account (used when an account is deleted out of band)
    pub fn remove(&self, id: Uuid) -> Option<User> {
        self.users.write().remove(&id)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = normalize_email(email);
        Ok(self
            .users
            .read()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.users.read().get(&id).cloned())
    }

    async fn insert(&self, user: User) -> StoreResult<User> {
        let mut users = self.users.write();
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!("email {} already in use", user.email)));
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }
}

/// In-memory [`InventoryStore`].
///
/// [`take_up_to`](InventoryStore::take_up_to) is a single operation under the
/// write lock, so concurrent checkouts can never drive stock below zero.
#[derive(Debug, Clone, Default)]
pub struct MemoryInventory {
    products: Arc<RwLock<HashMap<Uuid, Product>>>,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a product synchronously (startup seeding, tests)
    pub fn seed(&self, product: Product) -> Product {
        self.products.write().insert(product.id, product.clone());
        product
    }

    /// Current stock of a product, if it exists
    pub fn stock_of(&self, id: Uuid) -> Option<u32> {
        self.products.read().get(&id).map(|p| p.stock)
    }
}

#[async_trait]
impl InventoryStore for MemoryInventory {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Product>> {
        Ok(self.products.read().get(&id).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<Product>> {
        let mut products: Vec<Product> = self.products.read().values().cloned().collect();
        products.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.title.cmp(&b.title)));
        Ok(products)
    }

    async fn upsert(&self, product: Product) -> StoreResult<Product> {
        self.products.write().insert(product.id, product.clone());
        Ok(product)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.products.write().remove(&id).is_some())
    }

    async fn compare_and_set_stock(&self, id: Uuid, expected: u32, new: u32) -> StoreResult<bool> {
        let mut products = self.products.write();
        match products.get_mut(&id) {
            Some(product) if product.stock == expected => {
                product.stock = new;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn restock(&self, id: Uuid, quantity: u32) -> StoreResult<()> {
        let mut products = self.products.write();
        let product = products
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("product {id}")))?;
        product.stock = product.stock.saturating_add(quantity);
        Ok(())
    }

    async fn take_up_to(&self, id: Uuid, requested: u32) -> StoreResult<u32> {
        let mut products = self.products.write();
        let Some(product) = products.get_mut(&id) else {
            return Ok(0);
        };
        let take = requested.min(product.stock);
        product.stock -= take;
        Ok(take)
    }
}

/// In-memory [`OrderStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryOrderStore {
    orders: Arc<RwLock<Vec<Order>>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
        orders.reverse();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert(&self, order: Order) -> StoreResult<Order> {
        self.orders.write().push(order.clone());
        Ok(order)
    }

    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Order>> {
        let orders = self
            .orders
            .read()
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        Ok(Self::newest_first(orders))
    }

    async fn list_all(&self) -> StoreResult<Vec<Order>> {
        let orders = self.orders.read().clone();
        Ok(Self::newest_first(orders))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderLine;
    use crate::user::Role;

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let users = MemoryUserStore::new();
        users
            .insert(User::new("a@example.com", "h", Role::User))
            .await
            .unwrap();

        let err = users
            .insert(User::new("A@example.com ", "h", Role::User))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert!(users.find_by_email(" A@EXAMPLE.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_take_up_to_caps_at_stock() {
        let inventory = MemoryInventory::new();
        let product = inventory.seed(Product::new("Lamp", 4500, 3));

        assert_eq!(inventory.take_up_to(product.id, 5).await.unwrap(), 3);
        assert_eq!(inventory.take_up_to(product.id, 1).await.unwrap(), 0);
        assert_eq!(inventory.stock_of(product.id), Some(0));

        inventory.restock(product.id, 2).await.unwrap();
        assert_eq!(inventory.stock_of(product.id), Some(2));
        assert_eq!(inventory.take_up_to(Uuid::new_v4(), 1).await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_takes_never_oversell() {
        let inventory = MemoryInventory::new();
        let product = inventory.seed(Product::new("Last One", 100, 10));

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let inventory = inventory.clone();
                tokio::spawn(async move { inventory.take_up_to(product.id, 1).await.unwrap() })
            })
            .collect();

        let mut taken = 0;
        for handle in handles {
            taken += handle.await.unwrap();
        }
        assert_eq!(taken, 10);
        assert_eq!(inventory.stock_of(product.id), Some(0));
    }

    #[tokio::test]
    async fn test_cas_rejects_stale_expectation() {
        let inventory = MemoryInventory::new();
        let product = inventory.seed(Product::new("Pen", 150, 5));

        assert!(!inventory.compare_and_set_stock(product.id, 4, 3).await.unwrap());
        assert!(inventory.compare_and_set_stock(product.id, 5, 3).await.unwrap());
        assert_eq!(inventory.stock_of(product.id), Some(3));
    }

    #[tokio::test]
    async fn test_orders_newest_first_per_user() {
        let orders = MemoryOrderStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let line = OrderLine {
            product_id: Uuid::new_v4(),
            quantity: 1,
        };

        let first = orders.insert(Order::completed(alice, vec![line], 100)).await.unwrap();
        orders.insert(Order::completed(bob, vec![line], 200)).await.unwrap();
        let second = orders.insert(Order::completed(alice, vec![line], 300)).await.unwrap();

        let mine = orders.list_for_user(alice).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].id, second.id);
        assert_eq!(mine[1].id, first.id);
        assert_eq!(orders.list_all().await.unwrap().len(), 3);
    }
}
