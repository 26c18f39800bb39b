//! # Order Types
//!
//! Orders are created once by checkout and never mutated afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A fulfilled line of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: Uuid,
    pub quantity: u32,
}

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Stock taken and order written
    Completed,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Completed
    }
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Completed => "completed",
        }
    }
}

/// A persisted order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Unique order ID (generated)
    pub id: Uuid,

    /// Buyer
    pub user_id: Uuid,

    /// Lines as actually fulfilled
    pub items: Vec<OrderLine>,

    /// Total computed from live prices at checkout
    pub total_cents: i64,

    #[serde(default)]
    pub status: OrderStatus,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Create a completed order with generated ID
    pub fn completed(user_id: Uuid, items: Vec<OrderLine>, total_cents: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            items,
            total_cents,
            status: OrderStatus::Completed,
            created_at: Utc::now(),
        }
    }

    /// Get item count
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Quantity ordered for a product, zero if absent
    pub fn quantity_of(&self, product_id: Uuid) -> u32 {
        self.items
            .iter()
            .filter(|i| i.product_id == product_id)
            .map(|i| i.quantity)
            .sum()
    }
}
