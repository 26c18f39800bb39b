//! # Store and Checkout Error Types
//!
//! Typed error handling for the storefront core.
//! Store operations return `StoreResult<T>`, checkout returns `CheckoutResult<T>`.

use thiserror::Error;
use uuid::Uuid;

/// Error raised by a backing store (cache, inventory, orders, users)
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The store did not answer within the configured timeout
    #[error("Store timeout during {operation}")]
    Timeout { operation: &'static str },

    /// Optimistic update lost too many races
    #[error("Contention on {key} after {attempts} attempts")]
    Contention { key: String, attempts: u32 },

    /// Unique constraint violated
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Input rejected before reaching the store
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Record not found where one was required
    #[error("Not found: {0}")]
    NotFound(String),

    /// Encoding/decoding at the store boundary failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Any other backend failure
    #[error("Backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            StoreError::Timeout { .. } => 503,
            StoreError::Contention { .. } => 409,
            StoreError::Conflict(_) => 409,
            StoreError::InvalidInput(_) => 400,
            StoreError::NotFound(_) => 404,
            StoreError::Serialization(_) => 500,
            StoreError::Backend(_) => 500,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Reasons a checkout can fail
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The cart snapshot had no lines at all
    #[error("Cart is empty")]
    CartEmpty,

    /// The buyer no longer exists
    #[error("User not found: {user_id}")]
    UserNotFound { user_id: Uuid },

    /// The cart had lines but none of them could be fulfilled
    #[error("No stock available for any item in the cart")]
    NoStockAvailable,

    /// Stock for a line could not be taken within the retry budget
    #[error("Stock changed concurrently for product {product_id}")]
    StockRace { product_id: Uuid },

    /// The order could not be written; taken stock has been restored
    #[error("Failed to persist order: {0}")]
    OrderPersistenceFailure(StoreError),

    /// A store call failed outside the cases above
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CheckoutError {
    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            CheckoutError::CartEmpty => 400,
            CheckoutError::UserNotFound { .. } => 400,
            CheckoutError::NoStockAvailable => 409,
            CheckoutError::StockRace { .. } => 409,
            CheckoutError::OrderPersistenceFailure(_) => 500,
            CheckoutError::Store(err) => err.status_code(),
        }
    }
}

/// Result type alias for checkout
pub type CheckoutResult<T> = Result<T, CheckoutError>;
