//! # Product Types
//!
//! Catalog and inventory types for the storefront.
//! A seed catalog can be loaded from `config/products.toml`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

/// Format an amount in cents for display (e.g., "$10.00")
pub fn display_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}${}.{:02}", sign, abs / 100, abs % 100)
}

/// A product in the catalog, carrying its live price and stock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Unique product identifier
    pub id: Uuid,

    /// Display title
    pub title: String,

    /// Long description
    pub description: String,

    /// Unit price in cents
    pub price_cents: i64,

    /// Optional image URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Units on hand
    pub stock: u32,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Create a product with a fresh ID
    pub fn new(title: impl Into<String>, price_cents: i64, stock: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: String::new(),
            price_cents,
            image: None,
            stock,
            created_at: Utc::now(),
        }
    }

    /// Builder: set description
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Builder: set image URL
    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image = Some(url.into());
        self
    }

    /// Builder: set a fixed ID (seed data)
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Price of `quantity` units at the current price
    pub fn line_total(&self, quantity: u32) -> i64 {
        self.price_cents.saturating_mul(i64::from(quantity))
    }
}

/// Fields required to create a product (admin)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    #[serde(default)]
    pub image: Option<String>,
    pub stock: Option<i64>,
}

impl NewProduct {
    /// Validate and build the product
    pub fn into_product(self) -> StoreResult<Product> {
        let title = self
            .title
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| invalid("title is required"))?;
        let description = self
            .description
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| invalid("description is required"))?;
        let price_cents = self
            .price_cents
            .filter(|p| *p >= 0)
            .ok_or_else(|| invalid("priceCents must be >= 0"))?;
        let stock = self
            .stock
            .and_then(|s| u32::try_from(s).ok())
            .ok_or_else(|| invalid("stock must be >= 0"))?;

        let product = Product::new(title, price_cents, stock).with_description(description);
        Ok(match self.image {
            Some(image) => product.with_image(image),
            None => product,
        })
    }
}

/// Partial update of a product (admin). Negative numbers are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub image: Option<String>,
    pub stock: Option<i64>,
}

impl ProductPatch {
    /// Apply the patch in place
    pub fn apply(&self, product: &mut Product) {
        if let Some(title) = &self.title {
            product.title = title.clone();
        }
        if let Some(description) = &self.description {
            product.description = description.clone();
        }
        if let Some(price) = self.price_cents.filter(|p| *p >= 0) {
            product.price_cents = price;
        }
        if let Some(image) = &self.image {
            product.image = Some(image.clone());
        }
        if let Some(stock) = self.stock.and_then(|s| u32::try_from(s).ok()) {
            product.stock = stock;
        }
    }
}

fn invalid(message: &str) -> StoreError {
    StoreError::InvalidInput(message.to_string())
}

/// Seed entry as written in `config/products.toml`
#[derive(Debug, Clone, Deserialize)]
pub struct SeedProduct {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price_cents: i64,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub stock: u32,
}

/// Product catalog seed (loaded from config)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductCatalog {
    #[serde(default)]
    pub products: Vec<SeedProduct>,
}

impl ProductCatalog {
    /// Load catalog from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Materialize the seed entries as products
    pub fn into_products(self) -> Vec<Product> {
        self.products
            .into_iter()
            .map(|seed| {
                let mut product = Product::new(seed.title, seed.price_cents, seed.stock)
                    .with_description(seed.description);
                if let Some(id) = seed.id {
                    product = product.with_id(id);
                }
                if let Some(image) = seed.image {
                    product = product.with_image(image);
                }
                product
            })
            .collect()
    }
}
