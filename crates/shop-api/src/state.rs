//! # Application State
//!
//! Shared state for the Axum application.
//! Wires the stores, the cart service, the checkout reconciler and the
//! authentication services together.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use shop_auth::{
    AuthConfig, Authenticator, KvTokenRegistry, SessionService, SharedRegistry, TokenIssuer,
};
use shop_core::{
    CartService, CheckoutReconciler, KvCartCache, MemoryInventory, MemoryKv, MemoryOrderStore,
    MemoryUserStore, Product, ProductCatalog, SharedCarts, SharedInventory, SharedOrders,
    SharedUsers, DEFAULT_CART_TTL,
};

/// Default per-call store timeout
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(2000);

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Deadline for each store call
    pub store_timeout: Duration,
    /// Cart lifetime in the cache
    pub cart_ttl: Duration,
    /// Explicit product seed file
    pub catalog_path: Option<PathBuf>,
    /// Bootstrap admin account (email, password)
    pub admin: Option<(String, String)>,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let admin = match (env_opt("ADMIN_EMAIL"), env_opt("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some((email, password)),
            (None, None) => None,
            _ => anyhow::bail!("ADMIN_EMAIL and ADMIN_PASSWORD must be set together"),
        };

        Ok(Self {
            host: env_opt("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: env_parse("PORT")?.unwrap_or(8080),
            environment: env_opt("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            store_timeout: env_parse("STORE_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_STORE_TIMEOUT),
            cart_ttl: env_parse("CART_TTL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_CART_TTL),
            catalog_path: env_opt("CATALOG_PATH").map(PathBuf::from),
            admin,
        })
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<std::net::SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid socket address {}:{}", self.host, self.port))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            environment: "development".to_string(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            cart_ttl: DEFAULT_CART_TTL,
            catalog_path: None,
            admin: None,
        }
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env_opt(name)
        .map(|raw| raw.trim().parse::<T>())
        .transpose()
        .with_context(|| format!("{name} is not a valid number"))
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// Credential store
    pub users: SharedUsers,
    /// Product catalog with stock
    pub inventory: SharedInventory,
    /// Order store
    pub orders: SharedOrders,
    /// Backing cache for carts and the token registry
    pub kv: MemoryKv,
    /// Cart operations
    pub carts: Arc<CartService>,
    /// Checkout reconciliation
    pub checkout: Arc<CheckoutReconciler>,
    /// Bearer-token authentication
    pub authenticator: Authenticator,
    /// Login, refresh and logout
    pub sessions: SessionService,
}

impl AppState {
    /// Create state from the environment, seeding the catalog from config
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        let auth = AuthConfig::from_env().context("Failed to load auth configuration")?;
        let catalog = load_product_catalog(config.catalog_path.as_deref())?;
        Self::build(config, &auth, catalog.into_products())
    }

    /// Create state over in-memory stores
    pub fn build(config: AppConfig, auth: &AuthConfig, products: Vec<Product>) -> anyhow::Result<Self> {
        Self::with_user_store(config, auth, products, MemoryUserStore::new())
    }

    /// Create state over in-memory stores with a caller-held credential store
    pub fn with_user_store(
        config: AppConfig,
        auth: &AuthConfig,
        products: Vec<Product>,
        users: MemoryUserStore,
    ) -> anyhow::Result<Self> {
        let timeout = config.store_timeout;
        let kv = MemoryKv::new();

        let inventory = MemoryInventory::new();
        for product in products {
            inventory.seed(product);
        }

        let users: SharedUsers = Arc::new(users);
        let inventory: SharedInventory = Arc::new(inventory);
        let orders: SharedOrders = Arc::new(MemoryOrderStore::new());
        let cart_cache: SharedCarts = Arc::new(KvCartCache::new(Arc::new(kv.clone()), config.cart_ttl));

        let issuer = TokenIssuer::new(auth).context("Failed to initialize token issuer")?;
        let registry: SharedRegistry = Arc::new(KvTokenRegistry::new(Arc::new(kv.clone())));

        Ok(Self {
            carts: Arc::new(CartService::new(cart_cache.clone(), inventory.clone(), timeout)),
            checkout: Arc::new(CheckoutReconciler::new(
                cart_cache,
                users.clone(),
                inventory.clone(),
                orders.clone(),
                timeout,
            )),
            authenticator: Authenticator::new(issuer.clone(), registry.clone(), timeout),
            sessions: SessionService::new(users.clone(), issuer, registry, timeout),
            config,
            users,
            inventory,
            orders,
            kv,
        })
    }

    /// Create the configured admin account if it does not exist yet
    pub async fn bootstrap_admin(&self) -> anyhow::Result<()> {
        let Some((email, password)) = &self.config.admin else {
            return Ok(());
        };
        let admin = self
            .sessions
            .ensure_admin(email, password)
            .await
            .context("Failed to bootstrap admin account")?;
        tracing::info!(user_id = %admin.id, "Admin account ready");
        Ok(())
    }
}

/// Load product catalog from config file
fn load_product_catalog(explicit: Option<&Path>) -> anyhow::Result<ProductCatalog> {
    if let Some(path) = explicit {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return parse_catalog(&content, &path.display().to_string());
    }

    // Try to load from config/products.toml
    let config_paths = [
        "config/products.toml",
        "../config/products.toml",
        "../../config/products.toml",
    ];

    for path in config_paths {
        if let Ok(content) = std::fs::read_to_string(path) {
            return parse_catalog(&content, path);
        }
    }

    // Return empty catalog if no config found
    tracing::warn!("No product catalog found, using empty catalog");
    Ok(ProductCatalog::default())
}

fn parse_catalog(content: &str, path: &str) -> anyhow::Result<ProductCatalog> {
    let catalog = ProductCatalog::from_toml(content)
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path, e))?;
    tracing::info!("Loaded {} products from {}", catalog.products.len(), path);
    Ok(catalog)
}
