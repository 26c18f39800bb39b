//! # shop-api
//!
//! HTTP API layer for the storefront.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - Bearer-token authentication middleware and role checks
//! - REST endpoints for auth, catalog, cart, checkout and orders
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | POST | `/api/auth/register` | Create account |
//! | POST | `/api/auth/login` | Issue token pair |
//! | POST | `/api/auth/refresh` | Rotate token pair |
//! | POST | `/api/auth/logout` | Revoke tokens |
//! | GET | `/api/products` | List products |
//! | GET | `/api/products/{id}` | Get product |
//! | GET | `/api/cart` | View cart |
//! | POST | `/api/cart/items` | Add to cart |
//! | DELETE | `/api/cart/items/{id}` | Remove from cart |
//! | POST | `/api/checkout` | Place order |
//! | GET | `/api/orders` | My orders |
//! | GET | `/api/admin/orders` | All orders (admin) |
//! | POST/PUT/DELETE | `/api/admin/products[/{id}]` | Edit catalog (admin) |

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{AppConfig, AppState};
