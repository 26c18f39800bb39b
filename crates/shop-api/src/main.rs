//! # Storefront Server
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export AUTH_JWT_SECRET=change-me
//! export AUTH_ACCESS_TTL_SECS=900
//! export AUTH_REFRESH_TTL_SECS=604800
//!
//! # Run the server
//! shop-server
//! ```

use std::time::Duration;

use shop_api::{routes, state::AppState};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// How often expired cache entries are swept
const JANITOR_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    // Print banner
    print_banner();

    // Initialize application state
    let state = AppState::new()?;
    state.bootstrap_admin().await?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    info!("Store timeout: {:?}", state.config.store_timeout);

    let janitor = state.kv.spawn_janitor(JANITOR_INTERVAL);

    // Create router
    let app = routes::create_router(state);

    // Start server
    info!("Storefront starting on http://{}", addr);

    if !is_prod {
        info!("Health: http://{}/health", addr);
        info!("Login: POST http://{}/api/auth/login", addr);
        info!("Checkout: POST http://{}/api/checkout", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(listener, app).await;
    janitor.abort();
    served?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
  shop-server
  ━━━━━━━━━━━━━━━━━━━━━━━
  Storefront API
  Version: {}

"#,
        env!("CARGO_PKG_VERSION")
    );
}
