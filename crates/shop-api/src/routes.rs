//! # Routes
//!
//! Axum router configuration for the storefront API.

use crate::handlers;
use crate::middleware::{authenticate, require_admin, require_principal};
use crate::state::AppState;
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - Public:
///   - GET  /health
///   - POST /api/auth/register, /api/auth/login, /api/auth/refresh
///   - GET  /api/products, /api/products/{id}
///
/// - Authenticated:
///   - POST /api/auth/logout
///   - GET  /api/cart, POST /api/cart/items, DELETE /api/cart/items/{product_id}
///   - POST /api/checkout
///   - GET  /api/orders
///
/// - Admin:
///   - GET  /api/admin/orders
///   - POST /api/admin/products, PUT/DELETE /api/admin/products/{id}
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public_routes = Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh))
        .route("/products", get(handlers::list_products))
        .route("/products/{product_id}", get(handlers::get_product));

    let user_routes = Router::new()
        .route("/auth/logout", post(handlers::logout))
        .route("/cart", get(handlers::get_cart))
        .route("/cart/items", post(handlers::add_cart_item))
        .route("/cart/items/{product_id}", delete(handlers::remove_cart_item))
        .route("/checkout", post(handlers::checkout))
        .route("/orders", get(handlers::list_my_orders))
        .route_layer(from_fn(require_principal));

    let admin_routes = Router::new()
        .route("/orders", get(handlers::admin_list_orders))
        .route("/products", post(handlers::admin_create_product))
        .route(
            "/products/{product_id}",
            put(handlers::admin_update_product).delete(handlers::admin_delete_product),
        )
        .route_layer(from_fn(require_admin));

    let api_routes = Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .nest("/admin", admin_routes);

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api_routes)
        // Middleware (last added runs first)
        .layer(from_fn_with_state(state.clone(), authenticate))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppConfig;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use shop_auth::AuthConfig;
    use shop_core::{MemoryUserStore, Product, UserStore};
    use std::time::Duration;
    use tower::ServiceExt;

    const ADMIN_EMAIL: &str = "admin@example.com";
    const PASSWORD: &str = "password123";

    struct TestApp {
        router: Router,
        state: AppState,
        mug: Product,
        print: Product,
    }

    async fn app() -> TestApp {
        let config = AppConfig {
            admin: Some((ADMIN_EMAIL.into(), PASSWORD.into())),
            ..AppConfig::default()
        };
        let auth = AuthConfig::new("router-test-secret", Duration::from_secs(900), Duration::from_secs(3600));
        let mug = Product::new("Mug", 1200, 10);
        let print = Product::new("Print", 9500, 1);
        let state = AppState::build(config, &auth, vec![mug.clone(), print.clone()]).unwrap();
        state.bootstrap_admin().await.unwrap();
        TestApp {
            router: create_router(state.clone()),
            state,
            mug,
            print,
        }
    }

    async fn send(
        app: &TestApp,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        app.router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn login(app: &TestApp, email: &str) -> (String, String) {
        let response = send(
            app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": email, "password": PASSWORD })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        (
            body["accessToken"].as_str().unwrap().to_string(),
            body["refreshToken"].as_str().unwrap().to_string(),
        )
    }

    async fn register_and_login(app: &TestApp, email: &str) -> (String, String) {
        let response = send(
            app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "email": email, "password": PASSWORD })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        login(app, email).await
    }

    #[tokio::test]
    async fn test_health() {
        let app = app().await;
        let response = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_catalog_is_public() {
        let app = app().await;
        let response = send(&app, Method::GET, "/api/products", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["count"], 2);

        let uri = format!("/api/products/{}", app.mug.id);
        let response = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(json_body(response).await["priceCents"], 1200);

        let uri = format!("/api/products/{}", uuid::Uuid::new_v4());
        let response = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_protected_routes_need_a_valid_access_token() {
        let app = app().await;
        let response = send(&app, Method::GET, "/api/cart", None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(&app, Method::GET, "/api/cart", Some("garbage"), None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "unauthenticated");

        // A refresh token is not an access token
        let (_, refresh) = register_and_login(&app, "ada@example.com").await;
        let response = send(&app, Method::GET, "/api/cart", Some(&refresh), None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_cart_checkout_and_order_history() {
        let app = app().await;
        let (access, _) = register_and_login(&app, "ada@example.com").await;

        let response = send(
            &app,
            Method::POST,
            "/api/cart/items",
            Some(&access),
            Some(json!({ "productId": app.mug.id, "quantity": 3 })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["totalCents"], 3600);

        // Admin raises the price before checkout; the order uses the live price
        let (admin, _) = login(&app, ADMIN_EMAIL).await;
        let uri = format!("/api/admin/products/{}", app.mug.id);
        let response = send(&app, Method::PUT, &uri, Some(&admin), Some(json!({ "priceCents": 1500 }))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&app, Method::POST, "/api/checkout", Some(&access), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let order = json_body(response).await;
        assert_eq!(order["totalCents"], 4500);
        assert_eq!(order["status"], "completed");
        assert_eq!(order["user"]["email"], "ada@example.com");
        assert_eq!(order["items"][0]["title"], "Mug");
        assert_eq!(order["items"][0]["quantity"], 3);

        let uri = format!("/api/products/{}", app.mug.id);
        let response = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(json_body(response).await["stock"], 7);

        // Cart is cleared, so a second checkout is CartEmpty
        let response = send(&app, Method::POST, "/api/checkout", Some(&access), None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(&app, Method::GET, "/api/orders", Some(&access), None).await;
        let orders = json_body(response).await;
        assert_eq!(orders.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_huge_cart_quantities_are_bounded() {
        let app = app().await;
        let (access, _) = register_and_login(&app, "ada@example.com").await;

        let response = send(
            &app,
            Method::POST,
            "/api/cart/items",
            Some(&access),
            Some(json!({ "productId": app.mug.id, "quantity": i64::MAX })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        for _ in 0..2 {
            let response = send(
                &app,
                Method::POST,
                "/api/cart/items",
                Some(&access),
                Some(json!({ "productId": app.mug.id, "quantity": u32::MAX })),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = send(&app, Method::GET, "/api/cart", Some(&access), None).await;
        let cart = json_body(response).await;
        assert_eq!(cart["items"][0]["quantity"], u32::MAX);

        // Checkout caps the line at live stock
        let response = send(&app, Method::POST, "/api/checkout", Some(&access), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["items"][0]["quantity"], 10);
    }

    #[tokio::test]
    async fn test_checkout_without_stock_conflicts() {
        let app = app().await;
        let (first, _) = register_and_login(&app, "ada@example.com").await;
        let (second, _) = register_and_login(&app, "bob@example.com").await;

        for token in [&first, &second] {
            let response = send(
                &app,
                Method::POST,
                "/api/cart/items",
                Some(token),
                Some(json!({ "productId": app.print.id })),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = send(&app, Method::POST, "/api/checkout", Some(&first), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = send(&app, Method::POST, "/api/checkout", Some(&second), None).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_checkout_for_deleted_account_is_bad_request() {
        let users = MemoryUserStore::new();
        let auth = AuthConfig::new("router-test-secret", Duration::from_secs(900), Duration::from_secs(3600));
        let mug = Product::new("Mug", 1200, 10);
        let state =
            AppState::with_user_store(AppConfig::default(), &auth, vec![mug.clone()], users.clone())
                .unwrap();
        let app = TestApp {
            router: create_router(state.clone()),
            state,
            print: mug.clone(),
            mug,
        };

        let (access, _) = register_and_login(&app, "ada@example.com").await;
        send(
            &app,
            Method::POST,
            "/api/cart/items",
            Some(&access),
            Some(json!({ "productId": app.mug.id })),
        )
        .await;

        // The token stays live after the account behind it is gone
        let user = app
            .state
            .users
            .find_by_email("ada@example.com")
            .await
            .unwrap()
            .unwrap();
        users.remove(user.id);

        let response = send(&app, Method::POST, "/api/checkout", Some(&access), None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let uri = format!("/api/products/{}", app.mug.id);
        let response = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(json_body(response).await["stock"], 10);
    }

    #[tokio::test]
    async fn test_logout_revokes_and_refresh_rotates() {
        let app = app().await;
        let (access, refresh) = register_and_login(&app, "ada@example.com").await;

        let response = send(
            &app,
            Method::POST,
            "/api/auth/refresh",
            None,
            Some(json!({ "refreshToken": refresh })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let rotated = json_body(response).await;
        let new_refresh = rotated["refreshToken"].as_str().unwrap().to_string();

        // Replay of the old refresh token fails
        let response = send(
            &app,
            Method::POST,
            "/api/auth/refresh",
            None,
            Some(json!({ "refreshToken": refresh })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(
            &app,
            Method::POST,
            "/api/auth/logout",
            Some(&access),
            Some(json!({ "refreshToken": new_refresh })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = send(&app, Method::GET, "/api/cart", Some(&access), None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let response = send(
            &app,
            Method::POST,
            "/api/auth/refresh",
            None,
            Some(json!({ "refreshToken": new_refresh })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_without_body() {
        let app = app().await;
        let (access, _) = register_and_login(&app, "ada@example.com").await;
        let response = send(&app, Method::POST, "/api/auth/logout", Some(&access), None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_login_and_register_errors() {
        let app = app().await;
        register_and_login(&app, "ada@example.com").await;

        let response = send(
            &app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "email": "ADA@example.com", "password": PASSWORD })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "nope-nope" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_routes_need_admin_role() {
        let app = app().await;
        let (user, _) = register_and_login(&app, "ada@example.com").await;
        let (admin, _) = login(&app, ADMIN_EMAIL).await;

        let response = send(&app, Method::GET, "/api/admin/orders", None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let response = send(&app, Method::GET, "/api/admin/orders", Some(&user), None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let response = send(&app, Method::GET, "/api/admin/orders", Some(&admin), None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_product_lifecycle() {
        let app = app().await;
        let (admin, _) = login(&app, ADMIN_EMAIL).await;

        let response = send(
            &app,
            Method::POST,
            "/api/admin/products",
            Some(&admin),
            Some(json!({ "title": "Tote", "description": "Canvas", "priceCents": 6400, "stock": 5 })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = json_body(response).await["id"].as_str().unwrap().to_string();

        let response = send(
            &app,
            Method::POST,
            "/api/admin/products",
            Some(&admin),
            Some(json!({ "title": "No price" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let uri = format!("/api/admin/products/{id}");
        let response = send(&app, Method::DELETE, &uri, Some(&admin), None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let response = send(&app, Method::DELETE, &uri, Some(&admin), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
