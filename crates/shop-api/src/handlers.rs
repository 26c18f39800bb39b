//! # Request Handlers
//!
//! Axum request handlers for the storefront API.
//! Every authenticated handler takes its caller as a [`CurrentPrincipal`].

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shop_auth::{AuthError, TokenPair};
use shop_core::{
    with_timeout, CartView, CheckoutError, InventoryStore, NewProduct, Order, OrderStatus,
    OrderStore, Product, ProductPatch, Role, StoreError, User, UserStore,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::middleware::{unauthenticated, AccessToken, CurrentPrincipal};
use crate::state::AppState;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Register/login request
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

/// Refresh request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Optional logout body
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Add-to-cart request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCartItemRequest {
    pub product_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

/// Public view of an account
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// Buyer as shown on an order
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUserView {
    pub id: Uuid,
    /// `None` if the account has since been deleted
    pub email: Option<String>,
}

/// Order line with its product title
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemView {
    pub product_id: Uuid,
    /// `None` if the product has since been deleted
    pub title: Option<String>,
    pub quantity: u32,
}

/// Order as returned by the API
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: Uuid,
    pub user: OrderUserView,
    pub items: Vec<OrderItemView>,
    pub total_cents: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn not_found(what: impl std::fmt::Display) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new(format!("Not found: {what}"), 404)),
    )
}

fn store_error_to_response(err: StoreError) -> ApiError {
    let code = err.status_code();
    if code >= 500 {
        error!("Store error: {}", err);
        let message = match err {
            StoreError::Timeout { .. } => "service unavailable",
            _ => "internal error",
        };
        return (status(code), Json(ErrorResponse::new(message, code)));
    }
    (status(code), Json(ErrorResponse::new(err.to_string(), code)))
}

fn checkout_error_to_response(err: CheckoutError) -> ApiError {
    let code = err.status_code();
    match &err {
        CheckoutError::Store(store) => return store_error_to_response(store.clone()),
        CheckoutError::OrderPersistenceFailure(cause) => {
            error!("Order persistence failed: {}", cause);
            return (
                status(code),
                Json(ErrorResponse::new("order could not be saved", code)),
            );
        }
        _ => {}
    }
    (status(code), Json(ErrorResponse::new(err.to_string(), code)))
}

fn auth_error_to_response(err: AuthError) -> ApiError {
    if err.is_token_failure() {
        info!(kind = err.kind(), "Token rejected");
        return unauthenticated();
    }
    match err {
        AuthError::InvalidCredentials => (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("invalid credentials", 401)),
        ),
        AuthError::Store(store) => store_error_to_response(store),
        err @ (AuthError::InvalidEmail(_) | AuthError::WeakPassword(_) | AuthError::EmailTaken) => {
            let code = err.status_code();
            (status(code), Json(ErrorResponse::new(err.to_string(), code)))
        }
        err => {
            error!("Auth failure: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("internal error", 500)),
            )
        }
    }
}

/// Resolve buyer emails and product titles with explicit store calls
async fn order_views(state: &AppState, orders: Vec<Order>) -> Result<Vec<OrderView>, ApiError> {
    let timeout = state.config.store_timeout;
    let mut emails: HashMap<Uuid, Option<String>> = HashMap::new();
    let mut titles: HashMap<Uuid, Option<String>> = HashMap::new();
    let mut views = Vec::with_capacity(orders.len());

    for order in orders {
        if !emails.contains_key(&order.user_id) {
            let user = with_timeout(timeout, "users.find_by_id", state.users.find_by_id(order.user_id))
                .await
                .map_err(store_error_to_response)?;
            emails.insert(order.user_id, user.map(|u| u.email));
        }

        let mut items = Vec::with_capacity(order.items.len());
        for line in &order.items {
            if !titles.contains_key(&line.product_id) {
                let product =
                    with_timeout(timeout, "inventory.get", state.inventory.get(line.product_id))
                        .await
                        .map_err(store_error_to_response)?;
                titles.insert(line.product_id, product.map(|p| p.title));
            }
            items.push(OrderItemView {
                product_id: line.product_id,
                title: titles.get(&line.product_id).cloned().flatten(),
                quantity: line.quantity,
            });
        }

        views.push(OrderView {
            id: order.id,
            user: OrderUserView {
                id: order.user_id,
                email: emails.get(&order.user_id).cloned().flatten(),
            },
            items,
            total_cents: order.total_cents,
            status: order.status,
            created_at: order.created_at,
        });
    }
    Ok(views)
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "shop-server",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Create an account with role `user`
#[instrument(skip(state, request))]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .sessions
        .register(&request.email, &request.password, Role::User)
        .await
        .map_err(auth_error_to_response)?;
    Ok((StatusCode::CREATED, Json(UserView::from(user))))
}

/// Exchange credentials for a token pair
#[instrument(skip(state, request))]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    state
        .sessions
        .login(&request.email, &request.password)
        .await
        .map(Json)
        .map_err(auth_error_to_response)
}

/// Rotate a refresh token into a new pair
#[instrument(skip(state, request))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    state
        .sessions
        .refresh(&request.refresh_token)
        .await
        .map(Json)
        .map_err(auth_error_to_response)
}

/// Revoke the caller's access token and, optionally, their refresh token
#[instrument(skip(state, token, body), fields(user_id = %principal.user_id))]
pub async fn logout(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Extension(token): Extension<AccessToken>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let request: LogoutRequest = if body.iter().all(u8::is_ascii_whitespace) {
        LogoutRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Invalid logout body", 400).with_details(e.to_string())),
            )
        })?
    };

    state
        .sessions
        .logout(&token.0, request.refresh_token.as_deref())
        .await
        .map_err(auth_error_to_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Get products list
pub async fn list_products(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let products = with_timeout(state.config.store_timeout, "inventory.list", state.inventory.list())
        .await
        .map_err(store_error_to_response)?;
    Ok(Json(serde_json::json!({
        "products": products,
        "count": products.len()
    })))
}

/// Get single product
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Product>, ApiError> {
    with_timeout(state.config.store_timeout, "inventory.get", state.inventory.get(product_id))
        .await
        .map_err(store_error_to_response)?
        .map(Json)
        .ok_or_else(|| not_found(format!("product {product_id}")))
}

/// The caller's cart, priced at current prices
pub async fn get_cart(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<CartView>, ApiError> {
    state
        .carts
        .view(principal.user_id)
        .await
        .map(Json)
        .map_err(store_error_to_response)
}

/// Add a product to the caller's cart
#[instrument(skip(state, request), fields(user_id = %principal.user_id, product_id = %request.product_id))]
pub async fn add_cart_item(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(request): Json<AddCartItemRequest>,
) -> Result<Json<CartView>, ApiError> {
    state
        .carts
        .add_item(principal.user_id, request.product_id, request.quantity)
        .await
        .map(Json)
        .map_err(store_error_to_response)
}

/// Remove a product from the caller's cart
pub async fn remove_cart_item(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(product_id): Path<Uuid>,
) -> Result<Json<CartView>, ApiError> {
    state
        .carts
        .remove_item(principal.user_id, product_id)
        .await
        .map(Json)
        .map_err(store_error_to_response)
}

/// Turn the caller's cart into an order
#[instrument(skip(state), fields(user_id = %principal.user_id))]
pub async fn checkout(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<OrderView>, ApiError> {
    let order = state.checkout.checkout(principal.user_id).await.map_err(|e| {
        warn!("Checkout failed: {}", e);
        checkout_error_to_response(e)
    })?;

    let mut views = order_views(&state, vec![order]).await?;
    let view = views
        .pop()
        .ok_or_else(|| (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse::new("internal error", 500))))?;
    Ok(Json(view))
}

/// The caller's orders, newest first
pub async fn list_my_orders(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<Vec<OrderView>>, ApiError> {
    let orders = with_timeout(
        state.config.store_timeout,
        "orders.list_for_user",
        state.orders.list_for_user(principal.user_id),
    )
    .await
    .map_err(store_error_to_response)?;
    order_views(&state, orders).await.map(Json)
}

/// Every order, newest first (admin)
pub async fn admin_list_orders(State(state): State<AppState>) -> Result<Json<Vec<OrderView>>, ApiError> {
    let orders = with_timeout(state.config.store_timeout, "orders.list_all", state.orders.list_all())
        .await
        .map_err(store_error_to_response)?;
    order_views(&state, orders).await.map(Json)
}

/// Create a product (admin)
#[instrument(skip(state, request))]
pub async fn admin_create_product(
    State(state): State<AppState>,
    Json(request): Json<NewProduct>,
) -> Result<impl IntoResponse, ApiError> {
    let product = request.into_product().map_err(store_error_to_response)?;
    let product = with_timeout(state.config.store_timeout, "inventory.upsert", state.inventory.upsert(product))
        .await
        .map_err(store_error_to_response)?;
    info!(product_id = %product.id, "Created product");
    Ok((StatusCode::CREATED, Json(product)))
}

/// Update a product (admin)
#[instrument(skip(state, patch))]
pub async fn admin_update_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Json(patch): Json<ProductPatch>,
) -> Result<Json<Product>, ApiError> {
    let timeout = state.config.store_timeout;
    let mut product = with_timeout(timeout, "inventory.get", state.inventory.get(product_id))
        .await
        .map_err(store_error_to_response)?
        .ok_or_else(|| not_found(format!("product {product_id}")))?;

    patch.apply(&mut product);
    let product = with_timeout(timeout, "inventory.upsert", state.inventory.upsert(product))
        .await
        .map_err(store_error_to_response)?;
    info!(product_id = %product.id, stock = product.stock, "Updated product");
    Ok(Json(product))
}

/// Delete a product (admin)
#[instrument(skip(state))]
pub async fn admin_delete_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let deleted = with_timeout(state.config.store_timeout, "inventory.delete", state.inventory.delete(product_id))
        .await
        .map_err(store_error_to_response)?;
    if !deleted {
        return Err(not_found(format!("product {product_id}")));
    }
    info!(product_id = %product_id, "Deleted product");
    Ok(StatusCode::NO_CONTENT)
}
