//! # Authentication Middleware
//!
//! [`authenticate`] runs on every request and attaches a [`Principal`] when
//! the bearer token checks out. It never rejects; routes that need a caller
//! add [`require_principal`] or [`require_admin`] as a route layer, and
//! handlers read the caller through [`CurrentPrincipal`].

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use shop_auth::bearer_token;
use shop_core::Principal;
use tracing::{debug, warn};

use crate::handlers::ErrorResponse;
use crate::state::AppState;

/// The raw bearer token a request was authenticated with
#[derive(Debug, Clone)]
pub struct AccessToken(pub String);

/// Resolve the bearer token, if any, into a principal
pub async fn authenticate(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_owned);

    if let Some(token) = token {
        match state.authenticator.authenticate(&token).await {
            Ok(principal) => {
                req.extensions_mut().insert(principal);
                req.extensions_mut().insert(AccessToken(token));
            }
            Err(err) if err.is_token_failure() => {
                debug!(kind = err.kind(), path = %req.uri().path(), "Bearer token rejected");
            }
            Err(err) => {
                warn!(error = %err, "Could not authenticate bearer token");
            }
        }
    }

    next.run(req).await
}

/// Reject requests without a principal
pub async fn require_principal(req: Request, next: Next) -> Response {
    if req.extensions().get::<Principal>().is_none() {
        return unauthenticated().into_response();
    }
    next.run(req).await
}

/// Reject requests without an admin principal
pub async fn require_admin(req: Request, next: Next) -> Response {
    match req.extensions().get::<Principal>() {
        None => unauthenticated().into_response(),
        Some(principal) if !principal.is_admin() => (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::new("forbidden", 403)),
        )
            .into_response(),
        Some(_) => next.run(req).await,
    }
}

/// Bare 401; the failure kind is never revealed
pub fn unauthenticated() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new("unauthenticated", 401)),
    )
}

/// Extractor for the authenticated caller.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(CurrentPrincipal(principal): CurrentPrincipal) -> impl IntoResponse {
///     format!("Hello, {}!", principal.user_id)
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CurrentPrincipal(pub Principal);

impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .copied()
            .map(Self)
            .ok_or_else(unauthenticated)
    }
}
