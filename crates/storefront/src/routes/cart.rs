//! Cart route handlers.
//!
//! One surface for both backends: signed-in shoppers hit the database
//! cart, guests hit the cookie cart. Guest mutations answer with a
//! `Set-Cookie` carrying the re-encoded cart; the view itself is identical
//! either way.

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, header},
    response::{AppendHeaders, IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use tamarind_core::ProductId;

use crate::cart::{CartOutcome, CartService, CartView, ShopperIdentity};
use crate::error::{AppError, Result};
use crate::middleware::OptionalAuth;
use crate::models::CurrentUser;
use crate::state::AppState;

/// Name of the guest cart cookie.
const CART_COOKIE_NAME: &str = "cart";

/// Guest cart cookie lifetime (30 days).
const CART_COOKIE_MAX_AGE_SECONDS: i64 = 30 * 24 * 60 * 60;

/// Resolve the shopper identity for this request.
fn identity(user: Option<CurrentUser>, headers: &HeaderMap) -> ShopperIdentity {
    user.map_or_else(
        || ShopperIdentity::Guest {
            cart_cookie: read_cart_cookie(headers),
        },
        ShopperIdentity::Customer,
    )
}

/// Pull the raw guest cart cookie out of the Cookie header, if present.
///
/// The value is opaque here; the codec tolerates anything.
fn read_cart_cookie(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        (name.trim() == CART_COOKIE_NAME).then(|| value.trim().to_owned())
    })
}

/// Build the `Set-Cookie` value persisting a guest cart back to the client.
fn cart_set_cookie(encoded: &str) -> String {
    format!("{CART_COOKIE_NAME}={encoded}; Path=/; Max-Age={CART_COOKIE_MAX_AGE_SECONDS}; SameSite=Lax")
}

/// Turn a mutation outcome into a response, attaching the cookie for guests.
fn outcome_response(outcome: CartOutcome) -> Response {
    match outcome.cookie {
        Some(encoded) => (
            AppendHeaders([(header::SET_COOKIE, cart_set_cookie(&encoded))]),
            Json(outcome.view),
        )
            .into_response(),
        None => Json(outcome.view).into_response(),
    }
}

/// Set-quantity request body.
#[derive(Debug, Deserialize)]
pub struct SetItemRequest {
    pub product_id: i32,
    /// Zero or negative removes the item.
    pub quantity: i64,
}

/// Unified cart view.
#[instrument(skip(state, user, headers))]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    headers: HeaderMap,
) -> Result<Json<CartView>> {
    let identity = identity(user, &headers);
    let view = CartService::new(state.pool(), state.catalog())
        .view(&identity)
        .await?;
    Ok(Json(view))
}

/// Item count for the navbar badge.
#[instrument(skip(state, user, headers))]
pub async fn count(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>> {
    let identity = identity(user, &headers);
    let view = CartService::new(state.pool(), state.catalog())
        .view(&identity)
        .await?;
    Ok(Json(json!({ "cart_items": view.item_count })))
}

/// Set a product's quantity in the cart.
#[instrument(skip(state, user, headers))]
pub async fn set_item(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    headers: HeaderMap,
    Json(request): Json<SetItemRequest>,
) -> Result<Response> {
    // Anything at or below zero is a removal.
    let quantity = u32::try_from(request.quantity.max(0))
        .map_err(|_| AppError::Validation("quantity out of range".to_owned()))?;
    let product_id = ProductId::new(request.product_id);

    // Adding or changing an item requires the product to exist right now;
    // entries that go stale later degrade at view time instead.
    if quantity > 0 && state.catalog().get(product_id).await?.is_none() {
        return Err(AppError::NotFound(format!("product {product_id}")));
    }

    let identity = identity(user, &headers);
    let outcome = CartService::new(state.pool(), state.catalog())
        .set_quantity(&identity, product_id, quantity)
        .await?;
    Ok(outcome_response(outcome))
}

/// Remove a product from the cart.
#[instrument(skip(state, user, headers))]
pub async fn remove_item(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    headers: HeaderMap,
    Path(product_id): Path<i32>,
) -> Result<Response> {
    let identity = identity(user, &headers);
    let outcome = CartService::new(state.pool(), state.catalog())
        .remove(&identity, ProductId::new(product_id))
        .await?;
    Ok(outcome_response(outcome))
}
