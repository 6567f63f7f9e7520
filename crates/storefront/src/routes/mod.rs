//! HTTP route handlers for the storefront.
//!
//! The surface is JSON-only; page rendering belongs to the front end.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                     - Liveness check
//! GET    /health/ready               - Readiness check (pings the database)
//!
//! # Catalog
//! GET    /products                   - Product listing (?category=slug)
//! GET    /products/{id}              - Product detail
//! GET    /categories                 - Category listing
//!
//! # Cart (works signed-in or as guest)
//! GET    /cart                       - Unified cart view
//! GET    /cart/count                 - Item count for the navbar badge
//! POST   /cart/items                 - Set a product's quantity (0 removes)
//! DELETE /cart/items/{product_id}    - Remove a product
//!
//! # Identity hand-off
//! POST   /auth/session               - Store the provider-authenticated user
//! DELETE /auth/session               - Sign out
//!
//! # Checkout (requires auth; guest checkout is unsupported)
//! POST   /checkout/address           - Save shipping address + payment method
//! GET    /checkout/review            - Order summary before payment
//! POST   /checkout/cod               - Finalize as cash on delivery
//! POST   /checkout/razorpay          - Create the gateway order (handoff)
//! POST   /checkout/razorpay/confirm  - Signature-verified confirmation
//! GET    /orders/latest              - Most recent finalized order
//! ```

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod products;

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::state::AppState;

/// Create the catalog routes router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(products::list))
        .route("/products/{id}", get(products::show))
        .route("/categories", get(products::categories))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(cart::show))
        .route("/cart/count", get(cart::count))
        .route("/cart/items", post(cart::set_item))
        .route("/cart/items/{product_id}", delete(cart::remove_item))
}

/// Create the identity hand-off routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new().route(
        "/auth/session",
        post(auth::create_session).delete(auth::destroy_session),
    )
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/checkout/address", post(checkout::submit_address))
        .route("/checkout/review", get(checkout::review))
        .route("/checkout/cod", post(checkout::finalize_cod))
        .route("/checkout/razorpay", post(checkout::initiate_razorpay))
        .route("/checkout/razorpay/confirm", post(checkout::confirm_razorpay))
        .route("/orders/latest", get(checkout::latest_order))
}

/// Create the complete storefront router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(catalog_routes())
        .merge(cart_routes())
        .merge(auth_routes())
        .merge(checkout_routes())
}
