//! Checkout route handlers.
//!
//! Every route here except the gateway confirmation requires an
//! authenticated shopper; guests are sent to sign in first. The
//! confirmation endpoint is called back by the gateway and authenticates
//! itself with the payment signature instead.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use tamarind_core::{Money, PaymentMethod};

use crate::cart::{CartService, CartView};
use crate::checkout::CheckoutService;
use crate::db::customers::AddressInput;
use crate::db::{CustomerRepository, OrderRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{Order, ShippingAddress, session_keys};
use crate::payment::RazorpayClient;
use crate::state::AppState;

/// Checkout form fields, as submitted by the address page.
#[derive(Debug, Deserialize)]
pub struct AddressForm {
    pub full_name: String,
    pub email: Option<String>,
    pub address_line_1: String,
    pub address_line_2: Option<String>,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    /// Payment method chosen alongside the address, remembered in the
    /// session until the review step.
    pub payment_method: Option<String>,
}

/// Order summary shown before payment.
#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub order_id: tamarind_core::OrderId,
    pub cart: CartView,
    pub shipping_fee: Money,
    pub grand_total: Money,
    pub address: ShippingAddress,
    pub payment_method: Option<PaymentMethod>,
}

/// Gateway handoff payload for the browser-side payment widget.
#[derive(Debug, Serialize)]
pub struct HandoffResponse {
    pub gateway_order_id: String,
    pub amount_minor_units: i64,
    pub currency: tamarind_core::CurrencyCode,
    /// The gateway's public key id, needed to open the widget.
    pub key_id: String,
}

/// Confirmation parameters delivered by the gateway after payment.
#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

fn checkout_service<'a>(state: &'a AppState) -> CheckoutService<'a, RazorpayClient> {
    CheckoutService::new(
        state.pool(),
        state.gateway(),
        state.config().shipping_fee,
        state.config().currency,
    )
}

fn required(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!(
            "missing required field: {field}"
        )));
    }
    Ok(())
}

/// Save the shipping address (and optionally the payment method choice).
#[instrument(skip(state, session, form))]
pub async fn submit_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    Json(form): Json<AddressForm>,
) -> Result<Json<ShippingAddress>> {
    required(&form.full_name, "full_name")?;
    required(&form.address_line_1, "address_line_1")?;
    required(&form.city, "city")?;
    required(&form.state, "state")?;
    required(&form.zipcode, "zipcode")?;

    if let Some(ref raw) = form.payment_method {
        let method: PaymentMethod = raw.parse().map_err(AppError::Validation)?;
        session.insert(session_keys::PAYMENT_METHOD, method).await?;
    }

    let customer = CustomerRepository::new(state.pool()).ensure(&user).await?;
    let address = CustomerRepository::new(state.pool())
        .upsert_address(
            customer.id,
            &AddressInput {
                name: form.full_name,
                email: form.email,
                address: form.address_line_1,
                address2: form.address_line_2,
                city: form.city,
                state: form.state,
                zipcode: form.zipcode,
            },
        )
        .await?;

    Ok(Json(address))
}

/// The final review before payment: order, address and chosen method.
#[instrument(skip(state, session))]
pub async fn review(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
) -> Result<Json<ReviewResponse>> {
    let carts = CartService::new(state.pool(), state.catalog());
    let (customer, order) = carts.ensure_open_cart(&user).await?;

    let entries = OrderRepository::new(state.pool()).entries(order.id).await?;
    let cart = CartView::build(entries);

    let address = CustomerRepository::new(state.pool())
        .address_for(customer.id)
        .await?
        .ok_or_else(|| AppError::NotFound("no shipping address on file".to_owned()))?;

    let payment_method: Option<PaymentMethod> = session
        .get(session_keys::PAYMENT_METHOD)
        .await
        .ok()
        .flatten();

    let shipping_fee = state.config().shipping_fee;
    let grand_total = cart.subtotal + shipping_fee;

    Ok(Json(ReviewResponse {
        order_id: order.id,
        cart,
        shipping_fee,
        grand_total,
        address,
        payment_method,
    }))
}

/// Finalize the open cart as cash on delivery.
#[instrument(skip(state, session))]
pub async fn finalize_cod(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
) -> Result<Json<Order>> {
    let carts = CartService::new(state.pool(), state.catalog());
    let (_, order) = carts.ensure_open_cart(&user).await?;

    let finalized = checkout_service(&state).finalize_cod(order.id).await?;

    // The checkout flow is over; the remembered method choice goes with it.
    let _ = session
        .remove::<PaymentMethod>(session_keys::PAYMENT_METHOD)
        .await;

    Ok(Json(finalized))
}

/// Create the gateway order and hand its parameters to the client.
#[instrument(skip(state))]
pub async fn initiate_razorpay(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<HandoffResponse>> {
    let carts = CartService::new(state.pool(), state.catalog());
    let (_, order) = carts.ensure_open_cart(&user).await?;

    let handoff = checkout_service(&state)
        .initiate_gateway_payment(order.id)
        .await?;

    Ok(Json(HandoffResponse {
        gateway_order_id: handoff.gateway_order_id,
        amount_minor_units: handoff.amount_minor_units,
        currency: handoff.currency,
        key_id: state.gateway().key_id().to_owned(),
    }))
}

/// Apply the gateway's payment confirmation.
///
/// No session auth here: the gateway delivers this, and the signature is
/// the authentication. Redelivery of the same confirmation is a no-op
/// success.
#[instrument(skip(state, request))]
pub async fn confirm_razorpay(
    State(state): State<AppState>,
    Json(request): Json<ConfirmRequest>,
) -> Result<Json<Order>> {
    let order = checkout_service(&state)
        .confirm_gateway_payment(
            &request.razorpay_order_id,
            &request.razorpay_payment_id,
            &request.razorpay_signature,
        )
        .await?;

    Ok(Json(order))
}

/// The shopper's most recent finalized order (the confirmation page).
#[instrument(skip(state))]
pub async fn latest_order(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Order>> {
    let customer = CustomerRepository::new(state.pool()).ensure(&user).await?;
    let order = OrderRepository::new(state.pool())
        .latest_complete_for(customer.id)
        .await?
        .ok_or_else(|| AppError::NotFound("no completed orders yet".to_owned()))?;

    Ok(Json(order))
}
