//! Checkout completion: open cart in, finalized order out.
//!
//! Two paths finalize an order. Cash on delivery stamps a locally
//! generated transaction id and leaves the order pending; gateway payment
//! first hands off to the external processor and finalizes only on a
//! signature-verified confirmation. Both paths end in the same one-way,
//! one-time transition, and a repeated confirmation of the same payment is
//! a no-op success rather than a double finalize.

use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use tamarind_core::{CurrencyCode, Money, MoneyError, OrderId, OrderStatus, PaymentMethod};

use crate::cart::CartView;
use crate::db::{CustomerRepository, OrderRepository, RepositoryError};
use crate::models::Order;
use crate::payment::{GatewayError, PaymentGateway, SignatureError};

/// Errors surfaced by checkout. None of them leave a partially finalized
/// order behind.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    /// Finalize was attempted with no purchasable line items.
    #[error("cart has no purchasable items")]
    EmptyCart,

    /// Finalize was attempted with no shipping address on file.
    #[error("no shipping address on file")]
    MissingAddress,

    /// The order was already finalized with a different payment.
    #[error("order is already finalized")]
    AlreadyFinalized,

    /// No order matches the given identifier.
    #[error("order not found")]
    OrderNotFound,

    /// The confirmation's signature did not verify. The order has been
    /// marked payment-failed but remains open.
    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// The gateway call failed; nothing was mutated.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The amount could not be expressed in the gateway's minor units.
    #[error(transparent)]
    Amount(#[from] MoneyError),

    /// A storage operation failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Everything the client needs to drive the gateway's payment widget.
#[derive(Debug, Clone, serde::Serialize)]
pub struct GatewayHandoff {
    pub gateway_order_id: String,
    /// Amount in the gateway's minor-unit convention (×100).
    pub amount_minor_units: i64,
    pub currency: CurrencyCode,
}

/// The checkout flow over an injected payment gateway.
pub struct CheckoutService<'a, G> {
    pool: &'a PgPool,
    gateway: &'a G,
    shipping_fee: Money,
    currency: CurrencyCode,
}

impl<'a, G: PaymentGateway> CheckoutService<'a, G> {
    /// Create a new checkout service.
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        gateway: &'a G,
        shipping_fee: Money,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            pool,
            gateway,
            shipping_fee,
            currency,
        }
    }

    /// Subtotal plus the flat shipping fee.
    ///
    /// The fee is a configured constant, applied to every order; it is not
    /// derived from weight, distance or `requires_shipping`.
    #[must_use]
    pub fn total_with_shipping(&self, subtotal: Money) -> Money {
        subtotal + self.shipping_fee
    }

    /// Finalize an open order as cash on delivery.
    ///
    /// # Errors
    ///
    /// `EmptyCart` if nothing purchasable is on the order, `MissingAddress`
    /// if the customer has no shipping address, `AlreadyFinalized` if the
    /// order is complete. On error the order is unchanged.
    #[instrument(skip(self))]
    pub async fn finalize_cod(&self, order_id: OrderId) -> Result<Order, CheckoutError> {
        let orders = OrderRepository::new(self.pool);
        let (order, view) = self.payable_order(&orders, order_id).await?;

        let grand_total = self.total_with_shipping(view.subtotal);
        let transaction_id = format!("COD-{}-{}", order.id, Uuid::new_v4().simple());

        orders
            .finalize(
                order.id,
                &transaction_id,
                PaymentMethod::Cod,
                OrderStatus::Pending,
                grand_total,
            )
            .await?
            .ok_or(CheckoutError::AlreadyFinalized)
    }

    /// Create the gateway-side order for an open cart.
    ///
    /// Converts the grand total to minor units, asks the gateway to create
    /// its order, and records the returned identifier. Does not mark the
    /// order complete; a gateway error or timeout leaves the order exactly
    /// as it was.
    ///
    /// # Errors
    ///
    /// Same local guards as [`CheckoutService::finalize_cod`], plus
    /// `Gateway` for remote failures.
    #[instrument(skip(self))]
    pub async fn initiate_gateway_payment(
        &self,
        order_id: OrderId,
    ) -> Result<GatewayHandoff, CheckoutError> {
        let orders = OrderRepository::new(self.pool);
        let (order, view) = self.payable_order(&orders, order_id).await?;

        let grand_total = self.total_with_shipping(view.subtotal);
        let amount_minor_units = grand_total.to_minor_units()?;

        let gateway_order_id = self
            .gateway
            .create_order(amount_minor_units, self.currency, &order.id.to_string())
            .await?;

        orders.set_gateway_order(order.id, &gateway_order_id).await?;

        Ok(GatewayHandoff {
            gateway_order_id,
            amount_minor_units,
            currency: self.currency,
        })
    }

    /// Apply a gateway payment confirmation.
    ///
    /// Verifies the signature through the gateway's verification
    /// capability, then performs the one-way completion with the payment id
    /// as the transaction id. A failed verification records
    /// `PaymentFailed` and leaves the order open. Redelivery of an already
    /// applied confirmation (same payment id) returns the finalized order
    /// unchanged.
    ///
    /// # Errors
    ///
    /// `OrderNotFound` for an unknown gateway order id, `Signature` on
    /// verification failure, `AlreadyFinalized` if the order completed
    /// under a different payment.
    #[instrument(skip(self, signature))]
    pub async fn confirm_gateway_payment(
        &self,
        gateway_order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<Order, CheckoutError> {
        let orders = OrderRepository::new(self.pool);
        let order = orders
            .find_by_gateway_order(gateway_order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;

        if order.complete {
            return Self::already_complete(order, payment_id);
        }

        if let Err(err) = self
            .gateway
            .verify_signature(gateway_order_id, payment_id, signature)
        {
            tracing::warn!(order_id = %order.id, "payment confirmation failed verification");
            orders.mark_payment_failed(order.id).await?;
            return Err(err.into());
        }

        let view = CartView::build(orders.entries(order.id).await?);
        let grand_total = self.total_with_shipping(view.subtotal);

        match orders
            .finalize(
                order.id,
                payment_id,
                PaymentMethod::Razorpay,
                OrderStatus::Paid,
                grand_total,
            )
            .await?
        {
            Some(finalized) => Ok(finalized),
            // A concurrent delivery of the same confirmation beat us to the
            // update; fall back to the idempotency check.
            None => {
                let order = orders
                    .get(order.id)
                    .await?
                    .ok_or(CheckoutError::OrderNotFound)?;
                Self::already_complete(order, payment_id)
            }
        }
    }

    /// Load an order and its view, enforcing the shared finalize guards.
    async fn payable_order(
        &self,
        orders: &OrderRepository<'_>,
        order_id: OrderId,
    ) -> Result<(Order, CartView), CheckoutError> {
        let order = orders
            .get(order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;

        if order.complete {
            return Err(CheckoutError::AlreadyFinalized);
        }

        let view = CartView::build(orders.entries(order.id).await?);
        if view.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let address = CustomerRepository::new(self.pool)
            .address_for(order.customer_id)
            .await?;
        if address.is_none() {
            return Err(CheckoutError::MissingAddress);
        }

        Ok((order, view))
    }

    fn already_complete(order: Order, payment_id: &str) -> Result<Order, CheckoutError> {
        if order.transaction_id.as_deref() == Some(payment_id) {
            Ok(order)
        } else {
            Err(CheckoutError::AlreadyFinalized)
        }
    }
}
