//! Order model.

use chrono::{DateTime, Utc};
use serde::Serialize;

use tamarind_core::{CustomerId, Money, OrderId, OrderStatus, PaymentMethod};

/// An order: the open cart while `complete` is false, a finalized receipt
/// once it flips.
///
/// The transition to `complete = true` happens exactly once, atomically
/// with the transaction id, payment method, status and grand total. Orders
/// are never deleted and never reopened.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub complete: bool,
    pub status: OrderStatus,
    pub payment_method: Option<PaymentMethod>,
    pub transaction_id: Option<String>,
    /// The gateway's own order identifier, present once a gateway payment
    /// has been initiated for this order.
    pub gateway_order_id: Option<String>,
    pub grand_total: Option<Money>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Whether this order is still a mutable cart.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        !self.complete
    }
}
