//! Status enums for orders and payments.

use serde::{Deserialize, Serialize};

/// How a finalized order was (or will be) paid.
///
/// Stored as text in the database; see `Display`/`FromStr` for the wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash on delivery, settled offline.
    Cod,
    /// Paid online through the Razorpay gateway.
    Razorpay,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cod => write!(f, "cod"),
            Self::Razorpay => write!(f, "razorpay"),
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cod" => Ok(Self::Cod),
            "razorpay" => Ok(Self::Razorpay),
            _ => Err(format!("invalid payment method: {s}")),
        }
    }
}

/// Lifecycle status of an order.
///
/// An order starts `Open` (the mutable cart), and moves exactly once to
/// `Pending` (cash on delivery) or `Paid` (gateway-confirmed). A failed
/// gateway confirmation records `PaymentFailed` while the order stays open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Still a cart; line items may change.
    #[default]
    Open,
    /// Finalized, awaiting offline payment.
    Pending,
    /// Finalized and paid through the gateway.
    Paid,
    /// A gateway confirmation failed verification; the cart remains open.
    PaymentFailed,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Pending => write!(f, "pending"),
            Self::Paid => write!(f, "paid"),
            Self::PaymentFailed => write!(f, "payment_failed"),
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "payment_failed" => Ok(Self::PaymentFailed),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_method_roundtrip() {
        for method in [PaymentMethod::Cod, PaymentMethod::Razorpay] {
            let parsed: PaymentMethod = method.to_string().parse().unwrap();
            assert_eq!(parsed, method);
        }
        assert!("upi".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_order_status_roundtrip() {
        for status in [
            OrderStatus::Open,
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::PaymentFailed,
        ] {
            let parsed: OrderStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("refunded".parse::<OrderStatus>().is_err());
    }
}
