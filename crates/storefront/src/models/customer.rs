//! Customer and shipping address models.

use serde::Serialize;
use sqlx::FromRow;

use tamarind_core::{AddressId, CustomerId, Email, UserId};

/// A store customer.
///
/// One-to-one with the identity provider's user reference; created lazily
/// on first cart access with the provider's display name and email as
/// defaults.
#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub id: CustomerId,
    pub user_ref: UserId,
    pub name: String,
    pub email: Email,
}

/// A customer's shipping address.
///
/// One logical address per customer; checkout upserts it in place.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ShippingAddress {
    pub id: AddressId,
    pub customer_id: CustomerId,
    pub name: String,
    pub email: Option<String>,
    pub address: String,
    pub address2: Option<String>,
    pub city: String,
    pub state: String,
    pub zipcode: String,
}
