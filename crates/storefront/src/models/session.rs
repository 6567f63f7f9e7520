//! Session-related types.
//!
//! Types stored in the session for authentication and checkout state.

use serde::{Deserialize, Serialize};

use tamarind_core::{Email, UserId};

/// Session-stored user identity.
///
/// Minimal data handed over by the identity provider: a stable user
/// reference plus the profile defaults used when a Customer record is
/// created lazily.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// The identity provider's stable user reference.
    pub user_ref: UserId,
    /// Display name, used as the default customer name.
    pub name: String,
    /// Email address, used as the default customer email.
    pub email: Email,
}

/// Session keys for authentication and checkout data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the payment method chosen on the checkout page.
    pub const PAYMENT_METHOD: &str = "payment_method";
}
