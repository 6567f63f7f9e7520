//! Payment gateway boundary.
//!
//! The store never implements payment correctness itself: order creation
//! and signature verification are capabilities of the external gateway,
//! reached through the [`PaymentGateway`] trait. The production
//! implementation is [`razorpay::RazorpayClient`], injected once at
//! startup; tests substitute their own.

pub mod razorpay;

use thiserror::Error;

use tamarind_core::CurrencyCode;

pub use razorpay::RazorpayClient;

/// A remote gateway call failed. Nothing local has been mutated.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with a non-success status.
    #[error("gateway rejected the request (HTTP {status}): {body}")]
    Rejected {
        status: u16,
        /// Truncated response body, for diagnostics.
        body: String,
    },

    /// The gateway's response could not be understood.
    #[error("malformed gateway response: {0}")]
    Malformed(String),
}

/// A payment confirmation failed integrity verification.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("payment signature verification failed")]
pub struct SignatureError;

/// The external payment processor, as the checkout flow sees it.
pub trait PaymentGateway: Send + Sync {
    /// Create an order on the gateway for the given amount in minor units.
    ///
    /// Returns the gateway's order identifier. Must not mutate local state;
    /// errors and timeouts leave nothing to clean up.
    fn create_order(
        &self,
        amount_minor_units: i64,
        currency: CurrencyCode,
        receipt: &str,
    ) -> impl Future<Output = Result<String, GatewayError>> + Send;

    /// Verify a payment confirmation's signature.
    ///
    /// The MAC algorithm and payload layout are the gateway's contract;
    /// callers only rely on pass/fail.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError`] if the signature does not match.
    fn verify_signature(
        &self,
        gateway_order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<(), SignatureError>;
}
