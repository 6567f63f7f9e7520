//! Razorpay gateway client.
//!
//! Order creation goes through the REST API with basic auth; confirmation
//! signatures are HMAC-SHA256 over `"{order_id}|{payment_id}"` keyed with
//! the API secret, delivered hex-encoded.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use tracing::instrument;

use tamarind_core::CurrencyCode;

use super::{GatewayError, PaymentGateway, SignatureError};
use crate::config::RazorpayConfig;

type HmacSha256 = Hmac<Sha256>;

/// Client for the Razorpay Orders API.
///
/// Cheaply cloneable; configured once at process start.
#[derive(Clone)]
pub struct RazorpayClient {
    inner: Arc<RazorpayClientInner>,
}

struct RazorpayClientInner {
    client: reqwest::Client,
    api_base: String,
    key_id: String,
    key_secret: SecretString,
}

#[derive(Deserialize)]
struct CreatedOrder {
    id: String,
}

impl RazorpayClient {
    /// Create a new client from configuration.
    #[must_use]
    pub fn new(config: &RazorpayConfig) -> Self {
        Self {
            inner: Arc::new(RazorpayClientInner {
                client: reqwest::Client::new(),
                api_base: config.api_base.trim_end_matches('/').to_owned(),
                key_id: config.key_id.clone(),
                key_secret: config.key_secret.clone(),
            }),
        }
    }

    /// The public key id, needed by the browser-side payment widget.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.inner.key_id
    }
}

impl PaymentGateway for RazorpayClient {
    #[instrument(skip(self), fields(amount = amount_minor_units))]
    async fn create_order(
        &self,
        amount_minor_units: i64,
        currency: CurrencyCode,
        receipt: &str,
    ) -> Result<String, GatewayError> {
        let url = format!("{}/v1/orders", self.inner.api_base);
        let body = serde_json::json!({
            "amount": amount_minor_units,
            "currency": currency.as_str(),
            "receipt": receipt,
            "payment_capture": 1,
        });

        let response = self
            .inner
            .client
            .post(&url)
            .basic_auth(
                &self.inner.key_id,
                Some(self.inner.key_secret.expose_secret()),
            )
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %text.chars().take(500).collect::<String>(),
                "Razorpay order creation failed"
            );
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body: text.chars().take(200).collect(),
            });
        }

        let order: CreatedOrder = serde_json::from_str(&text)
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;
        Ok(order.id)
    }

    fn verify_signature(
        &self,
        gateway_order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<(), SignatureError> {
        verify_hmac(
            self.inner.key_secret.expose_secret().as_bytes(),
            gateway_order_id,
            payment_id,
            signature,
        )
    }
}

/// Check a hex-encoded HMAC-SHA256 signature over `"{order_id}|{payment_id}"`.
///
/// The comparison is constant-time via `Mac::verify_slice`.
fn verify_hmac(
    secret: &[u8],
    gateway_order_id: &str,
    payment_id: &str,
    signature: &str,
) -> Result<(), SignatureError> {
    let provided = hex::decode(signature).map_err(|_| SignatureError)?;

    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|_| SignatureError)?;
    mac.update(gateway_order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    mac.verify_slice(&provided).map_err(|_| SignatureError)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test_key_secret";

    fn sign(order_id: &str, payment_id: &str, secret: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(format!("{order_id}|{payment_id}").as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_valid_signature_accepted() {
        let signature = sign("order_abc", "pay_123", SECRET);
        assert_eq!(
            verify_hmac(SECRET, "order_abc", "pay_123", &signature),
            Ok(())
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let signature = sign("order_abc", "pay_123", b"some_other_secret");
        assert_eq!(
            verify_hmac(SECRET, "order_abc", "pay_123", &signature),
            Err(SignatureError)
        );
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let signature = sign("order_abc", "pay_123", SECRET);
        assert_eq!(
            verify_hmac(SECRET, "order_abc", "pay_999", &signature),
            Err(SignatureError)
        );
    }

    #[test]
    fn test_non_hex_signature_rejected() {
        assert_eq!(
            verify_hmac(SECRET, "order_abc", "pay_123", "not hex at all"),
            Err(SignatureError)
        );
    }
}
