//! Razorpay payment broker.
//!
//! Creates remote orders through the Razorpay Orders API and checks the
//! signatures the hosted checkout and the webhook attach to their payloads.
//! The checkout widget itself runs in the browser; this module only hands it
//! the data it needs.

use std::future::Future;

use hmac::{Hmac, Mac};
use reqwest::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::instrument;

use lifebiotech_core::{CurrencyCode, Price, PriceError};

use crate::config::PaymentConfig;

type HmacSha256 = Hmac<Sha256>;

/// Description shown in the hosted checkout.
pub const CHECKOUT_DESCRIPTION: &str = "Purchase from Life Biotech";

/// Errors from the payment gateway.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with a non-success status.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// The gateway answered 2xx with a body we could not read.
    #[error("unexpected gateway response: {0}")]
    Parse(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] PriceError),

    #[error("payment webhook secret not configured")]
    WebhookNotConfigured,
}

/// A remote order created at the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    /// Amount in paise.
    pub amount: i64,
    pub currency: String,
}

/// The three values the hosted checkout posts back after a payment.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfirmation {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

/// Prefill block for the hosted checkout.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutPrefill {
    pub name: String,
    pub email: String,
}

/// Everything the browser needs to open the hosted checkout.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentSession {
    pub key: String,
    pub order_id: String,
    /// Amount in paise.
    pub amount: i64,
    pub currency: String,
    pub name: String,
    pub description: String,
    pub prefill: CheckoutPrefill,
    pub notes: serde_json::Value,
}

/// A payment gateway.
pub trait PaymentBroker: Send + Sync {
    /// Create a remote order for `amount`.
    fn create_order(
        &self,
        amount: &Price,
        receipt: &str,
        notes: &serde_json::Value,
    ) -> impl Future<Output = Result<GatewayOrder, PaymentError>> + Send;

    /// Check the signature returned by the hosted checkout.
    fn verify_payment(&self, confirmation: &PaymentConfirmation) -> bool;

    /// Public key id handed to the browser.
    fn key_id(&self) -> &str;

    /// Merchant name shown in the hosted checkout.
    fn merchant_name(&self) -> &str;

    fn currency(&self) -> CurrencyCode;
}

#[derive(Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    notes: &'a serde_json::Value,
}

/// Razorpay REST client.
#[derive(Clone)]
pub struct RazorpayClient {
    client: Client,
    api_url: String,
    key_id: String,
    key_secret: SecretString,
    webhook_secret: Option<SecretString>,
    currency: CurrencyCode,
    merchant_name: String,
}

impl std::fmt::Debug for RazorpayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayClient")
            .field("api_url", &self.api_url)
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .field("currency", &self.currency)
            .finish_non_exhaustive()
    }
}

impl RazorpayClient {
    /// Create a new Razorpay client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &PaymentConfig) -> Result<Self, PaymentError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
            webhook_secret: config.webhook_secret.clone(),
            currency: config.currency,
            merchant_name: config.merchant_name.clone(),
        })
    }

    /// Check the `X-Razorpay-Signature` header of a webhook delivery.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::WebhookNotConfigured` when no webhook secret is set.
    pub fn verify_webhook(&self, body: &[u8], signature: &str) -> Result<bool, PaymentError> {
        let secret = self
            .webhook_secret
            .as_ref()
            .ok_or(PaymentError::WebhookNotConfigured)?;
        Ok(verify_webhook_signature(secret, body, signature))
    }
}

impl PaymentBroker for RazorpayClient {
    #[instrument(skip(self, notes), fields(amount = %amount, receipt = %receipt))]
    async fn create_order(
        &self,
        amount: &Price,
        receipt: &str,
        notes: &serde_json::Value,
    ) -> Result<GatewayOrder, PaymentError> {
        let url = format!("{}/orders", self.api_url);
        let body = CreateOrderRequest {
            amount: amount.to_minor_units()?,
            currency: amount.currency_code.code(),
            receipt,
            notes,
        };

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = extract_error_message(status.as_u16(), &text);
            tracing::warn!(status = status.as_u16(), %message, "Razorpay create order failed");
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let order: GatewayOrder =
            serde_json::from_str(&text).map_err(|e| PaymentError::Parse(e.to_string()))?;
        tracing::info!(gateway_order_id = %order.id, "Razorpay order created");

        Ok(order)
    }

    fn verify_payment(&self, confirmation: &PaymentConfirmation) -> bool {
        verify_payment_signature(
            &self.key_secret,
            &confirmation.razorpay_order_id,
            &confirmation.razorpay_payment_id,
            &confirmation.razorpay_signature,
        )
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }

    fn merchant_name(&self) -> &str {
        &self.merchant_name
    }

    fn currency(&self) -> CurrencyCode {
        self.currency
    }
}

/// Turn a gateway error body into one readable message.
///
/// Looks at `message`, then a string `error`, then `error.description`, then
/// falls back to the JSON text. Non-JSON bodies give a status-only message.
#[must_use]
pub fn extract_error_message(status: u16, body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return format!("Create order failed with status {status}");
    };

    if let Some(message) = value.get("message").and_then(serde_json::Value::as_str) {
        return message.to_string();
    }

    match value.get("error") {
        Some(serde_json::Value::String(error)) => error.clone(),
        Some(error) => error
            .get("description")
            .and_then(serde_json::Value::as_str)
            .map_or_else(|| value.to_string(), str::to_string),
        None => value.to_string(),
    }
}

/// Check `hex(HMAC-SHA256(key_secret, order_id + "|" + payment_id))`.
#[must_use]
pub fn verify_payment_signature(
    key_secret: &SecretString,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(key_secret.expose_secret().as_bytes()) else {
        return false;
    };
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());

    let expected = hex::encode(mac.finalize().into_bytes());
    constant_time_compare(&expected, signature)
}

/// Check `hex(HMAC-SHA256(webhook_secret, raw_body))`.
#[must_use]
pub fn verify_webhook_signature(secret: &SecretString, body: &[u8], signature: &str) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.expose_secret().as_bytes()) else {
        return false;
    };
    mac.update(body);

    let expected = hex::encode(mac.finalize().into_bytes());
    constant_time_compare(&expected, signature)
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

/// Rupee amount from the create-order endpoint, checked and wrapped.
///
/// # Errors
///
/// Returns `PaymentError::InvalidAmount` for negative amounts and for
/// amounts that round to less than one minor unit.
pub fn checked_amount(amount: Decimal, currency: CurrencyCode) -> Result<Price, PaymentError> {
    let price = Price::new(amount, currency);
    if price.to_minor_units()? <= 0 {
        return Err(PaymentError::InvalidAmount(PriceError::NotPositive(amount)));
    }
    Ok(price)
}

// =============================================================================
// Webhooks
// =============================================================================

/// Webhook events that settle a payment.
pub const SETTLEMENT_EVENTS: &[&str] = &["payment.captured", "order.paid"];

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    pub payment: Option<EntityEnvelope<WebhookPayment>>,
}

#[derive(Debug, Deserialize)]
pub struct EntityEnvelope<T> {
    pub entity: T,
}

#[derive(Debug, Deserialize)]
pub struct WebhookPayment {
    pub id: String,
    pub order_id: Option<String>,
}

impl WebhookEvent {
    /// `(gateway_order_id, payment_id)` when this event settles a payment.
    #[must_use]
    pub fn settlement(&self) -> Option<(&str, &str)> {
        if !SETTLEMENT_EVENTS.contains(&self.event.as_str()) {
            return None;
        }
        let payment = &self.payload.payment.as_ref()?.entity;
        Some((payment.order_id.as_deref()?, payment.id.as_str()))
    }
}
