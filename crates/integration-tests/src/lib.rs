//! Integration tests for the Life Biotech storefront.
//!
//! # Running Tests
//!
//! ```bash
//! # Router-level tests (no database or network needed)
//! cargo test -p lifebiotech-integration-tests
//!
//! # End-to-end tests against a running server and database
//! cargo test -p lifebiotech-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `api_router` - The full axum router driven in-process with `oneshot`.
//!   The database pool is lazy, so only endpoints that never reach
//!   `PostgreSQL` are exercised here.
//! - `idle_sign_out` - The idle guard end to end over an in-memory session
//!   store, with a one-second window.
//! - `live_storefront` - Signup, login, cart and checkout against a running
//!   server (`STOREFRONT_BASE_URL`), reading OTP codes straight from the
//!   database (`STOREFRONT_DATABASE_URL`).

#![allow(clippy::missing_panics_doc, clippy::expect_used)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, header},
};
use hmac::{Hmac, Mac};
use secrecy::SecretString;
use sha2::Sha256;
use sqlx::postgres::PgPoolOptions;

use lifebiotech_core::{CurrencyCode, DEFAULT_IDLE_WINDOW_SECS};
use lifebiotech_storefront::config::{OtpConfig, PaymentConfig, StorefrontConfig};
use lifebiotech_storefront::state::AppState;

/// Razorpay key secret used by [`test_config`].
pub const TEST_KEY_SECRET: &str = "Wq7eRt2yUi9oPa4sDf6gHj1k";

/// Razorpay webhook secret used by [`test_config`].
pub const TEST_WEBHOOK_SECRET: &str = "Zx8cVb3nMq5wEr7tYu1iOp0a";

const TEST_DATABASE_URL: &str = "postgres://localhost/lifebiotech_test";

/// A complete configuration with no email provider and no environment access.
#[must_use]
pub fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from(TEST_DATABASE_URL),
        host: "127.0.0.1".parse().expect("valid IP"),
        port: 3000,
        base_url: "http://localhost:3000".to_string(),
        cors_origin: None,
        payment: PaymentConfig {
            key_id: "rzp_test_Kq3vT9mLx2".to_string(),
            key_secret: SecretString::from(TEST_KEY_SECRET),
            webhook_secret: Some(SecretString::from(TEST_WEBHOOK_SECRET)),
            // Unroutable, so nothing leaves the machine
            api_url: "http://127.0.0.1:9".to_string(),
            currency: CurrencyCode::INR,
            merchant_name: "Life Biotech".to_string(),
        },
        email: None,
        otp: OtpConfig::default(),
        session_idle_timeout_secs: DEFAULT_IDLE_WINDOW_SECS,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// Application state over a pool that never connects.
#[must_use]
pub fn test_state(config: StorefrontConfig) -> AppState {
    let pool = PgPoolOptions::new()
        .connect_lazy(TEST_DATABASE_URL)
        .expect("valid database URL");
    AppState::new(config, pool).expect("state builds offline")
}

/// The full application router over a pool that never connects.
#[must_use]
pub fn test_app() -> Router {
    lifebiotech_storefront::app(test_state(test_config()))
}

/// A request from a fixed client address (the rate limiter keys on it).
#[must_use]
pub fn request(method: Method, uri: &str, body: Option<&serde_json::Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", "203.0.113.10");

    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("valid request")
}

/// Read a response body as JSON.
pub async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("readable body");
    serde_json::from_slice(&bytes).expect("JSON body")
}

/// `hex(HMAC-SHA256(secret, message))`.
#[must_use]
pub fn hmac_hex(secret: &str, message: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("any key length");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

/// Signature the hosted checkout returns for a completed payment.
#[must_use]
pub fn checkout_signature(order_id: &str, payment_id: &str) -> String {
    hmac_hex(TEST_KEY_SECRET, format!("{order_id}|{payment_id}").as_bytes())
}

/// Base URL of a running storefront for the ignored end-to-end tests.
#[must_use]
pub fn storefront_base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}
