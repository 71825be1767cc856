//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                     - Liveness
//! GET    /health/ready               - Database readiness
//!
//! # Catalog
//! GET    /api/products               - Listing / search (?q=&form=&limit=)
//! GET    /api/products/featured      - Featured shelf
//! GET    /api/products/{id_or_name}  - Product detail
//!
//! # Cart (session)
//! GET    /api/cart                   - Current cart
//! DELETE /api/cart                   - Clear cart
//! POST   /api/cart/items             - Add item
//! PATCH  /api/cart/items             - Set quantity (0 removes)
//! DELETE /api/cart/items/{ref}       - Remove item
//!
//! # Auth
//! POST   /api/auth/signup            - Validate form, send OTP
//! POST   /api/auth/signup/verify     - Verify OTP, create account, sign in
//! POST   /api/auth/login             - Sign in
//! POST   /api/auth/logout            - Sign out, clear cart
//! POST   /api/auth/password/forgot   - Send reset OTP
//! POST   /api/auth/password/reset    - Verify OTP, set password
//! GET    /api/session                - Status check (not counted as activity)
//! POST   /api/send-otp-email         - Deliver a caller-supplied code
//! POST   /api/contact                - Forward a contact form message
//!
//! # Checkout (requires auth)
//! POST   /api/checkout               - Create order + payment session
//! POST   /api/checkout/confirm       - Verify payment, mark order paid
//! GET    /api/orders                 - Order history
//!
//! # Payments
//! POST   /api/payments/create-order  - Remote order for an amount (requires auth)
//! POST   /api/payments/verify-payment - Signature check
//! POST   /api/payments/webhook       - Gateway reconciliation
//! ```

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod contact;
pub mod health;
pub mod notifications;
pub mod payments;
pub mod products;
pub mod session;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter, otp_rate_limiter};
use crate::state::AppState;

/// Health check routes (no session, no rate limiting).
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/featured", get(products::featured))
        .route("/{id_or_name}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add).patch(cart::update))
        .route("/items/{product_ref}", axum::routing::delete(cart::remove))
}

/// Create the auth routes router.
///
/// Endpoints that send email get the tighter OTP limiter.
pub fn auth_routes() -> Router<AppState> {
    let sends_email = Router::new()
        .route("/signup", post(auth::signup))
        .route("/password/forgot", post(auth::forgot_password))
        .layer(otp_rate_limiter());

    Router::new()
        .route("/signup/verify", post(auth::verify_signup))
        .route("/login", post(auth::login))
        .route("/password/reset", post(auth::reset_password))
        .layer(auth_rate_limiter())
        .merge(sends_email)
        .route("/logout", post(auth::logout))
}

/// Create the checkout and order routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/checkout", post(checkout::checkout))
        .route("/checkout/confirm", post(checkout::confirm))
        .route("/orders", get(checkout::orders))
}

/// Create the payment routes router.
///
/// The webhook is left out of rate limiting: its callers are the gateway's
/// servers and every delivery is signed.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/create-order", post(payments::create_order))
        .route("/verify-payment", post(payments::verify_payment))
        .layer(api_rate_limiter())
        .route("/webhook", post(payments::webhook))
}

/// Create all `/api` routes.
pub fn api_routes() -> Router<AppState> {
    let outbound_email = Router::new()
        .route("/send-otp-email", post(notifications::send_otp_email))
        .route("/contact", post(contact::send_message))
        .layer(otp_rate_limiter());

    Router::new()
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .route("/session", get(session::status))
        .merge(checkout_routes())
        .layer(api_rate_limiter())
        .nest("/auth", auth_routes())
        .nest("/payments", payment_routes())
        .merge(outbound_email)
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new().nest("/api", api_routes())
}
