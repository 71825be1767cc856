//! In-process tests for the storefront router.
//!
//! The pool is lazy and no session cookie is sent, so none of these
//! requests touch `PostgreSQL`.

use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use lifebiotech_integration_tests::{
    TEST_WEBHOOK_SECRET, checkout_signature, hmac_hex, json_body, request, test_app,
};

// ============================================================================
// Health & Middleware
// ============================================================================

#[tokio::test]
async fn test_health_has_request_id_and_security_headers() {
    let response = test_app()
        .oneshot(request(Method::GET, "/health", None))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert!(headers.contains_key("x-request-id"));
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let response = test_app()
        .oneshot(request(Method::GET, "/api/nope", None))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Session & Auth Guards
// ============================================================================

#[tokio::test]
async fn test_session_status_for_anonymous_visitor() {
    let response = test_app()
        .oneshot(request(Method::GET, "/api/session", None))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["authenticated"], false);
    assert!(body["user"].is_null());
    assert!(body["notice"].is_null());
    assert_eq!(body["cart_items"], 0);
    assert_eq!(body["idle_timeout_secs"], 240);
}

#[tokio::test]
async fn test_anonymous_cart_is_empty() {
    let response = test_app()
        .oneshot(request(Method::GET, "/api/cart", None))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["item_count"], 0);
    assert_eq!(body["lines"], json!([]));
}

#[tokio::test]
async fn test_checkout_requires_sign_in() {
    let shipping = json!({"address": "12 MG Road", "city": "Pune", "pincode": "411001"});
    let response = test_app()
        .oneshot(request(Method::POST, "/api/checkout", Some(&shipping)))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["code"], "unauthorized");
}

#[tokio::test]
async fn test_orders_require_sign_in() {
    let response = test_app()
        .oneshot(request(Method::GET, "/api/orders", None))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signup_verify_without_pending_signup() {
    let response = test_app()
        .oneshot(request(
            Method::POST,
            "/api/auth/signup/verify",
            Some(&json!({"otp": "482913"})),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
async fn test_unknown_form_filter_rejected() {
    let response = test_app()
        .oneshot(request(Method::GET, "/api/products?form=Powder", None))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// OTP Email
// ============================================================================

#[tokio::test]
async fn test_send_otp_email_requires_both_fields() {
    let response = test_app()
        .oneshot(request(
            Method::POST,
            "/api/send-otp-email",
            Some(&json!({"email": "buyer@example.com"})),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Email and OTP are required");
}

#[tokio::test]
async fn test_send_otp_email_without_provider() {
    let response = test_app()
        .oneshot(request(
            Method::POST,
            "/api/send-otp-email",
            Some(&json!({"email": "buyer@example.com", "otp": "482913"})),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Email service not configured");
}

// ============================================================================
// Contact Form
// ============================================================================

#[tokio::test]
async fn test_contact_missing_field_rejected() {
    let message = json!({
        "name": "Meera Iyer",
        "email": "meera@example.com",
        "message": "Do you ship to Goa?",
    });
    let response = test_app()
        .oneshot(request(Method::POST, "/api/contact", Some(&message)))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Name, email, subject and message are required");
}

#[tokio::test]
async fn test_contact_invalid_email_rejected() {
    let message = json!({
        "name": "Meera Iyer",
        "email": "meera-at-example",
        "subject": "Shipping",
        "message": "Do you ship to Goa?",
    });
    let response = test_app()
        .oneshot(request(Method::POST, "/api/contact", Some(&message)))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_contact_without_provider() {
    let message = json!({
        "name": "Meera Iyer",
        "email": "meera@example.com",
        "subject": "Shipping",
        "message": "Do you ship to Goa?",
    });
    let response = test_app()
        .oneshot(request(Method::POST, "/api/contact", Some(&message)))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Email service not configured");
}

// ============================================================================
// Payments
// ============================================================================

#[tokio::test]
async fn test_verify_payment_accepts_valid_signature() {
    let confirmation = json!({
        "razorpay_order_id": "order_Nx41",
        "razorpay_payment_id": "pay_Qa77",
        "razorpay_signature": checkout_signature("order_Nx41", "pay_Qa77"),
    });

    let response = test_app()
        .oneshot(request(
            Method::POST,
            "/api/payments/verify-payment",
            Some(&confirmation),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["verified"], true);
}

#[tokio::test]
async fn test_verify_payment_rejects_swapped_ids() {
    let confirmation = json!({
        "razorpay_order_id": "order_Nx41",
        "razorpay_payment_id": "pay_Qa77",
        "razorpay_signature": checkout_signature("pay_Qa77", "order_Nx41"),
    });

    let response = test_app()
        .oneshot(request(
            Method::POST,
            "/api/payments/verify-payment",
            Some(&confirmation),
        ))
        .await
        .expect("router responds");

    assert_eq!(json_body(response).await["verified"], false);
}

#[tokio::test]
async fn test_create_order_requires_sign_in() {
    let response = test_app()
        .oneshot(request(
            Method::POST,
            "/api/payments/create-order",
            Some(&json!({"amount": 499})),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_webhook_without_signature_rejected() {
    let event = json!({"event": "payment.captured", "payload": {}});
    let response = test_app()
        .oneshot(request(Method::POST, "/api/payments/webhook", Some(&event)))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_with_forged_signature_rejected() {
    let event = json!({"event": "payment.captured", "payload": {}});
    let mut req = request(Method::POST, "/api/payments/webhook", Some(&event));
    req.headers_mut().insert(
        "x-razorpay-signature",
        hmac_hex("not-the-secret", event.to_string().as_bytes())
            .parse()
            .expect("header value"),
    );

    let response = test_app().oneshot(req).await.expect("router responds");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_ignores_non_settlement_events() {
    let event = json!({
        "event": "payment.failed",
        "payload": {"payment": {"entity": {"id": "pay_1", "order_id": "order_1"}}}
    });
    let mut req = request(Method::POST, "/api/payments/webhook", Some(&event));
    req.headers_mut().insert(
        "x-razorpay-signature",
        hmac_hex(TEST_WEBHOOK_SECRET, event.to_string().as_bytes())
            .parse()
            .expect("header value"),
    );

    let response = test_app().oneshot(req).await.expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["received"], true);
}
