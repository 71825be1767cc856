//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Responses are JSON: `{"error": string, "code"?: string, "details"?: any}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::models::CartError;
use crate::services::auth::AuthError;
use crate::services::checkout::CheckoutError;
use crate::services::email::NotificationError;
use crate::services::otp::OtpError;
use crate::services::payment::PaymentError;

/// Message shown when a session ends because of inactivity.
pub const SESSION_EXPIRED_MESSAGE: &str =
    "You have been logged out due to inactivity. Please sign in again.";

const INTERNAL_MESSAGE: &str = "Internal server error";

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// OTP issuance or verification failed.
    #[error("OTP error: {0}")]
    Otp(#[from] OtpError),

    /// Checkout or payment confirmation failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Payment gateway call failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Email delivery failed.
    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    /// Cart mutation rejected.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Session store failure.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The signed-in session ran out its idle window.
    #[error("Session expired")]
    SessionExpired,

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl ErrorBody {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
            details: None,
        }
    }

    const fn code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    fn details(mut self, details: Option<serde_json::Value>) -> Self {
        self.details = details;
        self
    }

    fn internal() -> Self {
        Self::new(INTERNAL_MESSAGE)
    }
}

impl AppError {
    fn status_and_body(&self) -> (StatusCode, ErrorBody) {
        match self {
            Self::Database(err) => repository_parts(err),
            Self::Auth(err) => auth_parts(err),
            Self::Otp(err) => otp_parts(err),
            Self::Checkout(err) => checkout_parts(err),
            Self::Payment(err) => payment_parts(err),
            Self::Notification(err) => notification_parts(err),
            Self::Cart(CartError::LineNotFound) => {
                (StatusCode::NOT_FOUND, ErrorBody::new(CartError::LineNotFound.to_string()))
            }
            Self::Cart(err) => (StatusCode::BAD_REQUEST, ErrorBody::new(err.to_string())),
            Self::Session(_) | Self::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::internal())
            }
            Self::NotFound(what) => (StatusCode::NOT_FOUND, ErrorBody::new(format!("{what} not found"))),
            Self::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                ErrorBody::new(msg.clone()).code("unauthorized"),
            ),
            Self::SessionExpired => (
                StatusCode::UNAUTHORIZED,
                ErrorBody::new(SESSION_EXPIRED_MESSAGE).code("session_expired"),
            ),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorBody::new(msg.clone())),
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                ErrorBody::new("Too many requests").code("rate_limited"),
            ),
        }
    }
}

fn repository_parts(err: &RepositoryError) -> (StatusCode, ErrorBody) {
    match err {
        RepositoryError::NotFound => (StatusCode::NOT_FOUND, ErrorBody::new("Not found")),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::internal()),
    }
}

fn auth_parts(err: &AuthError) -> (StatusCode, ErrorBody) {
    match err {
        AuthError::InvalidEmail(_)
        | AuthError::InvalidName { .. }
        | AuthError::WeakPassword(_)
        | AuthError::PasswordMismatch
        | AuthError::NoPendingSignup => (StatusCode::BAD_REQUEST, ErrorBody::new(err.to_string())),
        AuthError::InvalidCredentials => (
            StatusCode::UNAUTHORIZED,
            ErrorBody::new(err.to_string()).code("invalid_credentials"),
        ),
        AuthError::UserAlreadyExists => (
            StatusCode::CONFLICT,
            ErrorBody::new(err.to_string()).code("user_exists"),
        ),
        AuthError::Otp(otp) => otp_parts(otp),
        AuthError::Repository(repo) => repository_parts(repo),
        AuthError::PasswordHash => (StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::internal()),
    }
}

fn otp_parts(err: &OtpError) -> (StatusCode, ErrorBody) {
    match err {
        OtpError::InvalidOrExpired => (
            StatusCode::BAD_REQUEST,
            ErrorBody::new(err.to_string()).code("invalid_otp"),
        ),
        OtpError::ResendTooSoon { retry_after_secs } => (
            StatusCode::TOO_MANY_REQUESTS,
            ErrorBody::new(err.to_string())
                .code("otp_resend_too_soon")
                .details(Some(serde_json::json!({ "retry_after_secs": retry_after_secs }))),
        ),
        OtpError::Delivery(delivery) => notification_parts(delivery),
        OtpError::Repository(repo) => repository_parts(repo),
    }
}

fn notification_parts(err: &NotificationError) -> (StatusCode, ErrorBody) {
    match err {
        NotificationError::NotConfigured => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody::new(err.to_string()),
        ),
        NotificationError::Http(_) => (
            StatusCode::BAD_GATEWAY,
            ErrorBody::new("Failed to send email"),
        ),
        NotificationError::Api {
            message, details, ..
        } => (
            StatusCode::BAD_GATEWAY,
            ErrorBody::new(message.clone()).details(details.clone()),
        ),
        NotificationError::Template(_) | NotificationError::Config(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::internal())
        }
    }
}

fn payment_parts(err: &PaymentError) -> (StatusCode, ErrorBody) {
    match err {
        PaymentError::Http(_) => (
            StatusCode::BAD_GATEWAY,
            ErrorBody::new("Payment service unavailable"),
        ),
        PaymentError::Api { message, .. } => {
            (StatusCode::BAD_GATEWAY, ErrorBody::new(message.clone()))
        }
        PaymentError::Parse(_) => (
            StatusCode::BAD_GATEWAY,
            ErrorBody::new("Unexpected response from payment service"),
        ),
        PaymentError::InvalidAmount(_) => (
            StatusCode::BAD_REQUEST,
            ErrorBody::new("Amount must be a positive number of rupees"),
        ),
        PaymentError::WebhookNotConfigured => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody::new("Payment webhook not configured"),
        ),
    }
}

fn checkout_parts(err: &CheckoutError) -> (StatusCode, ErrorBody) {
    match err {
        CheckoutError::EmptyCart
        | CheckoutError::InvalidShipping(_)
        | CheckoutError::InvalidQuantity { .. } => {
            (StatusCode::BAD_REQUEST, ErrorBody::new(err.to_string()))
        }
        CheckoutError::ProductNotFound(_) => (
            StatusCode::NOT_FOUND,
            ErrorBody::new(err.to_string()).code("product_not_found"),
        ),
        CheckoutError::OrderNotFound => (StatusCode::NOT_FOUND, ErrorBody::new(err.to_string())),
        CheckoutError::GatewayOrderMismatch | CheckoutError::VerificationFailed => (
            StatusCode::BAD_REQUEST,
            ErrorBody::new(err.to_string()).code("payment_verification_failed"),
        ),
        CheckoutError::Payment(payment) => payment_parts(payment),
        CheckoutError::Repository(repo) => repository_parts(repo),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();

        // Capture server and upstream errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::NotFound("Product".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(get_status(AppError::RateLimited), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(CheckoutError::VerificationFailed.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AuthError::UserAlreadyExists.into()),
            StatusCode::CONFLICT
        );
    }

    #[tokio::test]
    async fn test_invalid_otp_body() {
        let (status, body) = render(OtpError::InvalidOrExpired.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid or expired OTP");
        assert_eq!(body["code"], "invalid_otp");
    }

    #[tokio::test]
    async fn test_email_not_configured_body() {
        let (status, body) = render(NotificationError::NotConfigured.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Email service not configured");
        assert!(body.get("code").is_none());
    }

    #[tokio::test]
    async fn test_upstream_email_error_carries_details() {
        let err = NotificationError::Api {
            status: 422,
            message: "Invalid `to` field.".to_string(),
            details: Some(serde_json::json!({"name": "validation_error"})),
        };
        let (status, body) = render(err.into()).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Invalid `to` field.");
        assert_eq!(body["details"]["name"], "validation_error");
    }

    #[tokio::test]
    async fn test_session_expired_body() {
        let (status, body) = render(AppError::SessionExpired).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "session_expired");
        assert_eq!(body["error"], SESSION_EXPIRED_MESSAGE);
    }

    #[tokio::test]
    async fn test_database_error_is_hidden() {
        let err = RepositoryError::DataCorruption("bad email in row 7".to_string());
        let (status, body) = render(err.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn test_resend_too_soon_details() {
        let (status, body) = render(OtpError::ResendTooSoon { retry_after_secs: 42 }.into()).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["code"], "otp_resend_too_soon");
        assert_eq!(body["details"]["retry_after_secs"], 42);
    }
}
