//! Payment gateway endpoints.
//!
//! `create-order` and `verify-payment` are thin wrappers over the gateway
//! client for callers that manage their own orders. The webhook settles
//! orders whose browser-side confirmation never arrived.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::services::checkout::OrderStore;
use crate::services::payment::{PaymentBroker, PaymentConfirmation, WebhookEvent, checked_amount};
use crate::state::AppState;

/// Header carrying the webhook signature.
pub const WEBHOOK_SIGNATURE_HEADER: &str = "x-razorpay-signature";

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    /// Amount in rupees.
    pub amount: Decimal,
    pub receipt: Option<String>,
    #[serde(default)]
    pub notes: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub order_id: String,
    pub currency: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyPaymentResponse {
    pub verified: bool,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

fn default_receipt() -> String {
    format!("rcpt_{}", Uuid::new_v4().simple())
}

/// Create a remote order for an arbitrary amount.
#[instrument(skip(state, user, req), fields(user_id = %user.id, amount = %req.amount))]
pub async fn create_order(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Json<CreateOrderResponse>> {
    let payments = state.payments();
    let amount = checked_amount(req.amount, payments.currency())?;
    let receipt = req
        .receipt
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(default_receipt);
    let notes = if req.notes.is_null() {
        serde_json::json!({})
    } else {
        req.notes
    };

    let order = payments.create_order(&amount, &receipt, &notes).await?;

    Ok(Json(CreateOrderResponse {
        order_id: order.id,
        currency: order.currency,
    }))
}

/// Check a hosted checkout signature without touching any order.
pub async fn verify_payment(
    State(state): State<AppState>,
    Json(confirmation): Json<PaymentConfirmation>,
) -> Json<VerifyPaymentResponse> {
    Json(VerifyPaymentResponse {
        verified: state.payments().verify_payment(&confirmation),
    })
}

/// Gateway reconciliation webhook.
///
/// Settlement events mark the matching pending order paid. Replays are
/// harmless since only pending orders are updated.
#[instrument(skip_all)]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    let signature = headers
        .get(WEBHOOK_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing webhook signature".to_string()))?;

    if !state.payments().verify_webhook(&body, signature)? {
        tracing::warn!("Webhook signature rejected");
        return Err(AppError::BadRequest("Invalid webhook signature".to_string()));
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {e}")))?;

    let Some((gateway_order_id, payment_id)) = event.settlement() else {
        tracing::debug!(event = %event.event, "Ignoring webhook event");
        return Ok(Json(WebhookAck { received: true }));
    };

    match OrderRepository::new(state.pool())
        .mark_paid_by_gateway_order(gateway_order_id, payment_id)
        .await?
    {
        Some(order_id) => tracing::info!(%order_id, event = %event.event, "Order settled by webhook"),
        None => tracing::debug!(gateway_order_id, "No pending order for webhook event"),
    }

    Ok(Json(WebhookAck { received: true }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_create_order_request_accepts_numeric_amount() {
        let req: CreateOrderRequest =
            serde_json::from_str(r#"{"amount": 499.5, "receipt": "r1"}"#).unwrap();
        assert_eq!(req.amount, Decimal::from_str("499.5").unwrap());
        assert!(req.notes.is_null());
    }

    #[test]
    fn test_create_order_response_is_camel_case() {
        let body = serde_json::to_value(CreateOrderResponse {
            order_id: "order_1".to_string(),
            currency: "INR".to_string(),
        })
        .unwrap();
        assert_eq!(body["orderId"], "order_1");
        assert_eq!(body["currency"], "INR");
    }

    #[test]
    fn test_default_receipt_fits_gateway_limit() {
        assert!(default_receipt().len() <= 40);
    }
}
