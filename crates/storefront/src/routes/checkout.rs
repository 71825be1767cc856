//! Checkout and order history handlers (require sign-in).

use axum::{Json, extract::State};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use lifebiotech_core::OrderId;

use crate::db::orders::OrderWithItems;
use crate::db::{OrderRepository, ProductRepository};
use crate::error::{Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::{Cart, ShippingAddress};
use crate::routes::cart::{load_cart, save_cart};
use crate::services::checkout::{CheckoutOutcome, CheckoutService, ConfirmedPayment};
use crate::services::payment::{PaymentConfirmation, RazorpayClient};
use crate::state::AppState;

/// Body of `POST /api/checkout/confirm`.
#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub order_id: OrderId,
    #[serde(flatten)]
    pub payment: PaymentConfirmation,
}

fn service(
    state: &AppState,
) -> CheckoutService<'_, ProductRepository<'_>, OrderRepository<'_>, RazorpayClient> {
    CheckoutService::new(
        ProductRepository::new(state.pool()),
        OrderRepository::new(state.pool()),
        state.payments(),
    )
}

/// Turn the session cart into an order and open a payment session.
///
/// The cart is kept until the payment is confirmed.
#[instrument(skip(state, session, user, shipping), fields(user_id = %user.id))]
pub async fn checkout(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    Json(shipping): Json<ShippingAddress>,
) -> Result<Json<CheckoutOutcome>> {
    let cart = load_cart(&session).await?;
    let outcome = service(&state).checkout(&user, &cart, shipping).await?;

    let order_id = outcome.order_id.to_string();
    add_breadcrumb(
        "checkout",
        "Payment session opened",
        Some(&[("order_id", order_id.as_str())]),
    );
    Ok(Json(outcome))
}

/// Verify the hosted checkout's result, mark the order paid and empty the cart.
#[instrument(skip(state, session, user, req), fields(user_id = %user.id, order_id = %req.order_id))]
pub async fn confirm(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<ConfirmedPayment>> {
    let confirmed = service(&state)
        .confirm_payment(user.id, req.order_id, &req.payment)
        .await?;

    save_cart(&session, &Cart::default()).await?;
    Ok(Json(confirmed))
}

/// The caller's orders with their items, newest first.
pub async fn orders(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<OrderWithItems>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(Json(orders))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_confirm_request_flattens_gateway_fields() {
        let req: ConfirmRequest = serde_json::from_str(
            r#"{
                "order_id": "6f1c1e1a-3b5d-4c7e-9f00-1a2b3c4d5e6f",
                "razorpay_order_id": "order_abc",
                "razorpay_payment_id": "pay_xyz",
                "razorpay_signature": "deadbeef"
            }"#,
        )
        .unwrap();

        assert_eq!(req.order_id.to_string(), "6f1c1e1a-3b5d-4c7e-9f00-1a2b3c4d5e6f");
        assert_eq!(req.payment.razorpay_order_id, "order_abc");
        assert_eq!(req.payment.razorpay_payment_id, "pay_xyz");
    }
}
