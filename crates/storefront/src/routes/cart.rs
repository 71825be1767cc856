//! Cart route handlers.
//!
//! The cart is kept in the session, so anonymous visitors have one too.
//! Names and prices are copied from the catalog when a line is added.

use axum::{
    Json,
    extract::{Path, State},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use lifebiotech_core::ProductRef;

use crate::db::ProductRepository;
use crate::error::{AppError, Result};
use crate::models::{Cart, CartLine, session_keys};
use crate::state::AppState;

/// Cart as returned to the client.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub item_count: u32,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartLineView {
    #[serde(flatten)]
    pub line: CartLine,
    pub line_total: Decimal,
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            lines: cart
                .lines()
                .iter()
                .map(|line| CartLineView {
                    line: line.clone(),
                    line_total: line.line_total(),
                })
                .collect(),
            item_count: cart.item_count(),
            total: cart.total(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_ref: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

const fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub product_ref: String,
    pub quantity: u32,
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Load the cart from the session (empty when there is none).
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn load_cart(session: &Session) -> Result<Cart> {
    Ok(session
        .get::<Cart>(session_keys::CART)
        .await?
        .unwrap_or_default())
}

/// Store the cart in the session.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn save_cart(session: &Session, cart: &Cart) -> Result<()> {
    session.insert(session_keys::CART, cart).await?;
    Ok(())
}

// =============================================================================
// Handlers
// =============================================================================

pub async fn show(session: Session) -> Result<Json<CartView>> {
    let cart = load_cart(&session).await?;
    Ok(Json(CartView::from(&cart)))
}

/// Add a product to the cart.
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<CartView>> {
    let product_ref = ProductRef::new(req.product_ref.trim());
    if product_ref.as_str().is_empty() {
        return Err(AppError::BadRequest("product_ref is required".to_string()));
    }

    let product = ProductRepository::new(state.pool())
        .get_by_ref(&product_ref)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

    let mut cart = load_cart(&session).await?;
    cart.add(CartLine {
        product_ref,
        name: product.name,
        quantity: req.quantity,
        unit_price: product.price,
    })?;
    save_cart(&session, &cart).await?;

    crate::error::add_breadcrumb("cart", "Added item", None);
    Ok(Json(CartView::from(&cart)))
}

/// Set a line's quantity; zero removes it.
pub async fn update(session: Session, Json(req): Json<UpdateItemRequest>) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    cart.set_quantity(&ProductRef::new(req.product_ref.trim()), req.quantity)?;
    save_cart(&session, &cart).await?;
    Ok(Json(CartView::from(&cart)))
}

pub async fn remove(session: Session, Path(product_ref): Path<String>) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    cart.remove(&ProductRef::new(product_ref))?;
    save_cart(&session, &cart).await?;
    Ok(Json(CartView::from(&cart)))
}

pub async fn clear(session: Session) -> Result<Json<CartView>> {
    let cart = Cart::default();
    save_cart(&session, &cart).await?;
    Ok(Json(CartView::from(&cart)))
}
