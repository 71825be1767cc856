//! Session-held shopping cart.
//!
//! The cart lives in the server-side session, so it serializes. Lines keep
//! the product reference exactly as the client supplied it; checkout
//! re-resolves every line against the catalog before anything is written.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use lifebiotech_core::ProductRef;

/// Upper bound on a single line's quantity.
pub const MAX_LINE_QUANTITY: u32 = 99;

/// Errors from cart mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("Quantity must be at least 1")]
    QuantityTooLow,
    #[error("Quantity cannot exceed {MAX_LINE_QUANTITY}")]
    QuantityTooHigh,
    #[error("Item is not in the cart")]
    LineNotFound,
}

/// One line of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_ref: ProductRef,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl CartLine {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// The shopping cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Sum of all line totals in rupees.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Add `line`, merging with an existing line for the same reference.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the quantity is zero or the merged quantity
    /// exceeds [`MAX_LINE_QUANTITY`].
    pub fn add(&mut self, line: CartLine) -> Result<(), CartError> {
        validate_quantity(line.quantity)?;

        if let Some(existing) = self
            .lines
            .iter_mut()
            .find(|l| l.product_ref == line.product_ref)
        {
            let merged = existing.quantity.saturating_add(line.quantity);
            validate_quantity(merged)?;
            existing.quantity = merged;
            existing.name = line.name;
            existing.unit_price = line.unit_price;
            return Ok(());
        }

        self.lines.push(line);
        Ok(())
    }

    /// Set the quantity of an existing line. Zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the reference is not in the cart,
    /// or `CartError::QuantityTooHigh` above [`MAX_LINE_QUANTITY`].
    pub fn set_quantity(&mut self, product_ref: &ProductRef, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return self.remove(product_ref);
        }
        validate_quantity(quantity)?;

        let line = self
            .lines
            .iter_mut()
            .find(|l| &l.product_ref == product_ref)
            .ok_or(CartError::LineNotFound)?;
        line.quantity = quantity;
        Ok(())
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the reference is not in the cart.
    pub fn remove(&mut self, product_ref: &ProductRef) -> Result<(), CartError> {
        let before = self.lines.len();
        self.lines.retain(|l| &l.product_ref != product_ref);
        if self.lines.len() == before {
            return Err(CartError::LineNotFound);
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

const fn validate_quantity(quantity: u32) -> Result<(), CartError> {
    if quantity < 1 {
        return Err(CartError::QuantityTooLow);
    }
    if quantity > MAX_LINE_QUANTITY {
        return Err(CartError::QuantityTooHigh);
    }
    Ok(())
}
