//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use lifebiotech_core::{OrderId, OrderItemId, OrderStatus, PaymentStatus, ProductId, UserId};

/// An order as stored.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub total_amount: Decimal,
    pub shipping_address: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    /// Gateway payment id, recorded once the payment is verified.
    pub payment_id: Option<String>,
    /// Gateway order id, recorded when the payment session is created.
    pub gateway_order_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted order line. Immutable after insertion.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub price: Decimal,
}

/// An order line resolved against the catalog, ready to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: i32,
    pub price: Decimal,
}

/// Shipping address validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShippingError {
    #[error("Shipping address is required")]
    MissingAddress,
    #[error("City is required")]
    MissingCity,
    #[error("Pincode must be 1 to 6 digits")]
    InvalidPincode,
}

/// Shipping details entered at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShippingAddress {
    pub address: String,
    pub city: String,
    pub pincode: String,
}

impl ShippingAddress {
    /// Maximum pincode length.
    pub const PINCODE_MAX_LEN: usize = 6;

    /// Trim and validate all fields.
    ///
    /// # Errors
    ///
    /// Returns `ShippingError` for blank fields or a non-numeric pincode.
    pub fn validated(self) -> Result<Self, ShippingError> {
        let address = self.address.trim().to_string();
        let city = self.city.trim().to_string();
        let pincode = self.pincode.trim().to_string();

        if address.is_empty() {
            return Err(ShippingError::MissingAddress);
        }
        if city.is_empty() {
            return Err(ShippingError::MissingCity);
        }
        if pincode.is_empty()
            || pincode.len() > Self::PINCODE_MAX_LEN
            || !pincode.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(ShippingError::InvalidPincode);
        }

        Ok(Self {
            address,
            city,
            pincode,
        })
    }

    /// Single-line form stored on the order and sent as payment metadata.
    #[must_use]
    pub fn one_line(&self) -> String {
        format!("{}, {}, {}", self.address, self.city, self.pincode)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn address(address: &str, city: &str, pincode: &str) -> ShippingAddress {
        ShippingAddress {
            address: address.to_string(),
            city: city.to_string(),
            pincode: pincode.to_string(),
        }
    }

    #[test]
    fn test_one_line_format() {
        let a = address(" 12 MG Road ", "Pune", "411001").validated().unwrap();
        assert_eq!(a.one_line(), "12 MG Road, Pune, 411001");
    }

    #[test]
    fn test_pincode_rules() {
        assert_eq!(
            address("x", "y", "4110012").validated(),
            Err(ShippingError::InvalidPincode)
        );
        assert_eq!(
            address("x", "y", "41A001").validated(),
            Err(ShippingError::InvalidPincode)
        );
        assert_eq!(
            address("x", "y", "").validated(),
            Err(ShippingError::InvalidPincode)
        );
        assert!(address("x", "y", "560").validated().is_ok());
    }

    #[test]
    fn test_blank_fields() {
        assert_eq!(
            address("  ", "Pune", "411001").validated(),
            Err(ShippingError::MissingAddress)
        );
        assert_eq!(
            address("12 MG Road", "", "411001").validated(),
            Err(ShippingError::MissingCity)
        );
    }
}
