//! Catalog product.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use lifebiotech_core::{MedicineForm, ProductId};

/// A medicine in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub form: MedicineForm,
    /// Unit price in rupees.
    pub price: Decimal,
    pub composition: Option<String>,
    pub manufacturer: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }
}
