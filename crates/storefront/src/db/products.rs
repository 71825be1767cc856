//! Catalog queries.

use rust_decimal::Decimal;
use sqlx::PgPool;

use lifebiotech_core::{MedicineForm, ProductId, ProductRef};

use super::RepositoryError;
use crate::models::Product;
use crate::services::checkout::Catalog;

const PRODUCT_COLUMNS: &str = "id, name, description, form, price, composition, manufacturer, \
                               category, image_url, stock, created_at, updated_at";

/// Number of products on the featured shelf.
pub const FEATURED_LIMIT: i64 = 6;

/// Filters for catalog listing.
#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
    /// Matched case-insensitively against name and composition.
    pub search: Option<String>,
    pub form: Option<MedicineForm>,
    pub limit: Option<i64>,
}

/// Catalog entry used by the seed command.
#[derive(Debug, Clone)]
pub struct ProductUpsert {
    pub name: String,
    pub description: String,
    pub form: MedicineForm,
    pub price: Decimal,
    pub composition: Option<String>,
    pub manufacturer: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub stock: i32,
}

/// Repository for `storefront.product`.
#[derive(Clone, Copy)]
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Default and maximum page size for listings.
    pub const MAX_LIMIT: i64 = 100;

    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, query: &ProductQuery) -> Result<Vec<Product>, RepositoryError> {
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(s)));
        let limit = query.limit.unwrap_or(Self::MAX_LIMIT).clamp(1, Self::MAX_LIMIT);

        let sql = format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM storefront.product
            WHERE ($1::TEXT IS NULL OR name ILIKE $1 OR composition ILIKE $1)
              AND ($2::storefront.medicine_form IS NULL OR form = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(search)
            .bind(query.form)
            .bind(limit)
            .fetch_all(self.pool)
            .await?;

        Ok(products)
    }

    /// The first products in catalog order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn featured(&self) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product ORDER BY created_at LIMIT $1"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(FEATURED_LIMIT)
            .fetch_all(self.pool)
            .await?;
        Ok(products)
    }

    /// Look up a product for its detail page: by id when the reference is a
    /// canonical UUID, else by case-insensitive name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_ref(&self, product_ref: &ProductRef) -> Result<Option<Product>, RepositoryError> {
        if let Some(id) = product_ref.as_catalog_id() {
            return self.get_by_id(id).await;
        }
        self.get_by_name_ci(product_ref.as_str()).await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM storefront.product WHERE id = $1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(product)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_name(&self, name: &str) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM storefront.product WHERE name = $1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(name)
            .fetch_optional(self.pool)
            .await?;
        Ok(product)
    }

    /// Case-insensitive name lookup. The oldest product wins if several
    /// names differ only by case.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_name_ci(&self, name: &str) -> Result<Option<Product>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM storefront.product
            WHERE lower(name) = lower($1)
            ORDER BY created_at
            LIMIT 1
            "
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(name)
            .fetch_optional(self.pool)
            .await?;
        Ok(product)
    }

    /// Insert a product or update the one with the same name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(&self, product: &ProductUpsert) -> Result<Product, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO storefront.product
                (name, description, form, price, composition, manufacturer, category, image_url, stock)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (name) DO UPDATE SET
                description = EXCLUDED.description,
                form = EXCLUDED.form,
                price = EXCLUDED.price,
                composition = EXCLUDED.composition,
                manufacturer = EXCLUDED.manufacturer,
                category = EXCLUDED.category,
                image_url = EXCLUDED.image_url,
                stock = EXCLUDED.stock,
                updated_at = now()
            RETURNING {PRODUCT_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, Product>(&sql)
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.form)
            .bind(product.price)
            .bind(&product.composition)
            .bind(&product.manufacturer)
            .bind(&product.category)
            .bind(&product.image_url)
            .bind(product.stock)
            .fetch_one(self.pool)
            .await?;
        Ok(row)
    }
}

impl Catalog for ProductRepository<'_> {
    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        self.get_by_id(id).await
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Product>, RepositoryError> {
        self.get_by_name(name).await
    }

    async fn find_by_name_ci(&self, name: &str) -> Result<Option<Product>, RepositoryError> {
        self.get_by_name_ci(name).await
    }
}

/// Escape `%`, `_` and `\` so user input matches literally inside ILIKE.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("para"), "para");
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
