//! Catalog route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use lifebiotech_core::{MedicineForm, ProductRef};

use crate::db::ProductRepository;
use crate::db::products::ProductQuery;
use crate::error::{AppError, Result};
use crate::models::Product;
use crate::state::AppState;

/// Query parameters for the product listing.
#[derive(Debug, Default, Deserialize)]
pub struct ProductParams {
    pub q: Option<String>,
    pub form: Option<String>,
    pub limit: Option<i64>,
}

impl ProductParams {
    fn into_query(self) -> Result<ProductQuery> {
        let form = self
            .form
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::parse::<MedicineForm>)
            .transpose()
            .map_err(AppError::BadRequest)?;

        Ok(ProductQuery {
            search: self.q,
            form,
            limit: self.limit,
        })
    }
}

/// List or search the catalog.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(params): Query<ProductParams>,
) -> Result<Json<Vec<Product>>> {
    let query = params.into_query()?;
    let products = ProductRepository::new(state.pool()).list(&query).await?;
    Ok(Json(products))
}

/// The featured shelf.
pub async fn featured(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    let products = ProductRepository::new(state.pool()).featured().await?;
    Ok(Json(products))
}

/// Product detail by catalog id or name.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id_or_name): Path<String>,
) -> Result<Json<Product>> {
    let product = ProductRepository::new(state.pool())
        .get_by_ref(&ProductRef::new(id_or_name))
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
    Ok(Json(product))
}
