//! Seed the product catalog from a YAML file.
//!
//! Products are upserted by name, so re-running the command updates prices
//! and stock without creating duplicates.
//!
//! ```yaml
//! products:
//!   - name: Paracetamol 500mg
//!     description: Fever and mild pain relief
//!     form: Tablet
//!     price: 25.00
//!     composition: Paracetamol 500mg
//!     stock: 200
//! ```

use std::collections::HashSet;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info};

use lifebiotech_core::MedicineForm;
use lifebiotech_storefront::db::{self, ProductRepository, products::ProductUpsert};

use super::{CommandError, database_url};

/// Top level of a catalog file.
#[derive(Debug, Deserialize)]
pub struct CatalogFile {
    pub products: Vec<CatalogEntry>,
}

/// One product in a catalog file.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub form: MedicineForm,
    pub price: Decimal,
    pub composition: Option<String>,
    pub manufacturer: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub stock: i32,
}

impl From<CatalogEntry> for ProductUpsert {
    fn from(entry: CatalogEntry) -> Self {
        Self {
            name: entry.name.trim().to_string(),
            description: entry.description,
            form: entry.form,
            price: entry.price,
            composition: entry.composition,
            manufacturer: entry.manufacturer,
            category: entry.category,
            image_url: entry.image_url,
            stock: entry.stock,
        }
    }
}

/// Check a parsed catalog, returning every problem found.
#[must_use]
pub fn validate_catalog(catalog: &CatalogFile) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (index, entry) in catalog.products.iter().enumerate() {
        let name = entry.name.trim();
        if name.is_empty() {
            errors.push(format!("product #{}: name is empty", index + 1));
            continue;
        }
        if !seen.insert(name.to_lowercase()) {
            errors.push(format!("{name}: duplicate name"));
        }
        if entry.price.is_sign_negative() {
            errors.push(format!("{name}: price must not be negative"));
        }
        if entry.stock < 0 {
            errors.push(format!("{name}: stock must not be negative"));
        }
    }

    errors
}

/// Parse and validate a catalog document.
///
/// # Errors
///
/// Returns `CommandError::Yaml` for malformed YAML and
/// `CommandError::Validation` when entries are invalid.
pub fn parse_catalog(content: &str) -> Result<CatalogFile, CommandError> {
    let catalog: CatalogFile = serde_yaml::from_str(content)?;

    let errors = validate_catalog(&catalog);
    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(CommandError::Validation(errors.len()));
    }

    Ok(catalog)
}

/// Seed the catalog from `file_path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or validated, or a database
/// operation fails.
pub async fn catalog(file_path: &str) -> Result<(), CommandError> {
    let path = Path::new(file_path);
    info!(path = %file_path, "Loading catalog from file");

    // Read and validate before connecting to the database
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CommandError::Read {
            path: file_path.to_string(),
            source,
        })?;
    let catalog = parse_catalog(&content)?;
    info!(products = catalog.products.len(), "Catalog validated");

    let pool = db::create_pool(&database_url()?).await?;
    let products = ProductRepository::new(&pool);

    for entry in catalog.products {
        let product = products.upsert(&ProductUpsert::from(entry)).await?;
        info!(id = %product.id, name = %product.name, "Upserted product");
    }

    info!("Seeding complete!");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_bundled_catalog_is_valid() {
        let catalog = parse_catalog(include_str!("../../../../seed/catalog.yaml")).unwrap();
        assert!(catalog.products.len() >= 6);
    }

    #[test]
    fn test_entry_defaults() {
        let catalog: CatalogFile = serde_yaml::from_str(
            "products:\n  - name: Cough Syrup\n    form: Syrup\n    price: 85.5\n",
        )
        .unwrap();
        let entry = &catalog.products[0];
        assert_eq!(entry.form, MedicineForm::Syrup);
        assert_eq!(entry.price, Decimal::from_str("85.5").unwrap());
        assert_eq!(entry.stock, 0);
        assert!(entry.description.is_empty());
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let catalog: CatalogFile = serde_yaml::from_str(
            r"
products:
  - name: Cetirizine 10mg
    form: Tablet
    price: 30
  - name: cetirizine 10MG
    form: Tablet
    price: -1
    stock: -5
  - name: '  '
    form: Gel
    price: 10
",
        )
        .unwrap();

        let errors = validate_catalog(&catalog);
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| e.contains("duplicate")));
    }
}
