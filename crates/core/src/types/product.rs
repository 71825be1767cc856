//! Product references and dosage forms.

use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ProductId;

/// How a cart line or URL refers to a product.
///
/// Older carts stored the product's display name in the id slot, so a
/// reference is either a catalog UUID or free text. Only the canonical
/// 36-character hyphenated form counts as an id: braced, simple and URN
/// forms that `Uuid::parse_str` would accept are treated as names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductRef(String);

impl ProductRef {
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The catalog id, if the reference is in canonical UUID form.
    #[must_use]
    pub fn as_catalog_id(&self) -> Option<ProductId> {
        if !is_canonical_uuid(&self.0) {
            return None;
        }
        Uuid::parse_str(&self.0).ok().map(ProductId::new)
    }
}

impl fmt::Display for ProductRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ProductId> for ProductRef {
    fn from(id: ProductId) -> Self {
        Self(id.to_string())
    }
}

fn is_canonical_uuid(s: &str) -> bool {
    const HYPHENS: [usize; 4] = [8, 13, 18, 23];

    s.len() == 36
        && s.bytes().enumerate().all(|(i, b)| {
            if HYPHENS.contains(&i) {
                b == b'-'
            } else {
                b.is_ascii_hexdigit()
            }
        })
}

/// Dosage form of a medicine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.medicine_form", rename_all = "PascalCase")
)]
pub enum MedicineForm {
    Tablet,
    Capsule,
    Syrup,
    Injection,
    Gel,
}

impl MedicineForm {
    pub const ALL: [Self; 5] = [
        Self::Tablet,
        Self::Capsule,
        Self::Syrup,
        Self::Injection,
        Self::Gel,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tablet => "Tablet",
            Self::Capsule => "Capsule",
            Self::Syrup => "Syrup",
            Self::Injection => "Injection",
            Self::Gel => "Gel",
        }
    }
}

impl fmt::Display for MedicineForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MedicineForm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|form| form.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown medicine form: {s}"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_canonical_uuid_is_catalog_id() {
        let r = ProductRef::new("6f1c1e1a-3b5d-4c7e-9f00-1a2b3c4d5e6f");
        assert_eq!(
            r.as_catalog_id().unwrap().to_string(),
            "6f1c1e1a-3b5d-4c7e-9f00-1a2b3c4d5e6f"
        );

        let upper = ProductRef::new("6F1C1E1A-3B5D-4C7E-9F00-1A2B3C4D5E6F");
        assert!(upper.as_catalog_id().is_some());
    }

    #[test]
    fn test_names_are_not_ids() {
        assert!(ProductRef::new("Paracetamol 500mg").as_catalog_id().is_none());
        assert!(ProductRef::new("").as_catalog_id().is_none());
    }

    #[test]
    fn test_non_canonical_uuid_forms_are_names() {
        assert!(
            ProductRef::new("6f1c1e1a3b5d4c7e9f001a2b3c4d5e6f")
                .as_catalog_id()
                .is_none()
        );
        assert!(
            ProductRef::new("{6f1c1e1a-3b5d-4c7e-9f00-1a2b3c4d5e6f}")
                .as_catalog_id()
                .is_none()
        );
        assert!(
            ProductRef::new("6f1c1e1a-3b5d-4c7e-9f00-1a2b3c4d5e6g")
                .as_catalog_id()
                .is_none()
        );
    }

    #[test]
    fn test_medicine_form_parse() {
        assert_eq!(MedicineForm::from_str("syrup").unwrap(), MedicineForm::Syrup);
        assert_eq!(MedicineForm::from_str(" Gel ").unwrap(), MedicineForm::Gel);
        assert!(MedicineForm::from_str("Powder").is_err());
    }

    #[test]
    fn test_medicine_form_serde() {
        assert_eq!(
            serde_json::to_string(&MedicineForm::Tablet).unwrap(),
            "\"Tablet\""
        );
    }
}
