//! Product catalog entry.
//!
//! # Responsibility
//! - Define the single-table catalog record.
//! - Own the caller-side merge step that turns a partial patch into a
//!   fully materialized product for blind full-row updates.
//!
//! # Invariants
//! - `created_at` is set once and never changed by a merge.
//! - `updated_at` is absent until the first update, then monotonically
//!   non-decreasing.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Store-assigned product identifier. `0` means unassigned.
pub type ProductId = i64;

/// Catalog entry persisted in `products`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub image: String,
    pub category: String,
    pub description: String,
    pub rating: f64,
    pub num_reviews: i64,
    pub price: Decimal,
    pub count_in_stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Precondition violations for product writes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductValidationError {
    #[error("product id must be unset on create, got {0}")]
    IdAlreadyAssigned(ProductId),
    #[error("product id must be positive, got {0}")]
    NonPositiveId(ProductId),
    #[error("product {0} update must carry updated_at")]
    MissingUpdatedAt(ProductId),
}

impl Product {
    /// Creates an unsaved product stamped with `created_at`.
    pub fn new(
        name: impl Into<String>,
        price: Decimal,
        count_in_stock: i64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            name: name.into(),
            image: String::new(),
            category: String::new(),
            description: String::new(),
            rating: 0.0,
            num_reviews: 0,
            price,
            count_in_stock,
            created_at,
            updated_at: None,
        }
    }

    pub fn validate_for_create(&self) -> Result<(), ProductValidationError> {
        if self.id != 0 {
            return Err(ProductValidationError::IdAlreadyAssigned(self.id));
        }
        Ok(())
    }

    /// Checks that this product is a fully merged entity ready to overwrite
    /// its stored row.
    pub fn validate_for_update(&self) -> Result<(), ProductValidationError> {
        if self.id <= 0 {
            return Err(ProductValidationError::NonPositiveId(self.id));
        }
        if self.updated_at.is_none() {
            return Err(ProductValidationError::MissingUpdatedAt(self.id));
        }
        Ok(())
    }
}

/// Partial update request. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub image: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub rating: Option<f64>,
    pub num_reviews: Option<i64>,
    pub price: Option<Decimal>,
    pub count_in_stock: Option<i64>,
}

/// Merges `patch` over `current`, producing the entity to write back.
///
/// Identity and `created_at` are carried over unchanged. `updated_at` is set
/// to `now`, but never earlier than the previous update or the creation time,
/// so clock skew between callers cannot move it backwards.
pub fn merge_product(current: &Product, patch: &ProductPatch, now: DateTime<Utc>) -> Product {
    let floor = current.updated_at.unwrap_or(current.created_at);

    Product {
        id: current.id,
        name: patch.name.clone().unwrap_or_else(|| current.name.clone()),
        image: patch.image.clone().unwrap_or_else(|| current.image.clone()),
        category: patch
            .category
            .clone()
            .unwrap_or_else(|| current.category.clone()),
        description: patch
            .description
            .clone()
            .unwrap_or_else(|| current.description.clone()),
        rating: patch.rating.unwrap_or(current.rating),
        num_reviews: patch.num_reviews.unwrap_or(current.num_reviews),
        price: patch.price.unwrap_or(current.price),
        count_in_stock: patch.count_in_stock.unwrap_or(current.count_in_stock),
        created_at: current.created_at,
        updated_at: Some(now.max(floor)),
    }
}

#[cfg(test)]
mod tests {
    use super::{merge_product, Product, ProductPatch, ProductValidationError};
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    fn widget() -> Product {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut product = Product::new("Widget", Decimal::new(999, 2), 50, created);
        product.id = 7;
        product.category = "tools".to_string();
        product
    }

    #[test]
    fn merge_overwrites_only_present_fields() {
        let current = widget();
        let now = current.created_at + Duration::hours(1);
        let patch = ProductPatch {
            name: Some("Widget Pro".to_string()),
            count_in_stock: Some(12),
            ..ProductPatch::default()
        };

        let merged = merge_product(&current, &patch, now);
        assert_eq!(merged.id, 7);
        assert_eq!(merged.name, "Widget Pro");
        assert_eq!(merged.count_in_stock, 12);
        assert_eq!(merged.category, "tools");
        assert_eq!(merged.price, Decimal::new(999, 2));
        assert_eq!(merged.created_at, current.created_at);
        assert_eq!(merged.updated_at, Some(now));
    }

    #[test]
    fn merge_never_moves_updated_at_backwards() {
        let mut current = widget();
        let last_update = current.created_at + Duration::days(2);
        current.updated_at = Some(last_update);

        let skewed_now = current.created_at + Duration::days(1);
        let merged = merge_product(&current, &ProductPatch::default(), skewed_now);
        assert_eq!(merged.updated_at, Some(last_update));

        let before_creation = current.created_at - Duration::days(1);
        current.updated_at = None;
        let merged = merge_product(&current, &ProductPatch::default(), before_creation);
        assert_eq!(merged.updated_at, Some(current.created_at));
    }

    #[test]
    fn validation_checks_id_state() {
        let mut product = widget();
        assert_eq!(
            product.validate_for_create(),
            Err(ProductValidationError::IdAlreadyAssigned(7))
        );
        assert_eq!(
            product.validate_for_update(),
            Err(ProductValidationError::MissingUpdatedAt(7))
        );
        product.updated_at = Some(product.created_at);
        assert!(product.validate_for_update().is_ok());

        product.id = 0;
        assert!(product.validate_for_create().is_ok());
        assert_eq!(
            product.validate_for_update(),
            Err(ProductValidationError::NonPositiveId(0))
        );
    }
}
