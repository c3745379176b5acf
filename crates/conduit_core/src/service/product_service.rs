//! Product use-case service.
//!
//! # Responsibility
//! - Stamp creation/update times for catalog writes.
//! - Own the partial-update merge so the storer only sees full rows.
//!
//! # Invariants
//! - Service APIs never bypass storer persistence contracts.
//! - An update is read, merge, full overwrite; the storer never patches.

use crate::context::CallContext;
use crate::model::product::{merge_product, Product, ProductId, ProductPatch};
use crate::repo::storer::{StoreResult, Storer};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Request model for creating a catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub image: String,
    pub category: String,
    pub description: String,
    pub rating: f64,
    pub num_reviews: i64,
    pub price: Decimal,
    pub count_in_stock: i64,
}

impl NewProduct {
    fn into_product(self, created_at: DateTime<Utc>) -> Product {
        Product {
            id: 0,
            name: self.name,
            image: self.image,
            category: self.category,
            description: self.description,
            rating: self.rating,
            num_reviews: self.num_reviews,
            price: self.price,
            count_in_stock: self.count_in_stock,
            created_at,
            updated_at: None,
        }
    }
}

/// Use-case service wrapper for product operations.
pub struct ProductService<S: Storer> {
    storer: S,
}

impl<S: Storer> ProductService<S> {
    pub fn new(storer: S) -> Self {
        Self { storer }
    }

    /// Creates a product stamped with the current time.
    pub fn create_product(&self, ctx: &CallContext, request: NewProduct) -> StoreResult<Product> {
        self.storer
            .create_product(ctx, request.into_product(Utc::now()))
    }

    pub fn get_product(&self, ctx: &CallContext, id: ProductId) -> StoreResult<Product> {
        self.storer.get_product(ctx, id)
    }

    pub fn list_products(&self, ctx: &CallContext) -> StoreResult<Vec<Product>> {
        self.storer.list_products(ctx)
    }

    /// Applies `patch` to the stored product and writes the merged row back.
    ///
    /// Returns storer-level not-found errors from the read step unchanged.
    pub fn update_product(
        &self,
        ctx: &CallContext,
        id: ProductId,
        patch: &ProductPatch,
    ) -> StoreResult<Product> {
        let current = self.storer.get_product(ctx, id)?;
        let merged = merge_product(&current, patch, Utc::now());
        self.storer.update_product(ctx, merged)
    }

    pub fn delete_product(&self, ctx: &CallContext, id: ProductId) -> StoreResult<()> {
        self.storer.delete_product(ctx, id)
    }
}
