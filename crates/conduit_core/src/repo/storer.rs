//! Storer contract and its error taxonomy.
//!
//! # Responsibility
//! - Declare the nine persistence operations any backend must provide.
//! - Classify failures so callers can map them onto transport responses.
//!
//! # Invariants
//! - Every operation takes a `CallContext` and checks it before touching
//!   the store.
//! - A failed write never leaves partial state behind.

use crate::context::{CallContext, ContextError};
use crate::model::order::{Order, OrderId, OrderValidationError};
use crate::model::product::{Product, ProductId, ProductValidationError};
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Entity kind named in not-found and input errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Product,
    Order,
}

impl Display for Entity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Product => f.write_str("product"),
            Self::Order => f.write_str("order"),
        }
    }
}

/// Store round trip that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    ProductInsert,
    ProductLookup,
    ProductList,
    ProductUpdate,
    ProductDelete,
    Begin,
    OrderInsert,
    OrderItemInsert { index: usize },
    Commit,
    OrderLookup,
    OrderItemLookup,
    OrderList,
    OrderItemDelete,
    OrderDelete,
}

impl Step {
    /// Stable name used in log events.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProductInsert => "product_insert",
            Self::ProductLookup => "product_lookup",
            Self::ProductList => "product_list",
            Self::ProductUpdate => "product_update",
            Self::ProductDelete => "product_delete",
            Self::Begin => "begin",
            Self::OrderInsert => "order_insert",
            Self::OrderItemInsert { .. } => "order_item_insert",
            Self::Commit => "commit",
            Self::OrderLookup => "order_lookup",
            Self::OrderItemLookup => "order_item_lookup",
            Self::OrderList => "order_list",
            Self::OrderItemDelete => "order_item_delete",
            Self::OrderDelete => "order_delete",
        }
    }
}

impl Display for Step {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OrderItemInsert { index } => write!(f, "{}[{index}]", self.as_str()),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Failure surfaced by a storer operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: i64 },
    #[error("read failed at {step}: {source}")]
    Read {
        step: Step,
        #[source]
        source: rusqlite::Error,
    },
    #[error("write failed at {step}: {source}")]
    Write {
        step: Step,
        #[source]
        source: rusqlite::Error,
    },
    #[error("write at {step} matched no rows")]
    NoRowsAffected { step: Step },
    /// The store accepted the statement but reported no inserted row.
    #[error("store did not report a generated id at {step}")]
    IdAssignment { step: Step },
    #[error(transparent)]
    Cancelled(#[from] ContextError),
    #[error("invalid {entity} id {id}: ids must be positive")]
    InvalidId { entity: Entity, id: i64 },
    #[error("invalid order: {0}")]
    InvalidOrder(#[from] OrderValidationError),
    #[error("invalid product: {0}")]
    InvalidProduct(#[from] ProductValidationError),
}

impl StoreError {
    /// Write rejected, matched nothing, or could not report its id.
    pub fn is_write_failure(&self) -> bool {
        matches!(
            self,
            Self::Write { .. } | Self::NoRowsAffected { .. } | Self::IdAssignment { .. }
        )
    }

    /// Query rejected or required row absent.
    pub fn is_read_failure(&self) -> bool {
        matches!(self, Self::Read { .. } | Self::NotFound { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Step that failed, when the error came from a store round trip.
    pub fn step(&self) -> Option<Step> {
        match self {
            Self::Read { step, .. }
            | Self::Write { step, .. }
            | Self::NoRowsAffected { step }
            | Self::IdAssignment { step } => Some(*step),
            _ => None,
        }
    }
}

/// Persistence contract for products and order aggregates.
///
/// Operations that open a write transaction take `&mut self`: the underlying
/// handle is owned by that one call for the whole transaction window.
pub trait Storer {
    /// Inserts `product` and returns it with the store-assigned id.
    fn create_product(&self, ctx: &CallContext, product: Product) -> StoreResult<Product>;
    fn get_product(&self, ctx: &CallContext, id: ProductId) -> StoreResult<Product>;
    /// Lists every product in ascending id order.
    fn list_products(&self, ctx: &CallContext) -> StoreResult<Vec<Product>>;
    /// Overwrites the full row keyed by `product.id` with exactly these values.
    fn update_product(&self, ctx: &CallContext, product: Product) -> StoreResult<Product>;
    /// Deletes the row; deleting a missing id is not an error.
    fn delete_product(&self, ctx: &CallContext, id: ProductId) -> StoreResult<()>;
    /// Inserts the order and all its items as one atomic unit.
    fn create_order(&mut self, ctx: &CallContext, order: Order) -> StoreResult<Order>;
    fn get_order(&self, ctx: &CallContext, id: OrderId) -> StoreResult<Order>;
    fn list_orders(&self, ctx: &CallContext) -> StoreResult<Vec<Order>>;
    /// Deletes the items, then the order, in one transaction.
    fn delete_order(&mut self, ctx: &CallContext, id: OrderId) -> StoreResult<()>;
}
