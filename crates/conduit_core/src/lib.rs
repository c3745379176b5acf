//! Persistence core for the Conduit order-management backend.
//! Products and order aggregates live here behind the `Storer` contract.

pub mod context;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use context::{CallContext, ContextError};
pub use db::{open_db, open_db_in_memory, open_db_with_config, DbError, StoreConfig};
pub use logging::{init_logging, logging_status, LoggingError};
pub use model::order::{Order, OrderId, OrderItem, OrderItemId, OrderValidationError, UserId};
pub use model::product::{
    merge_product, Product, ProductId, ProductPatch, ProductValidationError,
};
pub use repo::sqlite_storer::{ChildFetch, SqliteStorer};
pub use repo::storer::{Entity, Step, StoreError, StoreResult, Storer};
pub use service::order_service::{NewOrder, NewOrderItem, OrderService};
pub use service::product_service::{NewProduct, ProductService};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
