//! Order use-case service.
//!
//! # Responsibility
//! - Turn checkout requests into fully-formed order aggregates.
//! - Delegate atomic persistence to the storer.
//!
//! # Invariants
//! - Totals are taken from the request verbatim; no arithmetic is re-checked.
//! - The owner id comes from the caller's identity, never from the payload.

use crate::context::CallContext;
use crate::model::order::{Order, OrderId, OrderItem, UserId};
use crate::model::product::ProductId;
use crate::repo::storer::{StoreResult, Storer};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Request model for placing an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub payment_method: String,
    pub tax_price: Decimal,
    pub shipping_price: Decimal,
    pub total_price: Decimal,
    pub items: Vec<NewOrderItem>,
}

/// Request model for one order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub name: String,
    pub quantity: i64,
    pub image: String,
    pub price: Decimal,
    pub product_id: ProductId,
}

impl From<NewOrderItem> for OrderItem {
    fn from(value: NewOrderItem) -> Self {
        Self {
            id: 0,
            name: value.name,
            quantity: value.quantity,
            image: value.image,
            price: value.price,
            product_id: value.product_id,
            order_id: 0,
        }
    }
}

/// Use-case service wrapper for order aggregate operations.
pub struct OrderService<S: Storer> {
    storer: S,
}

impl<S: Storer> OrderService<S> {
    pub fn new(storer: S) -> Self {
        Self { storer }
    }

    /// Places an order owned by `user_id`.
    ///
    /// # Contract
    /// - The order and every line are persisted atomically.
    /// - Returned aggregate carries store-assigned ids for order and lines.
    pub fn place_order(
        &mut self,
        ctx: &CallContext,
        user_id: UserId,
        request: NewOrder,
    ) -> StoreResult<Order> {
        let order = Order {
            id: 0,
            user_id,
            payment_method: request.payment_method,
            tax_price: request.tax_price,
            shipping_price: request.shipping_price,
            total_price: request.total_price,
            created_at: Utc::now(),
            updated_at: None,
            items: request.items.into_iter().map(OrderItem::from).collect(),
        };
        self.storer.create_order(ctx, order)
    }

    pub fn get_order(&self, ctx: &CallContext, id: OrderId) -> StoreResult<Order> {
        self.storer.get_order(ctx, id)
    }

    pub fn list_orders(&self, ctx: &CallContext) -> StoreResult<Vec<Order>> {
        self.storer.list_orders(ctx)
    }

    /// Removes the order together with all of its lines.
    pub fn delete_order(&mut self, ctx: &CallContext, id: OrderId) -> StoreResult<()> {
        self.storer.delete_order(ctx, id)
    }
}
