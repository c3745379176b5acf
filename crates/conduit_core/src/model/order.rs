//! Order aggregate: one order row plus its exclusively owned line items.
//!
//! # Responsibility
//! - Define the aggregate exchanged with the storer.
//! - Check create-time preconditions before any transaction is opened.
//!
//! # Invariants
//! - `items` reflects exactly the `order_items` rows whose `order_id` is `id`.
//! - Items are created and deleted only together with their parent order.
//! - Totals are caller-computed and stored verbatim.

use crate::model::product::ProductId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Store-assigned order identifier. `0` means unassigned.
pub type OrderId = i64;
/// Store-assigned order item identifier. `0` means unassigned.
pub type OrderItemId = i64;
/// Owning user reference, supplied by the service layer.
pub type UserId = i64;

/// Purchase aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub payment_method: String,
    pub tax_price: Decimal,
    pub shipping_price: Decimal,
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Line items in insertion order.
    pub items: Vec<OrderItem>,
}

/// One line of an order. Never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub name: String,
    pub quantity: i64,
    pub image: String,
    pub price: Decimal,
    /// Catalog reference; not enforced by the storer.
    pub product_id: ProductId,
    /// Assigned at insert time to the parent order id.
    pub order_id: OrderId,
}

impl OrderItem {
    /// Creates an unsaved line item.
    pub fn new(
        product_id: ProductId,
        name: impl Into<String>,
        quantity: i64,
        price: Decimal,
    ) -> Self {
        Self {
            id: 0,
            name: name.into(),
            quantity,
            image: String::new(),
            price,
            product_id,
            order_id: 0,
        }
    }
}

/// Create-time precondition violations for the order aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderValidationError {
    #[error("order id must be unset on create, got {0}")]
    IdAlreadyAssigned(OrderId),
    #[error("order must contain at least one item")]
    NoItems,
    #[error("order item {index} already carries id {id} / order_id {order_id}")]
    ItemAlreadyAssigned {
        index: usize,
        id: OrderItemId,
        order_id: OrderId,
    },
    #[error("order item {index} has non-positive quantity {quantity}")]
    NonPositiveQuantity { index: usize, quantity: i64 },
}

impl Order {
    /// Creates an unsaved order stamped with `created_at`.
    pub fn new(
        user_id: UserId,
        payment_method: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            user_id,
            payment_method: payment_method.into(),
            tax_price: Decimal::ZERO,
            shipping_price: Decimal::ZERO,
            total_price: Decimal::ZERO,
            created_at,
            updated_at: None,
            items: Vec::new(),
        }
    }

    /// Checks that this aggregate can be handed to `create_order`.
    ///
    /// Zero-item orders are rejected: an order is only ever persisted
    /// together with at least one line.
    pub fn validate_for_create(&self) -> Result<(), OrderValidationError> {
        if self.id != 0 {
            return Err(OrderValidationError::IdAlreadyAssigned(self.id));
        }
        if self.items.is_empty() {
            return Err(OrderValidationError::NoItems);
        }

        for (index, item) in self.items.iter().enumerate() {
            if item.id != 0 || item.order_id != 0 {
                return Err(OrderValidationError::ItemAlreadyAssigned {
                    index,
                    id: item.id,
                    order_id: item.order_id,
                });
            }
            if item.quantity <= 0 {
                return Err(OrderValidationError::NonPositiveQuantity {
                    index,
                    quantity: item.quantity,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Order, OrderItem, OrderValidationError};
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn order_with_items(items: Vec<OrderItem>) -> Order {
        let mut order = Order::new(1, "card", Utc::now());
        order.items = items;
        order
    }

    #[test]
    fn valid_order_passes() {
        let order = order_with_items(vec![OrderItem::new(1, "Widget", 1, Decimal::new(999, 2))]);
        assert!(order.validate_for_create().is_ok());
    }

    #[test]
    fn empty_order_is_rejected() {
        let order = order_with_items(Vec::new());
        assert_eq!(order.validate_for_create(), Err(OrderValidationError::NoItems));
    }

    #[test]
    fn assigned_ids_are_rejected() {
        let mut order = order_with_items(vec![OrderItem::new(1, "Widget", 1, Decimal::ONE)]);
        order.id = 3;
        assert_eq!(
            order.validate_for_create(),
            Err(OrderValidationError::IdAlreadyAssigned(3))
        );

        order.id = 0;
        order.items[0].order_id = 3;
        assert!(matches!(
            order.validate_for_create(),
            Err(OrderValidationError::ItemAlreadyAssigned { index: 0, .. })
        ));
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let order = order_with_items(vec![
            OrderItem::new(1, "Widget", 2, Decimal::ONE),
            OrderItem::new(2, "Gadget", 0, Decimal::ONE),
        ]);
        assert_eq!(
            order.validate_for_create(),
            Err(OrderValidationError::NonPositiveQuantity {
                index: 1,
                quantity: 0
            })
        );
    }

    #[test]
    fn order_serializes_decimals_as_strings() {
        let mut order =
            order_with_items(vec![OrderItem::new(1, "Widget", 1, Decimal::new(999, 2))]);
        order.total_price = Decimal::new(1299, 2);
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["total_price"], "12.99");
        assert_eq!(json["items"][0]["price"], "9.99");
        assert!(json["updated_at"].is_null());
    }
}
