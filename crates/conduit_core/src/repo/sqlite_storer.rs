//! SQLite-backed storer for products and order aggregates.
//!
//! # Responsibility
//! - Own transaction boundaries and SQL text for every storer operation.
//! - Rebuild order aggregates from an order row and its item rows without a
//!   database-side join.
//!
//! # Invariants
//! - Order create/delete run inside one IMMEDIATE transaction; any failing
//!   step drops the transaction, which rolls it back.
//! - Items are inserted, read back and attached in ascending id order.
//! - Order reads (parent + children) observe one read snapshot.
//! - Correctness under concurrent writers relies on SQLite isolation
//!   (serializable), not on in-process locks.

use crate::context::CallContext;
use crate::db::StoreConfig;
use crate::model::order::{Order, OrderId, OrderItem};
use crate::model::product::{Product, ProductId};
use crate::repo::storer::{Entity, Step, StoreError, StoreResult, Storer};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, ToSql, TransactionBehavior,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Instant;

/// Default number of order ids bound into one batched item query.
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// Upper bound for one `IN (...)` list; stays well below SQLite's
/// host-parameter limit.
pub const MAX_BATCH_PARAMS: usize = 500;

const PRODUCT_SELECT_SQL: &str = "SELECT
    id,
    name,
    image,
    category,
    description,
    rating,
    num_reviews,
    price,
    count_in_stock,
    created_at,
    updated_at
FROM products";

const ORDER_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    payment_method,
    tax_price,
    shipping_price,
    total_price,
    created_at,
    updated_at
FROM orders";

const ORDER_ITEM_SELECT_SQL: &str = "SELECT
    id,
    name,
    quantity,
    image,
    price,
    product_id,
    order_id
FROM order_items";

/// How `list_orders` fetches the item rows of every listed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildFetch {
    /// One item query per order: O(orders) round trips.
    PerParent,
    /// One `IN (...)` item query per chunk of order ids.
    Batched { chunk_size: usize },
}

impl Default for ChildFetch {
    fn default() -> Self {
        Self::Batched {
            chunk_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// SQLite-backed storer.
pub struct SqliteStorer<'conn> {
    conn: &'conn mut Connection,
    child_fetch: ChildFetch,
}

impl<'conn> SqliteStorer<'conn> {
    /// Constructs a storer from a migrated/ready connection.
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self::with_child_fetch(conn, ChildFetch::default())
    }

    pub fn with_config(conn: &'conn mut Connection, config: &StoreConfig) -> Self {
        Self::with_child_fetch(conn, config.child_fetch)
    }

    pub fn with_child_fetch(conn: &'conn mut Connection, child_fetch: ChildFetch) -> Self {
        Self { conn, child_fetch }
    }
}

impl Storer for SqliteStorer<'_> {
    fn create_product(&self, ctx: &CallContext, mut product: Product) -> StoreResult<Product> {
        ctx.check()?;
        product.validate_for_create()?;

        let step = Step::ProductInsert;
        let changed = self
            .conn
            .execute(
                "INSERT INTO products (
                    name,
                    image,
                    category,
                    description,
                    rating,
                    num_reviews,
                    price,
                    count_in_stock,
                    created_at,
                    updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
                params![
                    product.name.as_str(),
                    product.image.as_str(),
                    product.category.as_str(),
                    product.description.as_str(),
                    product.rating,
                    product.num_reviews,
                    SqlDecimal(product.price),
                    product.count_in_stock,
                    product.created_at,
                    None::<DateTime<Utc>>,
                ],
            )
            .map_err(write_failure(step))?;

        product.id = inserted_id(self.conn, changed, step)?;
        product.updated_at = None;
        Ok(product)
    }

    fn get_product(&self, ctx: &CallContext, id: ProductId) -> StoreResult<Product> {
        ctx.check()?;
        ensure_positive_id(Entity::Product, id)?;

        self.conn
            .query_row(
                &format!("{PRODUCT_SELECT_SQL} WHERE id = ?1;"),
                [id],
                product_from_row,
            )
            .optional()
            .map_err(read_failure(Step::ProductLookup))?
            .ok_or(StoreError::NotFound {
                entity: Entity::Product,
                id,
            })
    }

    fn list_products(&self, ctx: &CallContext) -> StoreResult<Vec<Product>> {
        ctx.check()?;

        let step = Step::ProductList;
        let mut stmt = self
            .conn
            .prepare(&format!("{PRODUCT_SELECT_SQL} ORDER BY id ASC;"))
            .map_err(read_failure(step))?;
        let products = stmt
            .query_map([], product_from_row)
            .map_err(read_failure(step))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(read_failure(step))?;

        Ok(products)
    }

    fn update_product(&self, ctx: &CallContext, product: Product) -> StoreResult<Product> {
        ctx.check()?;
        product.validate_for_update()?;

        let step = Step::ProductUpdate;
        let changed = self
            .conn
            .execute(
                "UPDATE products
                 SET
                    name = ?1,
                    image = ?2,
                    category = ?3,
                    description = ?4,
                    rating = ?5,
                    num_reviews = ?6,
                    price = ?7,
                    count_in_stock = ?8,
                    updated_at = ?9
                 WHERE id = ?10;",
                params![
                    product.name.as_str(),
                    product.image.as_str(),
                    product.category.as_str(),
                    product.description.as_str(),
                    product.rating,
                    product.num_reviews,
                    SqlDecimal(product.price),
                    product.count_in_stock,
                    product.updated_at,
                    product.id,
                ],
            )
            .map_err(write_failure(step))?;

        if changed == 0 {
            return Err(StoreError::NoRowsAffected { step });
        }

        Ok(product)
    }

    fn delete_product(&self, ctx: &CallContext, id: ProductId) -> StoreResult<()> {
        ctx.check()?;
        ensure_positive_id(Entity::Product, id)?;

        let changed = self
            .conn
            .execute("DELETE FROM products WHERE id = ?1;", [id])
            .map_err(write_failure(Step::ProductDelete))?;
        debug!("event=product_delete module=repo status=ok product_id={id} rows={changed}");
        Ok(())
    }

    fn create_order(&mut self, ctx: &CallContext, mut order: Order) -> StoreResult<Order> {
        ctx.check()?;
        order.validate_for_create()?;

        let started_at = Instant::now();
        match insert_order_aggregate(self.conn, ctx, &mut order) {
            Ok(()) => {
                info!(
                    "event=order_create module=repo status=ok order_id={} item_count={} duration_ms={}",
                    order.id,
                    order.items.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(order)
            }
            Err(err) => {
                warn!(
                    "event=order_create module=repo status=rolled_back item_count={} duration_ms={} step={} error={}",
                    order.items.len(),
                    started_at.elapsed().as_millis(),
                    err.step().map_or("none", |step| step.as_str()),
                    err
                );
                Err(err)
            }
        }
    }

    fn get_order(&self, ctx: &CallContext, id: OrderId) -> StoreResult<Order> {
        ctx.check()?;
        ensure_positive_id(Entity::Order, id)?;

        // Deferred read transaction: parent and children share one snapshot.
        // Dropping it without commit only releases the read lock.
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(read_failure(Step::Begin))?;

        let mut order = tx
            .query_row(
                &format!("{ORDER_SELECT_SQL} WHERE id = ?1;"),
                [id],
                order_from_row,
            )
            .optional()
            .map_err(read_failure(Step::OrderLookup))?
            .ok_or(StoreError::NotFound {
                entity: Entity::Order,
                id,
            })?;

        ctx.check()?;
        order.items = load_items_for_order(&tx, id)?;
        Ok(order)
    }

    fn list_orders(&self, ctx: &CallContext) -> StoreResult<Vec<Order>> {
        ctx.check()?;

        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(read_failure(Step::Begin))?;

        let step = Step::OrderList;
        let mut orders = {
            let mut stmt = tx
                .prepare(&format!("{ORDER_SELECT_SQL} ORDER BY id ASC;"))
                .map_err(read_failure(step))?;
            let rows = stmt
                .query_map([], order_from_row)
                .map_err(read_failure(step))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(read_failure(step))?
        };

        match self.child_fetch {
            ChildFetch::PerParent => {
                for order in &mut orders {
                    ctx.check()?;
                    order.items = load_items_for_order(&tx, order.id)?;
                }
            }
            ChildFetch::Batched { chunk_size } => {
                attach_items_batched(&tx, ctx, &mut orders, chunk_size)?;
            }
        }

        Ok(orders)
    }

    fn delete_order(&mut self, ctx: &CallContext, id: OrderId) -> StoreResult<()> {
        ctx.check()?;
        ensure_positive_id(Entity::Order, id)?;

        let started_at = Instant::now();
        match delete_order_aggregate(self.conn, ctx, id) {
            Ok(item_rows) => {
                info!(
                    "event=order_delete module=repo status=ok order_id={} item_rows={} duration_ms={}",
                    id,
                    item_rows,
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                warn!(
                    "event=order_delete module=repo status=rolled_back order_id={} duration_ms={} step={} error={}",
                    id,
                    started_at.elapsed().as_millis(),
                    err.step().map_or("none", |step| step.as_str()),
                    err
                );
                Err(err)
            }
        }
    }
}

/// Inserts the order row and every item row, then commits.
///
/// Ids are written back into `order` as they are assigned. On error the
/// caller discards `order`, and dropping `tx` rolls back every insert.
fn insert_order_aggregate(
    conn: &mut Connection,
    ctx: &CallContext,
    order: &mut Order,
) -> StoreResult<()> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(write_failure(Step::Begin))?;

    let changed = tx
        .execute(
            "INSERT INTO orders (
                user_id,
                payment_method,
                tax_price,
                shipping_price,
                total_price,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                order.user_id,
                order.payment_method.as_str(),
                SqlDecimal(order.tax_price),
                SqlDecimal(order.shipping_price),
                SqlDecimal(order.total_price),
                order.created_at,
                None::<DateTime<Utc>>,
            ],
        )
        .map_err(write_failure(Step::OrderInsert))?;
    let order_id = inserted_id(&tx, changed, Step::OrderInsert)?;

    for (index, item) in order.items.iter_mut().enumerate() {
        ctx.check()?;

        let step = Step::OrderItemInsert { index };
        let changed = tx
            .execute(
                "INSERT INTO order_items (
                    name,
                    quantity,
                    image,
                    price,
                    product_id,
                    order_id
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    item.name.as_str(),
                    item.quantity,
                    item.image.as_str(),
                    SqlDecimal(item.price),
                    item.product_id,
                    order_id,
                ],
            )
            .map_err(write_failure(step))?;
        item.id = inserted_id(&tx, changed, step)?;
        item.order_id = order_id;
    }

    ctx.check()?;
    tx.commit().map_err(write_failure(Step::Commit))?;

    order.id = order_id;
    order.updated_at = None;
    Ok(())
}

/// Deletes items then the order row in one transaction.
///
/// Returns the number of item rows removed.
fn delete_order_aggregate(
    conn: &mut Connection,
    ctx: &CallContext,
    id: OrderId,
) -> StoreResult<usize> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(write_failure(Step::Begin))?;

    let item_rows = tx
        .execute("DELETE FROM order_items WHERE order_id = ?1;", [id])
        .map_err(write_failure(Step::OrderItemDelete))?;

    ctx.check()?;
    tx.execute("DELETE FROM orders WHERE id = ?1;", [id])
        .map_err(write_failure(Step::OrderDelete))?;

    ctx.check()?;
    tx.commit().map_err(write_failure(Step::Commit))?;
    Ok(item_rows)
}

fn load_items_for_order(conn: &Connection, order_id: OrderId) -> StoreResult<Vec<OrderItem>> {
    let step = Step::OrderItemLookup;
    let mut stmt = conn
        .prepare_cached(&format!(
            "{ORDER_ITEM_SELECT_SQL} WHERE order_id = ?1 ORDER BY id ASC;"
        ))
        .map_err(read_failure(step))?;
    let items = stmt
        .query_map([order_id], order_item_from_row)
        .map_err(read_failure(step))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(read_failure(step))?;
    Ok(items)
}

/// Loads the items of every order with one `IN (...)` query per chunk of
/// order ids, then attaches them by `order_id`.
fn attach_items_batched(
    conn: &Connection,
    ctx: &CallContext,
    orders: &mut [Order],
    chunk_size: usize,
) -> StoreResult<()> {
    let step = Step::OrderItemLookup;
    let chunk_size = chunk_size.clamp(1, MAX_BATCH_PARAMS);
    let order_ids: Vec<OrderId> = orders.iter().map(|order| order.id).collect();
    let mut items_by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();

    for chunk in order_ids.chunks(chunk_size) {
        ctx.check()?;

        let placeholders = vec!["?"; chunk.len()].join(", ");
        let mut stmt = conn
            .prepare(&format!(
                "{ORDER_ITEM_SELECT_SQL}
                 WHERE order_id IN ({placeholders})
                 ORDER BY order_id ASC, id ASC;"
            ))
            .map_err(read_failure(step))?;
        let rows = stmt
            .query_map(params_from_iter(chunk.iter()), order_item_from_row)
            .map_err(read_failure(step))?;

        for row in rows {
            let item = row.map_err(read_failure(step))?;
            items_by_order.entry(item.order_id).or_default().push(item);
        }
    }

    for order in orders.iter_mut() {
        order.items = items_by_order.remove(&order.id).unwrap_or_default();
    }

    Ok(())
}

/// Resolves the id generated by the last insert on `conn`.
///
/// A statement that reports no inserted row (e.g. silently ignored) leaves
/// `last_insert_rowid` stale, so it is treated as an id assignment failure.
fn inserted_id(conn: &Connection, changed: usize, step: Step) -> StoreResult<i64> {
    if changed != 1 {
        return Err(StoreError::IdAssignment { step });
    }

    let id = conn.last_insert_rowid();
    if id <= 0 {
        return Err(StoreError::IdAssignment { step });
    }
    Ok(id)
}

fn ensure_positive_id(entity: Entity, id: i64) -> StoreResult<()> {
    if id <= 0 {
        return Err(StoreError::InvalidId { entity, id });
    }
    Ok(())
}

fn read_failure(step: Step) -> impl FnOnce(rusqlite::Error) -> StoreError {
    move |source| StoreError::Read { step, source }
}

fn write_failure(step: Step) -> impl FnOnce(rusqlite::Error) -> StoreError {
    move |source| StoreError::Write { step, source }
}

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get("id")?,
        name: row.get("name")?,
        image: row.get("image")?,
        category: row.get("category")?,
        description: row.get("description")?,
        rating: row.get("rating")?,
        num_reviews: row.get("num_reviews")?,
        price: row.get::<_, SqlDecimal>("price")?.0,
        count_in_stock: row.get("count_in_stock")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn order_from_row(row: &Row<'_>) -> rusqlite::Result<Order> {
    Ok(Order {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        payment_method: row.get("payment_method")?,
        tax_price: row.get::<_, SqlDecimal>("tax_price")?.0,
        shipping_price: row.get::<_, SqlDecimal>("shipping_price")?.0,
        total_price: row.get::<_, SqlDecimal>("total_price")?.0,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        items: Vec::new(),
    })
}

fn order_item_from_row(row: &Row<'_>) -> rusqlite::Result<OrderItem> {
    Ok(OrderItem {
        id: row.get("id")?,
        name: row.get("name")?,
        quantity: row.get("quantity")?,
        image: row.get("image")?,
        price: row.get::<_, SqlDecimal>("price")?.0,
        product_id: row.get("product_id")?,
        order_id: row.get("order_id")?,
    })
}

/// Decimal stored as TEXT so currency values keep their exact scale.
struct SqlDecimal(Decimal);

impl ToSql for SqlDecimal {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.to_string()))
    }
}

impl FromSql for SqlDecimal {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        Decimal::from_str(text)
            .map(SqlDecimal)
            .map_err(|err| FromSqlError::Other(Box::new(err)))
    }
}
