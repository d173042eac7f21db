use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};

use crate::{
    db::{OrderStore, ProductStore},
    error::AppResult,
    models::{Order, OrderItem, OrderStatus, Product, ProductId},
};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// One joined order/line-item row. Line-item columns are null for orders
/// without items; `product_id` is null when the referenced product is gone.
#[derive(Debug, FromRow)]
struct OrderItemRow {
    order_id: i64,
    status: String,
    item_id: Option<i64>,
    product_id: Option<i64>,
    quantity: Option<i32>,
}

/// Orders read from the shop's `orders` / `order_items` tables
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn orders_with_status_in(&self, statuses: &[OrderStatus]) -> AppResult<Vec<Order>> {
        let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();

        let rows = sqlx::query_as::<_, OrderItemRow>(
            r#"
            SELECT o.id AS order_id, o.status, oi.id AS item_id,
                   p.id AS product_id, oi.quantity
            FROM orders o
            LEFT JOIN order_items oi ON oi.order_id = o.id
            LEFT JOIN products p ON p.id = oi.product_id
            WHERE o.status = ANY($1)
            ORDER BY o.id, oi.id
            "#,
        )
        .bind(statuses)
        .fetch_all(&self.pool)
        .await?;

        Ok(group_rows(rows))
    }
}

/// Folds joined rows (sorted by order id) into orders
fn group_rows(rows: Vec<OrderItemRow>) -> Vec<Order> {
    let mut orders: Vec<Order> = Vec::new();

    for row in rows {
        let status = match row.status.parse::<OrderStatus>() {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(order_id = row.order_id, error = %e, "Skipping order row");
                continue;
            }
        };

        if orders.last().map(|o| o.id) != Some(row.order_id) {
            orders.push(Order::new(row.order_id, status, Vec::new()));
        }

        if row.item_id.is_some() {
            if let Some(order) = orders.last_mut() {
                order.items.push(OrderItem {
                    product_id: row.product_id.map(ProductId),
                    quantity: row.quantity.unwrap_or(1).max(0) as u32,
                });
            }
        }
    }

    orders
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    price_cents: i64,
    category: Option<String>,
    is_active: bool,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: ProductId(row.id),
            name: row.name,
            price_cents: row.price_cents,
            category: row.category,
            is_active: row.is_active,
        }
    }
}

/// Products read from the shop's `products` / `categories` tables
#[derive(Clone)]
pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn products_by_ids(
        &self,
        ids: &[ProductId],
        active_only: bool,
    ) -> AppResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = ids.iter().map(|id| id.0).collect();

        let rows = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT p.id, p.name, p.price_cents, c.name AS category, p.is_active
            FROM products p
            LEFT JOIN categories c ON c.id = p.category_id
            WHERE p.id = ANY($1) AND (p.is_active OR NOT $2)
            "#,
        )
        .bind(ids)
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }
}
