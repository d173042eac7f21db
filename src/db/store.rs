//! Seams to the storage the recommendation engine reads from.
//!
//! The engine never writes orders or products; it only needs committed
//! orders for mining and product rows for resolving recommended ids.

use async_trait::async_trait;

use crate::{
    error::AppResult,
    models::{Order, OrderStatus, Product, ProductId},
};

/// Read access to persisted orders
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// All orders whose status is one of `statuses`, with their line items
    async fn orders_with_status_in(&self, statuses: &[OrderStatus]) -> AppResult<Vec<Order>>;
}

/// Read access to the product catalog
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Products matching `ids`, in no particular order. Unknown ids are skipped.
    async fn products_by_ids(&self, ids: &[ProductId], active_only: bool)
        -> AppResult<Vec<Product>>;
}

/// External key/value store with per-entry expiry
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Stores `value` under `key` for `ttl_seconds`. Implementations may
    /// complete the write after returning.
    async fn set(&self, key: &str, value: String, ttl_seconds: u64) -> AppResult<()>;
}
