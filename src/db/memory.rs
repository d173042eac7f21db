//! In-process stores, used when no Redis is configured and by tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::{
    db::{CacheStore, OrderStore, ProductStore},
    error::AppResult,
    models::{Order, OrderStatus, Product, ProductId},
};

/// Cached value and its deadline; `None` never expires
type Entry = (String, Option<Instant>);

fn is_live(expires_at: &Option<Instant>, now: Instant) -> bool {
    expires_at.map_or(true, |deadline| now < deadline)
}

/// [`CacheStore`] holding entries in a map. Expired entries are dropped
/// when read and swept on every write.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet swept
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some((value, expires_at)) if is_live(expires_at, now) => {
                    return Ok(Some(value.clone()))
                }
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        if entries
            .get(key)
            .is_some_and(|(_, expires_at)| !is_live(expires_at, now))
        {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl_seconds: u64) -> AppResult<()> {
        let now = Instant::now();
        // A TTL too large to represent means the entry outlives the process
        let expires_at = now.checked_add(Duration::from_secs(ttl_seconds));

        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, deadline)| is_live(deadline, now));
        entries.insert(key.to_string(), (value, expires_at));
        Ok(())
    }
}

/// [`OrderStore`] over a fixed list of orders
#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<Vec<Order>>,
}

impl InMemoryOrderStore {
    pub fn new(orders: Vec<Order>) -> Self {
        Self {
            orders: RwLock::new(orders),
        }
    }

    pub async fn add_order(&self, order: Order) {
        self.orders.write().await.push(order);
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn orders_with_status_in(&self, statuses: &[OrderStatus]) -> AppResult<Vec<Order>> {
        let orders = self.orders.read().await;
        Ok(orders
            .iter()
            .filter(|o| statuses.contains(&o.status))
            .cloned()
            .collect())
    }
}

/// [`ProductStore`] over a fixed catalog
#[derive(Default)]
pub struct InMemoryProductStore {
    products: RwLock<HashMap<ProductId, Product>>,
}

impl InMemoryProductStore {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            products: RwLock::new(products.into_iter().map(|p| (p.id, p)).collect()),
        }
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn products_by_ids(
        &self,
        ids: &[ProductId],
        active_only: bool,
    ) -> AppResult<Vec<Product>> {
        let products = self.products.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| products.get(id))
            .filter(|p| !active_only || p.is_active)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderItem;

    #[test]
    fn test_memory_cache_round_trip() {
        let cache = MemoryCache::new();
        tokio_test::block_on(cache.set("k", "v".to_string(), 60)).unwrap();
        assert_eq!(
            tokio_test::block_on(cache.get("k")).unwrap(),
            Some("v".to_string())
        );
        assert_eq!(tokio_test::block_on(cache.get("other")).unwrap(), None);
    }

    #[test]
    fn test_memory_cache_drops_expired_entry_on_read() {
        let cache = MemoryCache::new();
        tokio_test::block_on(cache.set("k", "v".to_string(), 0)).unwrap();
        assert_eq!(tokio_test::block_on(cache.len()), 1);

        assert_eq!(tokio_test::block_on(cache.get("k")).unwrap(), None);
        assert!(tokio_test::block_on(cache.is_empty()));
    }

    #[test]
    fn test_memory_cache_sweeps_expired_entries_on_write() {
        let cache = MemoryCache::new();
        tokio_test::block_on(cache.set("stale_1", "[]".to_string(), 0)).unwrap();
        tokio_test::block_on(cache.set("stale_2", "[]".to_string(), 0)).unwrap();
        tokio_test::block_on(cache.set("fresh", "[1]".to_string(), 60)).unwrap();

        assert_eq!(tokio_test::block_on(cache.len()), 1);
        assert_eq!(
            tokio_test::block_on(cache.get("fresh")).unwrap(),
            Some("[1]".to_string())
        );
    }

    #[test]
    fn test_memory_cache_huge_ttl_never_expires() {
        let cache = MemoryCache::new();
        tokio_test::block_on(cache.set("k", "v".to_string(), u64::MAX)).unwrap();
        assert_eq!(
            tokio_test::block_on(cache.get("k")).unwrap(),
            Some("v".to_string())
        );
    }

    #[tokio::test]
    async fn test_order_store_filters_by_status() {
        let store = InMemoryOrderStore::new(vec![
            Order::new(1, OrderStatus::Delivered, vec![OrderItem::of(1)]),
            Order::new(2, OrderStatus::Cancelled, vec![OrderItem::of(2)]),
        ]);
        store
            .add_order(Order::new(3, OrderStatus::Shipped, vec![OrderItem::of(3)]))
            .await;

        let orders = store
            .orders_with_status_in(&[OrderStatus::Delivered, OrderStatus::Shipped])
            .await
            .unwrap();
        let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_product_store_active_filter() {
        let store = InMemoryProductStore::new(vec![
            Product::new(1, "Kettle", 2499),
            Product::new(2, "Old Kettle", 1999).inactive(),
        ]);

        let ids = [ProductId(1), ProductId(2), ProductId(99)];
        assert_eq!(store.products_by_ids(&ids, true).await.unwrap().len(), 1);
        assert_eq!(store.products_by_ids(&ids, false).await.unwrap().len(), 2);
    }
}
