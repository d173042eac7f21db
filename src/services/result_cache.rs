use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt::Display;
use std::sync::Arc;

use crate::{db::CacheStore, models::ProductId};

pub const DEFAULT_CACHE_TTL: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Recommendations(ProductId),
    BoughtTogether(ProductId),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Recommendations(id) => write!(f, "apriori_recommendations_{}", id),
            CacheKey::BoughtTogether(id) => write!(f, "bought_together_{}", id),
        }
    }
}

/// How long results live and how their keys are namespaced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ttl_seconds: u64,
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_CACHE_TTL,
            key_prefix: String::new(),
        }
    }
}

/// Typed, fail-open view over a [`CacheStore`].
///
/// Read failures count as misses and write failures are only logged, so a
/// cache outage costs a recomputation, never a failed request.
#[derive(Clone)]
pub struct ResultCache {
    backend: Arc<dyn CacheStore>,
    config: CacheConfig,
}

impl ResultCache {
    pub fn new(backend: Arc<dyn CacheStore>, config: CacheConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Full store key for `key`, prefix included
    pub fn key(&self, key: &CacheKey) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }

    pub async fn get_from_cache<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let key = self.key(key);

        match self.backend.get(&key).await {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(error = %e, key = %key, "Discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Cache read failed, treating as miss");
                None
            }
        }
    }

    /// Stores `value` with the configured TTL. Empty lists are stored too.
    pub async fn set_in_cache<T: Serialize>(&self, key: &CacheKey, value: &T) {
        let key = self.key(key);

        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, key = %key, "Cache serialization error");
                return;
            }
        };

        if let Err(e) = self.backend.set(&key, json, self.config.ttl_seconds).await {
            tracing::warn!(error = %e, key = %key, "Cache write failed");
        }
    }

    /// Invalidation hook for callers such as bulk order imports.
    ///
    /// Entries are left to expire by TTL; new orders do not invalidate
    /// anything, so results may be up to one TTL stale.
    pub fn clear(&self) {
        tracing::info!(
            ttl_seconds = self.config.ttl_seconds,
            "Recommendation cache clear requested; entries expire by TTL"
        );
    }
}

/// Returns the cached value for a key, or awaits `$block`, caches its output
/// and returns it.
///
/// # Arguments
/// * `$cache`: a [`ResultCache`](crate::services::result_cache::ResultCache)
/// * `$key`: the [`CacheKey`](crate::services::result_cache::CacheKey) to look up
/// * `$block`: a future producing the value on a miss
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $block:expr) => {{
        let key = $key;
        if let Some(cached) = $cache.get_from_cache(&key).await {
            tracing::info!(key = %key, "Using cached recommendations");
            cached
        } else {
            let value = $block.await;
            $cache.set_in_cache(&key, &value).await;
            value
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryCache, MockCacheStore};
    use crate::error::AppError;

    #[test]
    fn test_cache_key_display_recommendations() {
        let key = CacheKey::Recommendations(ProductId(17));
        assert_eq!(format!("{}", key), "apriori_recommendations_17");
    }

    #[test]
    fn test_cache_key_display_bought_together() {
        let key = CacheKey::BoughtTogether(ProductId(17));
        assert_eq!(format!("{}", key), "bought_together_17");
    }

    #[test]
    fn test_key_prefix_is_prepended() {
        let cache = ResultCache::new(
            Arc::new(MemoryCache::new()),
            CacheConfig {
                ttl_seconds: 60,
                key_prefix: "shop:".to_string(),
            },
        );
        assert_eq!(
            cache.key(&CacheKey::BoughtTogether(ProductId(3))),
            "shop:bought_together_3"
        );
    }

    #[tokio::test]
    async fn test_round_trip_including_empty_list() {
        let cache = ResultCache::new(Arc::new(MemoryCache::new()), CacheConfig::default());
        let key = CacheKey::Recommendations(ProductId(1));

        assert_eq!(cache.get_from_cache::<Vec<ProductId>>(&key).await, None);

        cache.set_in_cache(&key, &Vec::<ProductId>::new()).await;
        assert_eq!(
            cache.get_from_cache::<Vec<ProductId>>(&key).await,
            Some(vec![])
        );
    }

    #[tokio::test]
    async fn test_writes_use_configured_ttl() {
        let mut store = MockCacheStore::new();
        store
            .expect_set()
            .withf(|key, value, ttl| key == "apriori_recommendations_5" && value == "[1,2]" && *ttl == 3600)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let cache = ResultCache::new(Arc::new(store), CacheConfig::default());
        cache
            .set_in_cache(&CacheKey::Recommendations(ProductId(5)), &vec![ProductId(1), ProductId(2)])
            .await;
    }

    #[tokio::test]
    async fn test_read_failure_is_a_miss() {
        let mut store = MockCacheStore::new();
        store
            .expect_get()
            .returning(|_| Err(AppError::Internal("redis down".to_string())));

        let cache = ResultCache::new(Arc::new(store), CacheConfig::default());
        let value: Option<Vec<ProductId>> = cache
            .get_from_cache(&CacheKey::Recommendations(ProductId(1)))
            .await;
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let backend = Arc::new(MemoryCache::new());
        backend
            .set("bought_together_1", "not json".to_string(), 60)
            .await
            .unwrap();

        let cache = ResultCache::new(backend, CacheConfig::default());
        let value: Option<Vec<ProductId>> = cache
            .get_from_cache(&CacheKey::BoughtTogether(ProductId(1)))
            .await;
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_cached_macro_computes_once() {
        let cache = ResultCache::new(Arc::new(MemoryCache::new()), CacheConfig::default());
        let calls = std::sync::atomic::AtomicUsize::new(0);

        for _ in 0..2 {
            let value: Vec<ProductId> = cached!(cache, CacheKey::Recommendations(ProductId(9)), async {
                calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                vec![ProductId(4)]
            });
            assert_eq!(value, vec![ProductId(4)]);
        }

        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
