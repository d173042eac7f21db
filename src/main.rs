use std::sync::Arc;

use cobuy::{
    config::Config,
    db::{
        create_pool, create_redis_client, CacheStore, MemoryCache, PgOrderStore, PgProductStore,
        RedisCache,
    },
    routes::{create_router, AppState},
    services::{RecommendationService, ResultCache},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cobuy=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    config.validate()?;

    let pool = create_pool(&config.database_url).await?;

    let (cache_store, cache_writer) = match &config.redis_url {
        Some(redis_url) => {
            let (cache, handle) = RedisCache::new(create_redis_client(redis_url)?);
            tracing::info!("Caching recommendations in Redis");
            let store: Arc<dyn CacheStore> = Arc::new(cache);
            (store, Some(handle))
        }
        None => {
            tracing::warn!("REDIS_URL not set, caching recommendations in process memory");
            let store: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
            (store, None)
        }
    };

    let recommendations = RecommendationService::new(
        Arc::new(PgOrderStore::new(pool.clone())),
        Arc::new(PgProductStore::new(pool)),
        ResultCache::new(cache_store, config.cache()),
        config.apriori(),
    );

    let app = create_router(AppState::new(recommendations));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        addr = %addr,
        min_support = config.min_support,
        min_confidence = config.min_confidence,
        cache_ttl = config.recommendation_cache_ttl,
        "Server running"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = cache_writer {
        handle.shutdown().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
