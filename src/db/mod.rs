pub mod memory;
pub mod postgres;
pub mod redis;
mod store;

pub use self::memory::{InMemoryOrderStore, InMemoryProductStore, MemoryCache};
pub use self::postgres::{create_pool, PgOrderStore, PgProductStore};
pub use self::redis::{create_redis_client, CacheWriterHandle, RedisCache};
pub use self::store::{CacheStore, OrderStore, ProductStore};

#[cfg(test)]
pub use self::store::{MockCacheStore, MockOrderStore, MockProductStore};
