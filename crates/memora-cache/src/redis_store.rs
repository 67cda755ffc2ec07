//! Redis-based cache store.

use crate::{CacheStore, Ttl};
use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use memora_config::CacheConfig;
use memora_core::{MemoraError, MemoraResult};
use redis::AsyncCommands;
use tracing::{debug, info};

/// Keys fetched per SCAN round trip when clearing.
const SCAN_BATCH: usize = 100;

/// Create a Redis connection pool and check it with a PING.
pub async fn create_pool(config: &CacheConfig) -> MemoraResult<Pool> {
    info!("Creating Redis connection pool for cache...");

    let cfg = Config::from_url(&config.url);

    let pool = cfg
        .builder()
        .map_err(|e| MemoraError::Configuration(format!("Invalid Redis config: {}", e)))?
        .max_size(config.pool_size as usize)
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| MemoraError::Configuration(format!("Failed to create pool: {}", e)))?;

    let mut conn = pool
        .get()
        .await
        .map_err(|e| MemoraError::cache(format!("Failed to get Redis connection: {}", e)))?;
    redis::cmd("PING")
        .query_async::<String>(&mut *conn)
        .await
        .map_err(|e| MemoraError::cache(format!("Redis PING failed: {}", e)))?;

    info!("Redis connection pool created successfully");

    Ok(pool)
}

/// Redis-based cache store.
///
/// Every key is namespaced with the store-level `key_prefix`; writes
/// without an explicit TTL use `default_ttl`.
pub struct RedisCacheStore {
    pool: Pool,
    key_prefix: String,
    default_ttl: Ttl,
}

impl RedisCacheStore {
    /// Create a new Redis cache store over an existing pool.
    #[must_use]
    pub fn new(pool: Pool, key_prefix: impl Into<String>, default_ttl: Ttl) -> Self {
        Self {
            pool,
            key_prefix: key_prefix.into(),
            default_ttl,
        }
    }

    /// Connect using cache configuration.
    pub async fn connect(config: &CacheConfig) -> MemoraResult<Self> {
        let pool = create_pool(config).await?;
        Ok(Self::new(
            pool,
            config.key_prefix.clone(),
            Ttl::from_secs(config.default_ttl_secs),
        ))
    }

    /// Get a connection from the pool.
    async fn get_conn(&self) -> MemoraResult<deadpool_redis::Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| MemoraError::cache(format!("Failed to get Redis connection: {}", e)))
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    /// SCAN pattern matching every key under the store prefix plus `prefix`.
    fn match_pattern(&self, prefix: &str) -> String {
        format!("{}*", escape_glob(&self.full_key(prefix)))
    }
}

/// Escapes Redis glob metacharacters so a prefix matches literally.
fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get_raw(&self, key: &str) -> MemoraResult<Option<String>> {
        let mut conn = self.get_conn().await?;
        let value: Option<String> = conn
            .get(self.full_key(key))
            .await
            .map_err(|e| MemoraError::cache(format!("Failed to get key '{}': {}", key, e)))?;

        match &value {
            Some(_) => debug!("Cache hit for key '{}'", key),
            None => debug!("Cache miss for key '{}'", key),
        }

        Ok(value)
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Option<Ttl>) -> MemoraResult<()> {
        let mut conn = self.get_conn().await?;
        let ttl_secs = ttl.unwrap_or(self.default_ttl).as_secs().max(1);

        conn.set_ex::<_, _, ()>(self.full_key(key), value, ttl_secs)
            .await
            .map_err(|e| MemoraError::cache(format!("Failed to set key '{}': {}", key, e)))?;

        debug!("Cached key '{}' with TTL {}s", key, ttl_secs);
        Ok(())
    }

    async fn delete(&self, key: &str) -> MemoraResult<bool> {
        let mut conn = self.get_conn().await?;
        let deleted: i64 = conn
            .del(self.full_key(key))
            .await
            .map_err(|e| MemoraError::cache(format!("Failed to delete key '{}': {}", key, e)))?;

        debug!("Deleted key '{}': {}", key, deleted > 0);
        Ok(deleted > 0)
    }

    async fn exists(&self, key: &str) -> MemoraResult<bool> {
        let mut conn = self.get_conn().await?;
        let exists: bool = conn
            .exists(self.full_key(key))
            .await
            .map_err(|e| MemoraError::cache(format!("Failed to check key '{}': {}", key, e)))?;

        Ok(exists)
    }

    async fn clear(&self, prefix: &str) -> MemoraResult<u64> {
        let mut conn = self.get_conn().await?;
        let pattern = self.match_pattern(prefix);
        let mut cursor: u64 = 0;
        let mut deleted: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut *conn)
                .await
                .map_err(|e| MemoraError::cache(format!("Failed to scan keys: {}", e)))?;

            if !keys.is_empty() {
                let removed: u64 = conn
                    .del(&keys)
                    .await
                    .map_err(|e| MemoraError::cache(format!("Failed to delete keys: {}", e)))?;
                deleted += removed;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!("Deleted {} keys matching pattern '{}'", deleted, pattern);
        Ok(deleted)
    }

    async fn incr_window(&self, key: &str, window: Ttl) -> MemoraResult<u64> {
        let mut conn = self.get_conn().await?;
        let full_key = self.full_key(key);

        let count: u64 = conn
            .incr(&full_key, 1u64)
            .await
            .map_err(|e| MemoraError::cache(format!("Failed to increment '{}': {}", key, e)))?;

        if count == 1 {
            let secs = i64::try_from(window.as_secs().max(1)).unwrap_or(i64::MAX);
            conn.expire::<_, ()>(&full_key, secs)
                .await
                .map_err(|e| MemoraError::cache(format!("Failed to expire '{}': {}", key, e)))?;
        }

        Ok(count)
    }

    async fn ping(&self) -> MemoraResult<()> {
        let mut conn = self.get_conn().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut *conn)
            .await
            .map_err(|e| MemoraError::cache(format!("Redis PING failed: {}", e)))?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close();
        info!("Redis cache pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(prefix: &str) -> RedisCacheStore {
        let pool = Config::from_url("redis://127.0.0.1:1")
            .create_pool(Some(Runtime::Tokio1))
            .unwrap();
        RedisCacheStore::new(pool, prefix, Ttl::from_secs(300))
    }

    #[test]
    fn test_escape_glob() {
        assert_eq!(escape_glob("plain:"), "plain:");
        assert_eq!(escape_glob("a*b?[c]\\"), "a\\*b\\?\\[c\\]\\\\");
    }

    #[tokio::test]
    async fn test_keys_are_namespaced() {
        let store = store("svc:");
        assert_eq!(store.full_key("abc"), "svc:abc");
        assert_eq!(store.match_pattern("users:"), "svc:users:*");
        assert_eq!(store.match_pattern(""), "svc:*");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_cache_error() {
        let store = store("");
        let result = store.get_raw("k").await;
        assert!(matches!(result, Err(MemoraError::Cache(_))));
    }
}
