//! Cache lifecycle: connect at startup, release at shutdown.

use crate::key::{build_key, FunctionId, IntoCallArgs};
use crate::{CacheHandle, CacheStore, MemoryCacheStore, RedisCacheStore};
use memora_config::{CacheBackend, CacheConfig};
use memora_core::{MemoraError, MemoraResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Owns the cache configuration and the handle shared with memoized
/// functions.
pub struct CacheManager {
    config: CacheConfig,
    handle: CacheHandle,
}

impl CacheManager {
    /// Creates a manager with a detached handle.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        let handle = CacheHandle::with_timeout(config.operation_timeout());
        Self { config, handle }
    }

    /// Connect the configured backend and attach it to the handle.
    ///
    /// When caching is disabled the handle stays detached and memoized
    /// functions always compute.
    pub async fn init(&self) -> MemoraResult<()> {
        if !self.config.enabled {
            warn!("Caching is disabled; memoized functions will always compute");
            return Ok(());
        }

        let store: Arc<dyn CacheStore> = match self.config.backend {
            CacheBackend::Redis => Arc::new(RedisCacheStore::connect(&self.config).await?),
            CacheBackend::Memory => Arc::new(MemoryCacheStore::from_config(&self.config)),
        };

        info!(
            "Cache initialized (backend: {}, default TTL: {}s, prefix: '{}')",
            store.name(),
            self.config.default_ttl_secs,
            self.config.key_prefix
        );

        if let Some(previous) = self.handle.detach() {
            previous.close().await;
        }
        self.handle.attach(store);
        Ok(())
    }

    /// Detach the store and release its connections.
    pub async fn shutdown(&self) {
        match self.handle.detach() {
            Some(store) => {
                store.close().await;
                info!("Cache shut down");
            }
            None => debug!("Cache shutdown requested but no store was attached"),
        }
    }

    /// Handle to pass to memoized functions.
    #[must_use]
    pub fn handle(&self) -> CacheHandle {
        self.handle.clone()
    }

    /// The attached store, or `CacheNotInitialized`.
    pub fn store(&self) -> MemoraResult<Arc<dyn CacheStore>> {
        self.handle.require()
    }

    /// Cache configuration.
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Whether a store is attached.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.handle.is_initialized()
    }

    /// Remove the entry a memoized function stored for `args`.
    pub async fn invalidate<A: IntoCallArgs>(
        &self,
        func: &FunctionId,
        args: &A,
        prefix: Option<&str>,
    ) -> MemoraResult<bool> {
        let store = self.handle.require()?;
        let key = build_key(func, &args.call_args(), prefix);
        let removed = store.delete(key.as_str()).await?;
        info!(function = %func, key = %key, removed, "Cache entry invalidated");
        Ok(removed)
    }

    /// Delete every entry whose key starts with `prefix`.
    ///
    /// An empty prefix clears the whole cache namespace. A prefix made only
    /// of hex digits is rejected: unprefixed keys are bare SHA-256 digests
    /// and would match it.
    pub async fn clear(&self, prefix: &str) -> MemoraResult<u64> {
        if !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(MemoraError::validation(format!(
                "prefix '{prefix}' is all hex digits and would match unprefixed entries"
            )));
        }

        let store = self.handle.require()?;
        let deleted = store.clear(prefix).await?;
        info!("Cleared {} cache entries with prefix '{}'", deleted, prefix);
        Ok(deleted)
    }

    /// Check the store is reachable.
    pub async fn health_check(&self) -> MemoraResult<()> {
        self.handle.require()?.ping().await
    }
}
