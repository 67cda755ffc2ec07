//! Common test infrastructure for cache integration tests.
#![allow(dead_code)]

use memora_cache::CacheManager;
use memora_config::{CacheBackend, CacheConfig};
use testcontainers::{runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::redis::{Redis, REDIS_PORT};

/// Creates an initialized manager over the in-process store.
pub async fn memory_manager(key_prefix: &str) -> CacheManager {
    let config = CacheConfig {
        backend: CacheBackend::Memory,
        key_prefix: key_prefix.to_string(),
        default_ttl_secs: 60,
        ..CacheConfig::default()
    };
    let manager = CacheManager::new(config);
    manager.init().await.expect("Failed to init memory cache");
    manager
}

/// Test Redis container wrapper.
///
/// Keeps the container alive for as long as the value lives.
pub struct TestRedis {
    _container: ContainerAsync<Redis>,
    url: String,
}

impl TestRedis {
    /// Starts a fresh Redis container.
    pub async fn new() -> Self {
        let container = Redis::default()
            .start()
            .await
            .expect("Failed to start Redis container");

        let port = container
            .get_host_port_ipv4(REDIS_PORT)
            .await
            .expect("Failed to get Redis port");

        Self {
            _container: container,
            url: format!("redis://127.0.0.1:{}/0", port),
        }
    }

    /// Cache configuration pointing at the container.
    pub fn config(&self, key_prefix: &str) -> CacheConfig {
        CacheConfig {
            backend: CacheBackend::Redis,
            url: self.url.clone(),
            key_prefix: key_prefix.to_string(),
            default_ttl_secs: 60,
            pool_size: 4,
            ..CacheConfig::default()
        }
    }

    /// Creates an initialized manager against the container.
    pub async fn manager(&self, key_prefix: &str) -> CacheManager {
        let manager = CacheManager::new(self.config(key_prefix));
        manager.init().await.expect("Failed to init Redis cache");
        manager
    }
}
