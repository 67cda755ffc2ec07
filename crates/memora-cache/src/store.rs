//! Store abstraction the cache layer talks to.

use async_trait::async_trait;
use memora_core::MemoraResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Time-to-live in whole seconds.
///
/// An absent `Ttl` (`None` at call sites) means "use the store's configured
/// default", never "keep forever".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ttl(u64);

impl Ttl {
    /// Creates a TTL from seconds.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Returns the TTL in seconds.
    #[must_use]
    pub const fn as_secs(self) -> u64 {
        self.0
    }

    /// Returns the TTL as a Duration.
    #[must_use]
    pub const fn as_duration(self) -> Duration {
        Duration::from_secs(self.0)
    }
}

impl From<Duration> for Ttl {
    fn from(duration: Duration) -> Self {
        Self(duration.as_secs())
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// Key-value store holding serialized cache entries.
///
/// Values are JSON text so the trait stays object-safe; typed access lives
/// in [`CacheStoreExt`]. Expiration is owned by the store.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Short backend name used in log events.
    fn name(&self) -> &'static str;

    /// Get a raw value. Returns `None` if the key is absent or expired.
    async fn get_raw(&self, key: &str) -> MemoraResult<Option<String>>;

    /// Set a raw value; `None` applies the store's default TTL.
    async fn set_raw(&self, key: &str, value: &str, ttl: Option<Ttl>) -> MemoraResult<()>;

    /// Delete a key. Returns `true` if a key was removed.
    async fn delete(&self, key: &str) -> MemoraResult<bool>;

    /// Check if a key exists.
    async fn exists(&self, key: &str) -> MemoraResult<bool>;

    /// Delete every key starting with `prefix` (everything for an empty
    /// prefix, within the store's own namespace).
    ///
    /// Returns the number of keys deleted.
    async fn clear(&self, prefix: &str) -> MemoraResult<u64>;

    /// Increment a counter, starting its `window` expiry on first use.
    ///
    /// Returns the counter value after the increment.
    async fn incr_window(&self, key: &str, window: Ttl) -> MemoraResult<u64>;

    /// Check connectivity.
    async fn ping(&self) -> MemoraResult<()> {
        Ok(())
    }

    /// Release connections. Called once at shutdown.
    async fn close(&self) {}
}

/// Typed helpers over [`CacheStore`].
#[async_trait]
pub trait CacheStoreExt: CacheStore {
    /// Get a typed value from the cache.
    ///
    /// A stored payload that does not decode into `T` is reported as a
    /// serialization error.
    async fn get<T: serde::de::DeserializeOwned + Send>(&self, key: &str) -> MemoraResult<Option<T>> {
        match self.get_raw(key).await? {
            Some(json) => {
                let value: T = serde_json::from_str(&json)?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Set a typed value in the cache.
    async fn set<T: serde::Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Ttl>,
    ) -> MemoraResult<()> {
        let json = serde_json::to_string(value)?;
        self.set_raw(key, &json, ttl).await
    }
}

impl<S: CacheStore + ?Sized> CacheStoreExt for S {}
