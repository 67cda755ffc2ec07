//! Shared, late-bound access to the cache store.

use crate::CacheStore;
use memora_core::{MemoraError, MemoraResult};
use parking_lot::RwLock;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Default upper bound for a single store round trip.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_millis(500);

struct Inner {
    store: RwLock<Option<Arc<dyn CacheStore>>>,
    operation_timeout: Duration,
}

/// Cloneable handle through which memoized functions reach the store.
///
/// Handles are created detached and attached once the store connects.
/// All clones observe the same store.
#[derive(Clone)]
pub struct CacheHandle {
    inner: Arc<Inner>,
}

impl CacheHandle {
    /// Creates a detached handle with the default operation timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_OPERATION_TIMEOUT)
    }

    /// Creates a detached handle with a custom operation timeout.
    #[must_use]
    pub fn with_timeout(operation_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: RwLock::new(None),
                operation_timeout,
            }),
        }
    }

    /// Creates a handle already attached to `store`.
    #[must_use]
    pub fn with_store(store: Arc<dyn CacheStore>) -> Self {
        let handle = Self::new();
        handle.attach(store);
        handle
    }

    /// Attach a store, replacing any previous one.
    pub fn attach(&self, store: Arc<dyn CacheStore>) {
        *self.inner.store.write() = Some(store);
    }

    /// Detach the current store, returning it.
    pub fn detach(&self) -> Option<Arc<dyn CacheStore>> {
        self.inner.store.write().take()
    }

    /// Current store, if attached.
    #[must_use]
    pub fn store(&self) -> Option<Arc<dyn CacheStore>> {
        self.inner.store.read().clone()
    }

    /// Current store, or `CacheNotInitialized`.
    pub fn require(&self) -> MemoraResult<Arc<dyn CacheStore>> {
        self.store().ok_or(MemoraError::CacheNotInitialized)
    }

    /// Whether a store is attached.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.inner.store.read().is_some()
    }

    /// Upper bound for a single lookup or write.
    #[must_use]
    pub fn operation_timeout(&self) -> Duration {
        self.inner.operation_timeout
    }

    /// Run one store operation under the operation timeout.
    ///
    /// An elapsed timeout becomes [`MemoraError::Timeout`].
    pub async fn timed<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = MemoraResult<T>>,
    ) -> MemoraResult<T> {
        let limit = self.inner.operation_timeout;
        tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| MemoraError::Timeout(format!("cache {operation} exceeded {limit:?}")))?
    }
}

impl Default for CacheHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CacheHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backend = self.store().map(|s| s.name());
        f.debug_struct("CacheHandle")
            .field("backend", &backend)
            .field("operation_timeout", &self.inner.operation_timeout)
            .finish()
    }
}
