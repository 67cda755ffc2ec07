//! Cache-aside wrapper around an async function.

use crate::key::{build_key, CacheKey, FunctionId, IntoCallArgs};
use crate::metrics::CacheMetrics;
use crate::{CacheHandle, CacheStoreExt, Ttl};
use memora_core::MemoraResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use tracing::{debug, error};

/// Static options of a memoized function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheOptions {
    /// Entry lifetime; `None` uses the store default.
    pub ttl: Option<Ttl>,
    /// Namespace prepended to every key.
    pub prefix: Option<String>,
}

/// An async function whose successful results are cached.
///
/// On each call the arguments are turned into a key and the store is
/// consulted. A hit is returned without running the function. On a miss
/// the function runs and an `Ok` result is written back. Store problems
/// never reach the caller: they are logged and the call behaves as a miss.
pub struct Memoized<F> {
    id: FunctionId,
    options: CacheOptions,
    handle: CacheHandle,
    func: F,
}

impl<F> Memoized<F> {
    /// Wrap `func` under the identity `id`.
    pub fn new(id: FunctionId, handle: CacheHandle, func: F) -> Self {
        Self {
            id,
            options: CacheOptions::default(),
            handle,
            func,
        }
    }

    /// Set the entry TTL.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Ttl) -> Self {
        self.options.ttl = Some(ttl);
        self
    }

    /// Set the key prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.options.prefix = Some(prefix.into());
        self
    }

    /// Replace all options at once.
    #[must_use]
    pub fn with_options(mut self, options: CacheOptions) -> Self {
        self.options = options;
        self
    }

    /// Function identity.
    pub fn id(&self) -> &FunctionId {
        &self.id
    }

    /// Current options.
    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// The key a call with `args` reads and writes.
    pub fn key_for<A: IntoCallArgs>(&self, args: &A) -> CacheKey {
        build_key(&self.id, &args.call_args(), self.options.prefix.as_deref())
    }

    /// Remove the cached result for `args`.
    ///
    /// Returns `true` if an entry was removed. Unlike [`Memoized::call`],
    /// store errors are returned.
    pub async fn invalidate<A: IntoCallArgs>(&self, args: &A) -> MemoraResult<bool> {
        let store = self.handle.require()?;
        let key = self.key_for(args);
        let removed = store.delete(key.as_str()).await?;
        debug!(function = %self.id, key = %key, removed, "Cache invalidated");
        Ok(removed)
    }

    /// Call the wrapped function through the cache.
    pub async fn call<A, Fut, T, E>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        A: IntoCallArgs,
        T: Serialize + DeserializeOwned + Send + Sync,
    {
        let function = self.id.to_string();
        let call_args = args.call_args();
        if call_args.is_opaque() {
            debug!(function = %function, "Arguments not serializable, bypassing cache");
            CacheMetrics::bypass(&function);
            return (self.func)(args).await;
        }

        let key = build_key(&self.id, &call_args, self.options.prefix.as_deref());

        let Some(store) = self.handle.store() else {
            debug!(function = %function, "Cache not initialized, computing");
            return (self.func)(args).await;
        };

        match self.handle.timed("lookup", store.get::<T>(key.as_str())).await {
            Ok(Some(value)) => {
                debug!(function = %function, key = %key, "Cache hit");
                CacheMetrics::hit(&function);
                return Ok(value);
            }
            Ok(None) => {
                debug!(function = %function, key = %key, "Cache miss");
                CacheMetrics::miss(&function);
            }
            Err(e) => {
                error!(function = %function, key = %key, backend = store.name(), error = %e, "Cache lookup failed");
                CacheMetrics::error("lookup", store.name());
                CacheMetrics::miss(&function);
            }
        }

        let result = (self.func)(args).await;

        if let Ok(value) = &result {
            let write = store.set(key.as_str(), value, self.options.ttl);
            match self.handle.timed("write", write).await {
                Ok(()) => debug!(function = %function, key = %key, "Cached result"),
                Err(e) => {
                    error!(function = %function, key = %key, backend = store.name(), error = %e, "Cache write failed");
                    CacheMetrics::error("write", store.name());
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{CallArgs, Kwargs};
    use crate::{CacheStore, MemoryCacheStore};
    use async_trait::async_trait;
    use futures::future::{BoxFuture, FutureExt};
    use memora_core::MemoraError;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Store double recording every write with its TTL.
    #[derive(Default)]
    struct RecordingStore {
        data: Mutex<HashMap<String, String>>,
        writes: Mutex<Vec<(String, Option<Ttl>)>>,
    }

    impl RecordingStore {
        fn writes(&self) -> Vec<(String, Option<Ttl>)> {
            self.writes.lock().clone()
        }
    }

    #[async_trait]
    impl CacheStore for RecordingStore {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn get_raw(&self, key: &str) -> MemoraResult<Option<String>> {
            Ok(self.data.lock().get(key).cloned())
        }

        async fn set_raw(&self, key: &str, value: &str, ttl: Option<Ttl>) -> MemoraResult<()> {
            self.data.lock().insert(key.to_string(), value.to_string());
            self.writes.lock().push((key.to_string(), ttl));
            Ok(())
        }

        async fn delete(&self, key: &str) -> MemoraResult<bool> {
            Ok(self.data.lock().remove(key).is_some())
        }

        async fn exists(&self, key: &str) -> MemoraResult<bool> {
            Ok(self.data.lock().contains_key(key))
        }

        async fn clear(&self, prefix: &str) -> MemoraResult<u64> {
            let mut data = self.data.lock();
            let before = data.len();
            data.retain(|k, _| !k.starts_with(prefix));
            Ok((before - data.len()) as u64)
        }

        async fn incr_window(&self, _key: &str, _window: Ttl) -> MemoraResult<u64> {
            Ok(1)
        }
    }

    /// Store double whose every operation fails.
    struct FailingStore {
        set_attempts: AtomicUsize,
    }

    #[async_trait]
    impl CacheStore for FailingStore {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn get_raw(&self, _key: &str) -> MemoraResult<Option<String>> {
            Err(MemoraError::cache("connection refused"))
        }

        async fn set_raw(&self, _key: &str, _value: &str, _ttl: Option<Ttl>) -> MemoraResult<()> {
            self.set_attempts.fetch_add(1, Ordering::SeqCst);
            Err(MemoraError::cache("connection refused"))
        }

        async fn delete(&self, _key: &str) -> MemoraResult<bool> {
            Err(MemoraError::cache("connection refused"))
        }

        async fn exists(&self, _key: &str) -> MemoraResult<bool> {
            Err(MemoraError::cache("connection refused"))
        }

        async fn clear(&self, _prefix: &str) -> MemoraResult<u64> {
            Err(MemoraError::cache("connection refused"))
        }

        async fn incr_window(&self, _key: &str, _window: Ttl) -> MemoraResult<u64> {
            Err(MemoraError::cache("connection refused"))
        }
    }

    /// Store double that never answers in time.
    struct SlowStore;

    #[async_trait]
    impl CacheStore for SlowStore {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn get_raw(&self, _key: &str) -> MemoraResult<Option<String>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Some("999".to_string()))
        }

        async fn set_raw(&self, _key: &str, _value: &str, _ttl: Option<Ttl>) -> MemoraResult<()> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }

        async fn delete(&self, _key: &str) -> MemoraResult<bool> {
            Ok(false)
        }

        async fn exists(&self, _key: &str) -> MemoraResult<bool> {
            Ok(false)
        }

        async fn clear(&self, _prefix: &str) -> MemoraResult<u64> {
            Ok(0)
        }

        async fn incr_window(&self, _key: &str, _window: Ttl) -> MemoraResult<u64> {
            Ok(1)
        }
    }

    fn id(name: &str) -> FunctionId {
        FunctionId::new("memora_cache::tests", name)
    }

    type Doubled = BoxFuture<'static, Result<u64, String>>;

    /// Wraps a doubling function that counts its invocations.
    fn doubler(handle: CacheHandle, calls: Arc<AtomicUsize>) -> Memoized<impl Fn((u64,)) -> Doubled> {
        Memoized::new(id("double"), handle, move |(n,): (u64,)| -> Doubled {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(n * 2)
            }
            .boxed()
        })
    }

    #[tokio::test]
    async fn test_miss_computes_once_and_writes_once() {
        let store = Arc::new(RecordingStore::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let memo = doubler(CacheHandle::with_store(store.clone()), calls.clone());

        assert_eq!(memo.call((21,)).await, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let writes = store.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, memo.key_for(&(21_u64,)).into_string());
    }

    #[tokio::test]
    async fn test_hit_suppresses_computation() {
        let store = Arc::new(RecordingStore::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let memo = doubler(CacheHandle::with_store(store.clone()), calls.clone());

        assert_eq!(memo.call((5,)).await, Ok(10));
        assert_eq!(memo.call((5,)).await, Ok(10));
        assert_eq!(memo.call((5,)).await, Ok(10));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_hit_returns_stored_value() {
        let store = Arc::new(RecordingStore::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let memo = doubler(CacheHandle::with_store(store.clone()), calls.clone());

        let key = memo.key_for(&(3_u64,));
        store.set_raw(key.as_str(), "100", None).await.unwrap();

        assert_eq!(memo.call((3,)).await, Ok(100));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ttl_is_propagated() {
        let store = Arc::new(RecordingStore::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let with_ttl = doubler(CacheHandle::with_store(store.clone()), calls.clone())
            .with_ttl(Ttl::from_secs(60));
        with_ttl.call((1,)).await.unwrap();

        let default_ttl = doubler(CacheHandle::with_store(store.clone()), calls.clone())
            .with_prefix("other:");
        default_ttl.call((1,)).await.unwrap();

        let writes = store.writes();
        assert_eq!(writes[0].1, Some(Ttl::from_secs(60)));
        assert_eq!(writes[1].1, None);
    }

    #[tokio::test]
    async fn test_store_failure_is_transparent() {
        let store = Arc::new(FailingStore {
            set_attempts: AtomicUsize::new(0),
        });
        let calls = Arc::new(AtomicUsize::new(0));
        let memo = doubler(CacheHandle::with_store(store.clone()), calls.clone());

        assert_eq!(memo.call((4,)).await, Ok(8));
        assert_eq!(memo.call((4,)).await, Ok(8));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.set_attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_round_trip() {
        let store = Arc::new(RecordingStore::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let memo = doubler(CacheHandle::with_store(store.clone()), calls.clone());

        memo.call((9,)).await.unwrap();
        assert!(memo.invalidate(&(9_u64,)).await.unwrap());
        assert!(!memo.invalidate(&(9_u64,)).await.unwrap());

        memo.call((9,)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_only_touches_its_key() {
        let store = Arc::new(RecordingStore::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let memo = doubler(CacheHandle::with_store(store.clone()), calls.clone());

        memo.call((1,)).await.unwrap();
        memo.call((2,)).await.unwrap();
        memo.invalidate(&(1_u64,)).await.unwrap();

        memo.call((2,)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_prefix_isolation() {
        let store = Arc::new(RecordingStore::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = CacheHandle::with_store(store.clone());

        let users = doubler(handle.clone(), calls.clone()).with_prefix("users:");
        let orders = doubler(handle, calls.clone()).with_prefix("orders:");

        users.call((7,)).await.unwrap();
        orders.call((7,)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let removed = store.clear("users:").await.unwrap();
        assert_eq!(removed, 1);

        orders.call((7,)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        users.call((7,)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_errors_are_never_cached() {
        let store = Arc::new(RecordingStore::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let memo = Memoized::new(id("fallible"), CacheHandle::with_store(store.clone()), move |(n,): (i64,)| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if n < 0 {
                    Err(format!("negative input {n}"))
                } else {
                    Ok(n)
                }
            }
        });

        assert_eq!(memo.call((-1,)).await, Err("negative input -1".to_string()));
        assert_eq!(memo.call((-1,)).await, Err("negative input -1".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_detached_handle_always_computes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let memo = doubler(CacheHandle::new(), calls.clone());

        assert_eq!(memo.call((2,)).await, Ok(4));
        assert_eq!(memo.call((2,)).await, Ok(4));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let err = memo.invalidate(&(2_u64,)).await.unwrap_err();
        assert!(matches!(err, MemoraError::CacheNotInitialized));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_timeout_computes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = CacheHandle::with_timeout(Duration::from_millis(100));
        handle.attach(Arc::new(SlowStore));
        let memo = doubler(handle, calls.clone());

        assert_eq!(memo.call((6,)).await, Ok(12));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_timeout_still_returns_result() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = CacheHandle::with_timeout(Duration::from_millis(100));
        handle.attach(Arc::new(SlowStore));
        let memo = doubler(handle, calls.clone());

        assert_eq!(memo.call((7,)).await, Ok(14));
        assert_eq!(memo.call((7,)).await, Ok(14));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unbounded_ttl_over_memory_store() {
        let store = Arc::new(MemoryCacheStore::new(Ttl::from_secs(60), 100));
        let calls = Arc::new(AtomicUsize::new(0));
        let memo = doubler(CacheHandle::with_store(store.clone()), calls.clone())
            .with_ttl(Ttl::from_secs(u64::MAX));

        assert_eq!(memo.call((1,)).await, Ok(2));
        assert_eq!(memo.call((1,)).await, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(store.exists(memo.key_for(&(1_u64,)).as_str()).await.unwrap());
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let store = Arc::new(RecordingStore::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let memo = doubler(CacheHandle::with_store(store.clone()), calls.clone());

        let key = memo.key_for(&(8_u64,));
        store.set_raw(key.as_str(), "\"not a number\"", None).await.unwrap();

        assert_eq!(memo.call((8,)).await, Ok(16));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.get_raw(key.as_str()).await.unwrap().as_deref(), Some("16"));
    }

    #[tokio::test]
    async fn test_opaque_args_bypass_cache() {
        let store = Arc::new(RecordingStore::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let memo = Memoized::new(
            id("sum_values"),
            CacheHandle::with_store(store.clone()),
            move |(map,): (HashMap<(u8, u8), u32>,)| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(map.values().sum::<u32>())
                }
            },
        );

        let mut input = HashMap::new();
        input.insert((0, 1), 5);

        assert_eq!(memo.call((input.clone(),)).await, Ok(5));
        assert_eq!(memo.call((input,)).await, Ok(5));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(store.writes().is_empty());
    }

    #[derive(Serialize)]
    struct Search {
        term: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        page: Option<u32>,
    }

    #[tokio::test]
    async fn test_kwargs_and_explicit_call_args_share_entries() {
        let store = Arc::new(MemoryCacheStore::new(Ttl::from_secs(60), 100));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let memo = Memoized::new(id("search"), CacheHandle::with_store(store), move |_args: CallArgs| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(vec!["result".to_string()])
            }
        });

        let search = Kwargs(Search {
            term: "rust".to_string(),
            page: None,
        });
        let explicit = CallArgs::new().kwarg("term", "rust");
        assert_eq!(memo.key_for(&search), memo.key_for(&explicit));

        memo.call(explicit.clone()).await.unwrap();
        memo.call(explicit).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
