//! # Memora Cache
//!
//! Cache-aside memoization over an external key-value store.
//!
//! A [`Memoized`] wrapper derives a deterministic [`CacheKey`] from a
//! function identity and its arguments, answers from the store on a hit,
//! and computes then writes back with a TTL on a miss. Store failures are
//! logged and degrade to "compute fresh"; errors from the wrapped function
//! are returned untouched and never cached.
//!
//! ```ignore
//! let handle = manager.handle();
//! let lookup = Memoized::new(function_id!("find_user"), handle, |(id,): (u64,)| async move {
//!     repository.find(id).await
//! })
//! .with_ttl(Ttl::from_secs(60));
//!
//! let user = lookup.call((42,)).await?;
//! lookup.invalidate(&(42,)).await?;
//! ```

mod handle;
pub mod key;
mod manager;
mod memoize;
pub mod metrics;
mod memory_store;
mod redis_store;
mod store;

pub use handle::CacheHandle;
pub use key::{build_key, CacheKey, CallArgs, FunctionId, IntoCallArgs, Kwargs};
pub use manager::CacheManager;
pub use memoize::{CacheOptions, Memoized};
pub use metrics::{register_metrics, CacheMetrics};
pub use memory_store::MemoryCacheStore;
pub use redis_store::{create_pool, RedisCacheStore};
pub use store::{CacheStore, CacheStoreExt, Ttl};
