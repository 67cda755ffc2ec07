//! In-process cache store.

use crate::{CacheStore, Ttl};
use async_trait::async_trait;
use memora_core::{MemoraError, MemoraResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Longest lifetime an entry can get; larger TTLs are clamped to it.
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

fn expiry(now: Instant, ttl: Ttl) -> Instant {
    now.checked_add(ttl.as_duration().min(MAX_TTL)).unwrap_or(now)
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Cache store backed by a process-local map.
///
/// Entries expire after their TTL; when `max_entries` is reached expired
/// entries are purged first, then the entry closest to expiry is evicted.
/// Not shared between processes, so it suits development and tests.
#[derive(Debug)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, Entry>>,
    default_ttl: Ttl,
    max_entries: usize,
}

impl MemoryCacheStore {
    /// Create a new memory store.
    #[must_use]
    pub fn new(default_ttl: Ttl, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// Create a memory store from cache configuration.
    #[must_use]
    pub fn from_config(config: &memora_config::CacheConfig) -> Self {
        Self::new(Ttl::from_secs(config.default_ttl_secs), config.memory_max_entries)
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.lock().values().filter(|e| e.is_live(now)).count()
    }

    /// Returns `true` if the store holds no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, key: &str, value: String, ttl: Ttl) {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        if !entries.contains_key(key) && entries.len() >= self.max_entries {
            entries.retain(|_, e| e.is_live(now));
            if entries.len() >= self.max_entries {
                let victim = entries
                    .iter()
                    .min_by_key(|(_, e)| e.expires_at)
                    .map(|(k, _)| k.clone());
                if let Some(victim) = victim {
                    entries.remove(&victim);
                    debug!(key = %victim, "Evicted memory cache entry");
                }
            }
        }

        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: expiry(now, ttl),
            },
        );
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get_raw(&self, key: &str) -> MemoraResult<Option<String>> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Option<Ttl>) -> MemoraResult<()> {
        self.insert(key, value.to_string(), ttl.unwrap_or(self.default_ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> MemoraResult<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .lock()
            .remove(key)
            .is_some_and(|entry| entry.is_live(now)))
    }

    async fn exists(&self, key: &str) -> MemoraResult<bool> {
        let now = Instant::now();
        Ok(self.entries.lock().get(key).is_some_and(|e| e.is_live(now)))
    }

    async fn clear(&self, prefix: &str) -> MemoraResult<u64> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        let mut expired = 0u64;
        entries.retain(|key, entry| {
            if !key.starts_with(prefix) {
                return true;
            }
            if !entry.is_live(now) {
                expired += 1;
            }
            false
        });
        let removed = (before - entries.len()) as u64 - expired;
        debug!(prefix = %prefix, removed, "Cleared memory cache entries");
        Ok(removed)
    }

    async fn incr_window(&self, key: &str, window: Ttl) -> MemoraResult<u64> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(key).filter(|e| e.is_live(now)) {
            let count: u64 = entry.value.parse().map_err(|_| {
                MemoraError::cache(format!("Value at '{}' is not a counter", key))
            })?;
            let count = count.saturating_add(1);
            entry.value = count.to_string();
            return Ok(count);
        }
        drop(entries);

        self.insert(key, "1".to_string(), window);
        Ok(1)
    }
}
