//! Cache storage implementations.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use lru::LruCache;
use metrics::counter;

use super::config::CacheConfig;
use super::keys::CacheKey;
use super::lock::RecoverLock;
use super::{CachedValue, ContentCache};

const SOURCE: &str = "cache::store";

struct Entry {
    value: CachedValue,
    expires_at: Instant,
}

/// In-process cache with per-entry expiry and LRU eviction.
pub struct TtlStore {
    entries: RwLock<LruCache<CacheKey, Entry>>,
}

impl TtlStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
        }
    }

    /// Number of stored entries, expired ones included until they are touched.
    pub fn len(&self) -> usize {
        self.entries.read_or_recover(SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ContentCache for TtlStore {
    fn get(&self, key: &CacheKey) -> Option<CachedValue> {
        let mut entries = self.entries.write_or_recover(SOURCE, "get");
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                counter!("folio_cache_hit_total").increment(1);
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        counter!("folio_cache_miss_total").increment(1);
        None
    }

    fn set(&self, key: CacheKey, value: CachedValue, ttl: Duration) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        let mut entries = self.entries.write_or_recover(SOURCE, "set");
        if let Some((evicted, _)) = entries.push(key.clone(), entry) {
            if evicted != key {
                counter!("folio_cache_evict_total").increment(1);
            }
        }
    }

    fn clear(&self) {
        self.entries.write_or_recover(SOURCE, "clear").clear();
    }
}

/// Cache used when caching is disabled: nothing is ever stored.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl ContentCache for NoopCache {
    fn get(&self, _key: &CacheKey) -> Option<CachedValue> {
        None
    }

    fn set(&self, _key: CacheKey, _value: CachedValue, _ttl: Duration) {}

    fn clear(&self) {}
}
