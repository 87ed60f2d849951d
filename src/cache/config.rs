//! Cache configuration.
//!
//! Controls the query/result cache via the `[cache]` section of `folio.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_CAPACITY: usize = 1024;
const DEFAULT_LIST_TTL_SECS: u64 = 5 * 60;
const DEFAULT_COUNT_TTL_SECS: u64 = 30 * 60;
const DEFAULT_SINGLE_TTL_SECS: u64 = 30 * 60;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the query/result cache.
    pub enabled: bool,
    /// Maximum number of cached entries before LRU eviction.
    pub capacity: usize,
    /// Lifetime of cached content lists.
    pub list_ttl_secs: u64,
    /// Lifetime of cached counts.
    pub count_ttl_secs: u64,
    /// Lifetime of cached single-content lookups.
    pub single_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: DEFAULT_CAPACITY,
            list_ttl_secs: DEFAULT_LIST_TTL_SECS,
            count_ttl_secs: DEFAULT_COUNT_TTL_SECS,
            single_ttl_secs: DEFAULT_SINGLE_TTL_SECS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            capacity: settings.capacity,
            list_ttl_secs: settings.list_ttl_secs,
            count_ttl_secs: settings.count_ttl_secs,
            single_ttl_secs: settings.single_ttl_secs,
        }
    }
}

impl CacheConfig {
    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn list_ttl(&self) -> Duration {
        Duration::from_secs(self.list_ttl_secs)
    }

    pub fn count_ttl(&self) -> Duration {
        Duration::from_secs(self.count_ttl_secs)
    }

    pub fn single_ttl(&self) -> Duration {
        Duration::from_secs(self.single_ttl_secs)
    }
}
