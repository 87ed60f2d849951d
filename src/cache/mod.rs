//! Folio query/result cache.
//!
//! Results of content reads are cached under deterministic keys with a TTL.
//! Every write clears the whole cache; correctness wins over hit rate.
//!
//! ```toml
//! [cache]
//! enabled = true
//! capacity = 1024
//! list_ttl_secs = 300
//! ```

mod config;
mod keys;
mod lock;
mod store;

use std::time::Duration;

pub use config::CacheConfig;
pub use keys::{CacheKey, filter_digest};
pub use store::{NoopCache, TtlStore};

pub(crate) use lock::RecoverLock;

use crate::domain::entities::ContentRecord;

/// A cached read result.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    /// The read was performed and found nothing.
    Empty,
    Content(Box<ContentRecord>),
    Contents(Vec<ContentRecord>),
    Count(u64),
}

/// Key/value cache contract used by the content service.
pub trait ContentCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<CachedValue>;

    fn set(&self, key: CacheKey, value: CachedValue, ttl: Duration);

    fn clear(&self);
}
