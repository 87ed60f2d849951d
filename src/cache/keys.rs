//! Cache key definitions.
//!
//! Single-content lookups are keyed by id and the allow-future flag. Lists and
//! counts are keyed by a SHA-256 digest of the canonical JSON encoding of the
//! whole filter set, so equal filters always map to the same entry.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::application::query::ContentFilter;
use crate::domain::types::ContentId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Content { id: ContentId, allow_future: bool },
    Contents { digest: String, counting: bool },
}

impl CacheKey {
    pub fn content(id: ContentId, allow_future: bool) -> Self {
        Self::Content { id, allow_future }
    }

    pub fn contents(filter: &ContentFilter, counting: bool) -> Self {
        Self::Contents {
            digest: filter_digest(filter),
            counting,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Content { id, allow_future } => {
                write!(f, "content:{id}:{}", u8::from(*allow_future))
            }
            Self::Contents { digest, counting } => {
                write!(f, "contents:{digest}")?;
                if *counting {
                    f.write_str(":counting")?;
                }
                Ok(())
            }
        }
    }
}

/// Hex-encoded SHA-256 of the filter's canonical JSON form.
pub fn filter_digest(filter: &ContentFilter) -> String {
    let encoded = serde_json::to_vec(filter).unwrap_or_else(|_| format!("{filter:?}").into_bytes());
    let mut hasher = Sha256::new();
    hasher.update(&encoded);
    hex::encode(hasher.finalize())
}
