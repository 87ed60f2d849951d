//! Normalization rules applied to content before it is persisted.

use std::collections::BTreeSet;

use time::{Duration, OffsetDateTime};

use crate::domain::types::{GroupId, NO_TOPIC, PUBLIC_GROUP, TopicId};

/// Publish times this close to "now" are treated as published immediately.
pub const RECENT_PUBLISH_WINDOW: Duration = Duration::minutes(30);

/// Resolve the stored publish time for newly created content.
///
/// A missing value, or one that fell within `window` before `now`, resolves to
/// `now`. Anything else is kept as given.
pub fn normalize_publish_at(
    requested: Option<OffsetDateTime>,
    now: OffsetDateTime,
    window: Duration,
) -> OffsetDateTime {
    match requested {
        None => now,
        Some(at) if at < now && now - at < window => now,
        Some(at) => at,
    }
}

/// Privileges are either empty (public) or a set without the public sentinel.
pub fn normalize_privileges(privileges: &[GroupId]) -> BTreeSet<GroupId> {
    if privileges.contains(&PUBLIC_GROUP) {
        return BTreeSet::new();
    }
    privileges.iter().copied().collect()
}

pub fn normalize_topics(topics: &[TopicId]) -> BTreeSet<TopicId> {
    topics
        .iter()
        .copied()
        .filter(|topic| *topic != NO_TOPIC)
        .collect()
}
