use std::collections::BTreeMap;

use chrono_tz::Tz;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use url::Url;

use crate::application::query::QueryTuning;
use crate::application::repos::RepoError;
use crate::cache::CacheConfig;
use crate::domain::entities::ContentRecord;
use crate::domain::error::DomainError;
use crate::domain::publish::RECENT_PUBLISH_WINDOW;
use crate::domain::slug::SlugError;
use crate::domain::types::{ContentId, ContentTypeId, GroupId, TopicId, UserId};
use crate::util::timezone::DEFAULT_DATE_FORMAT;

/// Section label attached to links created for content.
pub const LINK_SECTION: &str = "publish";

const DEFAULT_SITE_URL: &str = "http://localhost/";

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content type `{0}` does not exist")]
    UnknownType(ContentTypeId),
    #[error("field `{field}` is not registered for content type `{type_id}`")]
    UnknownField {
        type_id: ContentTypeId,
        field: String,
    },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<DomainError> for ContentError {
    fn from(error: DomainError) -> Self {
        Self::InvalidInput(error.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreateContent {
    pub type_id: ContentTypeId,
    pub author_id: UserId,
    /// Blank or missing titles create non-standard, link-less content.
    pub title: Option<String>,
    pub url_path: Option<String>,
    pub topics: Vec<TopicId>,
    pub privileges: Vec<GroupId>,
    pub publish_at: Option<OffsetDateTime>,
    pub custom_fields: BTreeMap<String, Value>,
}

impl CreateContent {
    pub fn new(type_id: ContentTypeId, author_id: UserId) -> Self {
        Self {
            type_id,
            author_id,
            title: None,
            url_path: None,
            topics: Vec::new(),
            privileges: Vec::new(),
            publish_at: None,
            custom_fields: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpdateContent {
    pub id: ContentId,
    pub title: Option<String>,
    pub url_path: Option<String>,
    /// Replaces the stored topic set.
    pub topics: Vec<TopicId>,
    /// Replaces the stored privilege set.
    pub privileges: Vec<GroupId>,
    /// Stored verbatim when present.
    pub publish_at: Option<OffsetDateTime>,
    pub custom_fields: BTreeMap<String, Value>,
}

impl UpdateContent {
    pub fn new(id: ContentId) -> Self {
        Self {
            id,
            title: None,
            url_path: None,
            topics: Vec::new(),
            privileges: Vec::new(),
            publish_at: None,
            custom_fields: BTreeMap::new(),
        }
    }
}

/// Result of the general query entry point.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryOutcome {
    Contents(Vec<ContentRecord>),
    Count(u64),
}

impl QueryOutcome {
    pub(crate) fn empty(counting: bool) -> Self {
        if counting {
            Self::Count(0)
        } else {
            Self::Contents(Vec::new())
        }
    }

    pub fn into_contents(self) -> Vec<ContentRecord> {
        match self {
            Self::Contents(contents) => contents,
            Self::Count(_) => Vec::new(),
        }
    }

    pub fn count(&self) -> u64 {
        match self {
            Self::Contents(contents) => contents.len() as u64,
            Self::Count(count) => *count,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContentSettings {
    /// Base for absolute content URLs; always ends with `/`.
    pub site_url: Url,
    pub time_zone: Tz,
    pub date_format: String,
    pub tuning: QueryTuning,
    pub recent_publish_window: Duration,
    pub cache: CacheConfig,
}

impl Default for ContentSettings {
    fn default() -> Self {
        Self {
            site_url: Url::parse(DEFAULT_SITE_URL).expect("default site url is valid"),
            time_zone: Tz::UTC,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            tuning: QueryTuning::default(),
            recent_publish_window: RECENT_PUBLISH_WINDOW,
            cache: CacheConfig::default(),
        }
    }
}
