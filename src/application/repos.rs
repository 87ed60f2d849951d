//! Repository traits describing persistence adapters and collaborators.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use time::OffsetDateTime;

use crate::application::query::ContentQueryPlan;
use crate::domain::entities::{ContentTypeRecord, CustomFieldDef, LinkRecord};
use crate::domain::slug::{SlugError, path_candidates, prepare_url_path};
use crate::domain::types::{
    ContentId, ContentTypeId, FieldGroupId, FieldStorageKind, GroupId, LinkId, TopicId, UserId,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

/// Failure while picking a free URL path.
#[derive(Debug, Error)]
pub enum PathError {
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

/// A content row as returned by a storage backend, before assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentRow {
    pub id: ContentId,
    pub link_id: Option<LinkId>,
    pub type_id: ContentTypeId,
    pub is_standard: bool,
    pub title: String,
    pub author_id: UserId,
    pub created_at: OffsetDateTime,
    pub modified_at: OffsetDateTime,
    pub hits: i64,
    pub privileges: Vec<GroupId>,
    pub topics: Vec<TopicId>,
    pub author_username: Option<String>,
    pub author_first_name: Option<String>,
    pub author_last_name: Option<String>,
    pub author_email: Option<String>,
    pub type_name: Option<String>,
    pub template: Option<String>,
    pub url_path: Option<String>,
    pub relevance: Option<f64>,
    /// Extension table columns, minus `content_id`. Empty when not joined.
    pub extension: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct InsertContentParams {
    pub type_id: ContentTypeId,
    pub extension_table: String,
    pub link_id: Option<LinkId>,
    pub is_standard: bool,
    pub title: String,
    pub author_id: UserId,
    pub privileges: BTreeSet<GroupId>,
    pub topics: BTreeSet<TopicId>,
    pub created_at: OffsetDateTime,
    pub modified_at: OffsetDateTime,
    pub fields: BTreeMap<String, Value>,
}

#[derive(Debug, Clone)]
pub struct UpdateContentParams {
    pub id: ContentId,
    pub extension_table: String,
    /// `None` keeps the stored title.
    pub title: Option<String>,
    pub privileges: BTreeSet<GroupId>,
    pub topics: BTreeSet<TopicId>,
    /// `None` keeps the stored publish date.
    pub created_at: Option<OffsetDateTime>,
    pub modified_at: OffsetDateTime,
    /// Only these extension columns are rewritten.
    pub fields: BTreeMap<String, Value>,
}

/// Where a stored content row points, read without touching its extension table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentLocator {
    pub type_id: ContentTypeId,
    pub link_id: Option<LinkId>,
}

/// Storage engine for content: executes query plans and write sequences.
///
/// Each write method runs its fixed-row, topic-map and extension-row changes
/// atomically.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn count_of_type(&self, type_id: ContentTypeId) -> Result<u64, RepoError>;

    async fn type_of(&self, id: ContentId) -> Result<Option<ContentTypeId>, RepoError>;

    async fn locate(&self, id: ContentId) -> Result<Option<ContentLocator>, RepoError>;

    async fn count_rows(&self, plan: &ContentQueryPlan) -> Result<u64, RepoError>;

    async fn fetch_rows(&self, plan: &ContentQueryPlan) -> Result<Vec<ContentRow>, RepoError>;

    async fn find_id_by_link(&self, link_id: LinkId) -> Result<Option<ContentId>, RepoError>;

    /// Increment the view counter, returning the new value when the content exists.
    async fn increment_hits(&self, id: ContentId) -> Result<Option<u64>, RepoError>;

    async fn insert_content(&self, params: InsertContentParams) -> Result<ContentId, RepoError>;

    async fn update_content(&self, params: UpdateContentParams) -> Result<(), RepoError>;

    /// Delete content, its topic map and, when the table exists, its extension row.
    async fn delete_content(
        &self,
        id: ContentId,
        extension_table: Option<&str>,
    ) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait ContentTypeRegistry: Send + Sync {
    async fn resolve(&self, id: ContentTypeId) -> Result<Option<ContentTypeRecord>, RepoError>;
}

#[async_trait]
pub trait CustomFieldRegistry: Send + Sync {
    /// Fields of a group in display order.
    async fn fields_for(&self, group: FieldGroupId) -> Result<Vec<CustomFieldDef>, RepoError>;

    fn storage_kind(&self, field_type: &str) -> Option<FieldStorageKind> {
        FieldStorageKind::for_field_type(field_type)
    }
}

#[derive(Debug, Clone)]
pub struct NewLink {
    /// Already normalized and unique.
    pub url_path: String,
    pub topics: Vec<TopicId>,
    pub title: String,
    pub type_label: String,
    pub section: String,
}

#[async_trait]
pub trait LinkService: Send + Sync {
    async fn create_link(&self, link: NewLink) -> Result<LinkId, RepoError>;

    async fn find_link(&self, id: LinkId) -> Result<Option<LinkRecord>, RepoError>;

    async fn find_by_path(&self, url_path: &str) -> Result<Option<LinkRecord>, RepoError>;

    async fn update_path(&self, id: LinkId, url_path: &str) -> Result<(), RepoError>;

    async fn update_title(&self, id: LinkId, title: &str) -> Result<(), RepoError>;

    async fn update_topics(&self, id: LinkId, topics: &[TopicId]) -> Result<(), RepoError>;

    async fn delete_link(&self, id: LinkId) -> Result<(), RepoError>;

    /// Normalize a caller-supplied path into its stored form.
    fn prepare_path(&self, url_path: &str) -> Result<String, SlugError> {
        prepare_url_path(url_path)
    }

    /// Normalize `url_path` and suffix it until no other link uses it.
    ///
    /// A path held by `owner` counts as free, so a link keeps its own path.
    async fn ensure_unique_path(
        &self,
        url_path: &str,
        owner: Option<LinkId>,
    ) -> Result<String, PathError> {
        let base = prepare_url_path(url_path)?;
        for candidate in path_candidates(&base) {
            let taken = self
                .find_by_path(&candidate)
                .await?
                .is_some_and(|link| Some(link.id) != owner);
            if !taken {
                return Ok(candidate);
            }
        }
        Err(SlugError::Exhausted { base }.into())
    }
}
