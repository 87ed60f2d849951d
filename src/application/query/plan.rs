//! Structured, storage-neutral description of a content query.
//!
//! A plan has two stages. The inner stage reads the fixed `content` table,
//! applies every fixed-table predicate and, when the sort key allows it, the
//! ordering and pagination. The outer stage joins users, content types, links
//! and the extension table, then applies late predicates and any ordering that
//! needs joined columns. Storage backends execute plans; they never interpret
//! caller filters directly.

use time::OffsetDateTime;

use crate::domain::entities::CustomFieldDef;
use crate::domain::types::{ContentId, ContentTypeId, TopicId, UserId};

use super::filter::FixedColumn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Only the ids of the fixed-table subquery are selected and counted.
    Count,
    /// Full materialization with joins and extension fields.
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Inner,
    Outer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionJoin {
    /// Validated extension table name.
    pub table: String,
    /// Registered custom fields, in registry order, with validated names.
    pub fields: Vec<CustomFieldDef>,
}

impl ExtensionJoin {
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|field| field.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchClause {
    /// Case-insensitive substring match on the title or any listed field.
    Pattern { keyword: String, fields: Vec<String> },
    /// Relevance-ranked full-text match over `fields`, or a title substring match.
    FullText { keyword: String, fields: Vec<String> },
}

impl SearchClause {
    pub fn keyword(&self) -> &str {
        match self {
            Self::Pattern { keyword, .. } | Self::FullText { keyword, .. } => keyword,
        }
    }

    pub fn fields(&self) -> &[String] {
        match self {
            Self::Pattern { fields, .. } | Self::FullText { fields, .. } => fields,
        }
    }

    pub fn is_ranked(&self) -> bool {
        matches!(self, Self::FullText { .. })
    }
}

/// Predicates evaluated against the fixed table inside the inner stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    CreatedFrom(OffsetDateTime),
    CreatedUntil(OffsetDateTime),
    TypeIs(ContentTypeId),
    IdIs(ContentId),
    IsStandard(bool),
    TitleContains(String),
    AuthorIn(Vec<UserId>),
    /// Matches content mapped to at least one of the topics.
    TopicIn(Vec<TopicId>),
    PublishedBefore(OffsetDateTime),
}

/// Predicates that need the users or extension table joined first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LatePredicate {
    AuthorLike(String),
    FieldContains { field: String, value: String },
    /// The field is null or empty.
    FieldBlank { field: String },
}

impl LatePredicate {
    pub fn needs_users(&self) -> bool {
        matches!(self, Self::AuthorLike(_))
    }

    pub fn needs_extension(&self) -> bool {
        matches!(self, Self::FieldContains { .. } | Self::FieldBlank { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderKey {
    Fixed(FixedColumn),
    Relevance,
    AuthorUsername,
    Field(String),
    Random,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordering {
    pub key: OrderKey,
    pub descending: bool,
    pub stage: Stage,
}

impl Ordering {
    pub fn by_id_desc() -> Self {
        Self {
            key: OrderKey::Fixed(FixedColumn::Id),
            descending: true,
            stage: Stage::Inner,
        }
    }

    pub fn is_random(&self) -> bool {
        self.key == OrderKey::Random
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContentQueryPlan {
    pub projection: Projection,
    pub extension: Option<ExtensionJoin>,
    pub search: Option<SearchClause>,
    pub predicates: Vec<Predicate>,
    pub late: Vec<LatePredicate>,
    pub ordering: Ordering,
    /// Pagination applies at `ordering.stage`.
    pub page: Option<Page>,
}

impl ContentQueryPlan {
    pub fn is_counting(&self) -> bool {
        self.projection == Projection::Count
    }

    /// Inner stage needs the extension table for searching custom fields.
    pub fn searches_extension(&self) -> bool {
        self.extension.is_some()
            && self
                .search
                .as_ref()
                .is_some_and(|search| !search.fields().is_empty())
    }

    pub fn needs_users_join(&self) -> bool {
        self.late.iter().any(LatePredicate::needs_users)
            || (!self.is_counting() && self.ordering.key == OrderKey::AuthorUsername)
    }

    /// Outer stage needs the extension table for projection, filtering or ordering.
    pub fn needs_extension_join(&self) -> bool {
        if self.extension.is_none() {
            return false;
        }
        if self.late.iter().any(LatePredicate::needs_extension) {
            return true;
        }
        !self.is_counting()
    }

    pub fn inner_page(&self) -> Option<Page> {
        if self.ordering.stage == Stage::Inner {
            self.page
        } else {
            None
        }
    }

    pub fn outer_page(&self) -> Option<Page> {
        if self.ordering.stage == Stage::Outer {
            self.page
        } else {
            None
        }
    }
}
