//! Caller-facing filter set accepted by the content query engine.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::identifiers::is_safe_identifier;
use crate::domain::types::{ContentId, ContentTypeId, TopicId, UserId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterParseError {
    #[error("unknown sort direction `{0}`")]
    SortDirection(String),
    #[error("invalid sort key `{0}`")]
    SortKey(String),
}

/// A filter that accepts either a single value or a set of values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: Copy> OneOrMany<T> {
    pub fn to_vec(&self) -> Vec<T> {
        match self {
            Self::One(value) => vec![*value],
            Self::Many(values) => values.clone(),
        }
    }
}

impl<T> From<T> for OneOrMany<T> {
    fn from(value: T) -> Self {
        Self::One(value)
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(values: Vec<T>) -> Self {
        Self::Many(values)
    }
}

/// Columns of the fixed `content` table that can be sorted on before joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixedColumn {
    Id,
    Date,
    Modified,
    Title,
    Hits,
    Author,
    Type,
    IsStandard,
}

impl FixedColumn {
    pub fn column(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Date => "created_at",
            Self::Modified => "modified_at",
            Self::Title => "title",
            Self::Hits => "hits",
            Self::Author => "author_id",
            Self::Type => "type_id",
            Self::IsStandard => "is_standard",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SortKey {
    Fixed(FixedColumn),
    Relevance,
    AuthorUsername,
    /// A custom field of the resolved content type.
    Field(String),
}

impl SortKey {
    /// Whether the key can be ordered on inside the fixed-table subquery.
    pub fn is_fixed(&self) -> bool {
        matches!(self, Self::Fixed(_))
    }
}

impl FromStr for SortKey {
    type Err = FilterParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let name = trimmed.strip_prefix("content.").unwrap_or(trimmed);
        let key = match name.to_ascii_lowercase().as_str() {
            "id" | "content_id" => Self::Fixed(FixedColumn::Id),
            "date" | "content_date" | "created_at" => Self::Fixed(FixedColumn::Date),
            "modified" | "content_modified" | "modified_at" => Self::Fixed(FixedColumn::Modified),
            "title" | "content_title" => Self::Fixed(FixedColumn::Title),
            "hits" | "content_hits" => Self::Fixed(FixedColumn::Hits),
            "author" | "author_id" | "user_id" => Self::Fixed(FixedColumn::Author),
            "type" | "type_id" | "content_type_id" => Self::Fixed(FixedColumn::Type),
            "is_standard" | "content_is_standard" => Self::Fixed(FixedColumn::IsStandard),
            "relevance" => Self::Relevance,
            "author_username" | "user_username" | "username" => Self::AuthorUsername,
            _ => {
                let field = name.rsplit('.').next().unwrap_or(name);
                if !is_safe_identifier(field) {
                    return Err(FilterParseError::SortKey(value.to_string()));
                }
                Self::Field(field.to_string())
            }
        };
        Ok(key)
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(column) => f.write_str(column.column()),
            Self::Relevance => f.write_str("relevance"),
            Self::AuthorUsername => f.write_str("author_username"),
            Self::Field(name) => f.write_str(name),
        }
    }
}

impl TryFrom<String> for SortKey {
    type Error = FilterParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SortKey> for String {
    fn from(key: SortKey) -> Self {
        key.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SortDirection {
    Asc,
    Desc,
    Random,
}

impl FromStr for SortDirection {
    type Err = FilterParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            "rand()" | "random" => Ok(Self::Random),
            _ => Err(FilterParseError::SortDirection(value.to_string())),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
            Self::Random => "random",
        })
    }
}

impl TryFrom<String> for SortDirection {
    type Error = FilterParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SortDirection> for String {
    fn from(direction: SortDirection) -> Self {
        direction.to_string()
    }
}

/// Filters understood by the content query engine.
///
/// Every key is optional. `fields` holds custom-field filters keyed by field
/// name (optionally prefixed with the extension table, `articles.body`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentFilter {
    #[serde(with = "time::serde::rfc3339::option")]
    pub start_date: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub end_date: Option<OffsetDateTime>,
    pub type_id: Option<ContentTypeId>,
    pub id: Option<ContentId>,
    pub is_standard: Option<bool>,
    pub title: Option<String>,
    pub author: Option<OneOrMany<UserId>>,
    pub topic: Option<OneOrMany<TopicId>>,
    pub author_like: Option<String>,
    pub keyword: Option<String>,
    pub date_format: Option<String>,
    pub allow_future: bool,
    pub sort: Option<SortKey>,
    pub sort_dir: Option<SortDirection>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub fields: BTreeMap<String, String>,
}

impl ContentFilter {
    pub fn by_id(id: ContentId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn of_type(type_id: ContentTypeId) -> Self {
        Self {
            type_id: Some(type_id),
            ..Self::default()
        }
    }

    pub fn is_random(&self) -> bool {
        self.sort_dir == Some(SortDirection::Random)
    }

    /// Keyword with surrounding whitespace removed; blank keywords count as absent.
    pub fn keyword(&self) -> Option<&str> {
        self.keyword
            .as_deref()
            .map(str::trim)
            .filter(|keyword| !keyword.is_empty())
    }

    /// Custom-field filter for `field`, accepting the table-qualified spelling too.
    pub fn field_filter(&self, table: &str, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .or_else(|| self.fields.get(&format!("{table}.{field}")))
            .map(String::as_str)
    }
}
