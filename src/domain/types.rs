//! Identifier aliases and shared domain enumerations.

use serde::{Deserialize, Serialize};

pub type ContentId = i64;
pub type ContentTypeId = i64;
pub type UserId = i64;
pub type TopicId = i64;
pub type GroupId = i64;
pub type LinkId = i64;
pub type FieldGroupId = i64;

/// Sentinel member-group id meaning "no restriction".
pub const PUBLIC_GROUP: GroupId = 0;

/// Sentinel topic id submitted by forms when no topic is selected.
pub const NO_TOPIC: TopicId = 0;

/// Column kind backing a custom field in its extension table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStorageKind {
    Text,
    Varchar,
    Integer,
    Decimal,
    Boolean,
    Date,
    Timestamp,
}

impl FieldStorageKind {
    /// Text-like columns are eligible for full-text indexing.
    pub fn is_text_like(self) -> bool {
        matches!(self, Self::Text | Self::Varchar)
    }

    /// Storage kind used for the built-in field types.
    pub fn for_field_type(field_type: &str) -> Option<Self> {
        let kind = match field_type.trim().to_ascii_lowercase().as_str() {
            "text" | "email" | "select" | "radio" | "file_upload" | "multiselect" => Self::Varchar,
            "textarea" | "wysiwyg" | "markdown" => Self::Text,
            "number" | "integer" | "member_group_relationship" | "relationship" => Self::Integer,
            "decimal" | "price" => Self::Decimal,
            "checkbox" | "toggle" => Self::Boolean,
            "date" => Self::Date,
            "datetime" => Self::Timestamp,
            _ => return None,
        };
        Some(kind)
    }
}
