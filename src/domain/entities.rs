//! Domain entities mirrored from persistent storage.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::domain::types::{
    ContentId, ContentTypeId, FieldGroupId, GroupId, LinkId, TopicId, UserId,
};

/// Schema descriptor for a class of content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentTypeRecord {
    pub id: ContentTypeId,
    /// Name of the extension table holding the type's custom fields.
    pub system_name: String,
    pub display_name: String,
    pub custom_field_group_id: FieldGroupId,
    pub template: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFieldDef {
    pub name: String,
    pub field_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub id: LinkId,
    pub url_path: String,
    pub title: String,
    pub topics: Vec<TopicId>,
    pub type_label: String,
    pub section: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// A fully assembled content item: fixed metadata plus flattened custom fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: ContentId,
    pub link_id: Option<LinkId>,
    /// Publish date rendered with the requested or default format.
    pub date: String,
    pub modified_date: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub modified_at: OffsetDateTime,
    pub author_id: UserId,
    pub author_username: Option<String>,
    pub author_first_name: Option<String>,
    pub author_last_name: Option<String>,
    pub author_email: Option<String>,
    pub type_id: ContentTypeId,
    pub type_name: Option<String>,
    pub is_standard: bool,
    pub title: String,
    pub url_path: Option<String>,
    pub url: Option<String>,
    /// `None` means the content is public.
    pub privileges: Option<BTreeSet<GroupId>>,
    pub topics: BTreeSet<TopicId>,
    pub template: Option<String>,
    pub hits: u64,
    pub relevance: Option<f64>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl ContentRecord {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn is_public(&self) -> bool {
        self.privileges.is_none()
    }
}

/// Title shown for content stored without an explicit title.
pub fn placeholder_title(id: ContentId) -> String {
    format!("Entry #{id}")
}
