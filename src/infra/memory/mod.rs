//! In-process storage backend.
//!
//! Implements every persistence trait over a single `RwLock`-guarded state so
//! the content service can run without Postgres (tests, local tooling). Plans
//! are evaluated with the same two-stage semantics the SQL renderer uses.

mod eval;
mod repos;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::cache::RecoverLock;
use crate::domain::entities::{ContentTypeRecord, CustomFieldDef, LinkRecord, UserRecord};
use crate::domain::types::{
    ContentId, ContentTypeId, FieldGroupId, FieldStorageKind, GroupId, LinkId, TopicId, UserId,
};

const SOURCE: &str = "infra::memory";

#[derive(Debug, Clone)]
pub(crate) struct StoredContent {
    pub id: ContentId,
    pub link_id: Option<LinkId>,
    pub type_id: ContentTypeId,
    pub is_standard: bool,
    pub title: String,
    pub author_id: UserId,
    pub created_at: OffsetDateTime,
    pub modified_at: OffsetDateTime,
    pub hits: i64,
    pub privileges: BTreeSet<GroupId>,
    pub topics: BTreeSet<TopicId>,
}

#[derive(Debug, Default)]
pub(crate) struct MemoryState {
    next_content_id: ContentId,
    next_link_id: LinkId,
    pub users: BTreeMap<UserId, UserRecord>,
    pub types: BTreeMap<ContentTypeId, ContentTypeRecord>,
    pub field_groups: BTreeMap<FieldGroupId, Vec<CustomFieldDef>>,
    pub topics: BTreeSet<TopicId>,
    pub links: BTreeMap<LinkId, LinkRecord>,
    pub contents: BTreeMap<ContentId, StoredContent>,
    /// Extension tables by name; a table exists iff its key is present.
    pub tables: HashMap<String, BTreeMap<ContentId, Map<String, Value>>>,
}

impl MemoryState {
    fn allocate_content_id(&mut self) -> ContentId {
        self.next_content_id += 1;
        self.next_content_id
    }

    fn allocate_link_id(&mut self) -> LinkId {
        self.next_link_id += 1;
        self.next_link_id
    }

    /// Registered columns of an extension table with their storage kinds.
    pub fn columns_of(&self, table: &str) -> Vec<(String, Option<FieldStorageKind>)> {
        self.types
            .values()
            .find(|record| record.system_name == table)
            .and_then(|record| self.field_groups.get(&record.custom_field_group_id))
            .map(|fields| {
                fields
                    .iter()
                    .map(|field| {
                        (
                            field.name.clone(),
                            FieldStorageKind::for_field_type(&field.field_type),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Shared in-memory implementation of the storage and registry traits.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    pub(crate) state: RwLock<MemoryState>,
    fail_next_write: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user: UserRecord) {
        self.state.write_or_recover(SOURCE, "add_user")
            .users
            .insert(user.id, user);
    }

    pub fn add_topic(&self, id: TopicId) {
        self.state.write_or_recover(SOURCE, "add_topic").topics.insert(id);
    }

    /// Register a content type and create its (empty) extension table.
    pub fn register_type(&self, record: ContentTypeRecord, fields: Vec<CustomFieldDef>) {
        let mut state = self.state.write_or_recover(SOURCE, "register_type");
        state
            .tables
            .entry(record.system_name.clone())
            .or_default();
        state
            .field_groups
            .insert(record.custom_field_group_id, fields);
        state.types.insert(record.id, record);
    }

    /// Remove an extension table, leaving its type registered.
    pub fn drop_table(&self, table: &str) {
        self.state.write_or_recover(SOURCE, "drop_table").tables.remove(table);
    }

    /// Make the next content write fail before it mutates anything.
    pub fn fail_next_write(&self) {
        self.fail_next_write.store(true, Ordering::SeqCst);
    }

    pub fn link_count(&self) -> usize {
        self.state.read_or_recover(SOURCE, "link_count").links.len()
    }

    pub fn extension_row(&self, table: &str, id: ContentId) -> Option<Map<String, Value>> {
        self.state.read_or_recover(SOURCE, "extension_row")
            .tables
            .get(table)
            .and_then(|rows| rows.get(&id))
            .cloned()
    }

    pub fn has_content(&self, id: ContentId) -> bool {
        self.state.read_or_recover(SOURCE, "has_content")
            .contents
            .contains_key(&id)
    }

    fn take_write_failure(&self) -> bool {
        self.fail_next_write.swap(false, Ordering::SeqCst)
    }
}

/// Coerce a JSON value to what a column of `kind` would store.
pub(crate) fn coerce(kind: Option<FieldStorageKind>, value: Value) -> Value {
    let text = |value: &Value| match value {
        Value::String(text) => Some(text.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    };
    match (kind, &value) {
        (_, Value::Null) => Value::Null,
        (Some(FieldStorageKind::Integer), Value::Number(number)) if number.is_i64() => value,
        (Some(FieldStorageKind::Integer), _) => text(&value)
            .and_then(|text| text.trim().parse::<i64>().ok())
            .map(Value::from)
            .unwrap_or(Value::Null),
        (Some(FieldStorageKind::Decimal), Value::Number(_)) => value,
        (Some(FieldStorageKind::Decimal), _) => text(&value)
            .and_then(|text| text.trim().parse::<f64>().ok())
            .map(Value::from)
            .unwrap_or(Value::Null),
        (Some(FieldStorageKind::Boolean), Value::Bool(_)) => value,
        (Some(FieldStorageKind::Boolean), _) => match text(&value).as_deref().map(str::trim) {
            Some("1" | "true" | "t" | "yes" | "on") => Value::Bool(true),
            Some("0" | "false" | "f" | "no" | "off" | "") => Value::Bool(false),
            _ => Value::Null,
        },
        _ => text(&value).map(Value::String).unwrap_or(Value::Null),
    }
}
