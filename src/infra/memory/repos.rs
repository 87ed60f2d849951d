use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::application::query::ContentQueryPlan;
use crate::application::repos::{
    ContentLocator, ContentRow, ContentStore, ContentTypeRegistry, CustomFieldRegistry,
    InsertContentParams, LinkService, NewLink, RepoError, UpdateContentParams,
};
use crate::cache::RecoverLock;
use crate::domain::entities::{ContentTypeRecord, CustomFieldDef, LinkRecord};
use crate::domain::types::{ContentId, ContentTypeId, FieldGroupId, LinkId, TopicId};

use super::eval::evaluate;
use super::{MemoryBackend, MemoryState, SOURCE, StoredContent, coerce};

fn ensure_topics_exist(state: &MemoryState, topics: &BTreeSet<TopicId>) -> Result<(), RepoError> {
    match topics.iter().find(|topic| !state.topics.contains(topic)) {
        Some(topic) => Err(RepoError::invalid_input(format!(
            "topic {topic} violates foreign key constraint"
        ))),
        None => Ok(()),
    }
}

/// Coerced extension values for the registered columns present in `fields`.
fn extension_values(
    state: &MemoryState,
    table: &str,
    fields: impl IntoIterator<Item = (String, Value)>,
) -> Result<Map<String, Value>, RepoError> {
    let columns = state.columns_of(table);
    let mut row = Map::new();
    for (name, value) in fields {
        let Some((_, kind)) = columns.iter().find(|(column, _)| *column == name) else {
            return Err(RepoError::from_persistence(format!(
                "column \"{name}\" of relation \"{table}\" does not exist"
            )));
        };
        row.insert(name, coerce(*kind, value));
    }
    Ok(row)
}

fn missing_table(table: &str) -> RepoError {
    RepoError::from_persistence(format!("relation \"{table}\" does not exist"))
}

#[async_trait]
impl ContentStore for MemoryBackend {
    async fn count_of_type(&self, type_id: ContentTypeId) -> Result<u64, RepoError> {
        let state = self.state.read_or_recover(SOURCE, "count_of_type");
        Ok(state
            .contents
            .values()
            .filter(|content| content.type_id == type_id)
            .count() as u64)
    }

    async fn type_of(&self, id: ContentId) -> Result<Option<ContentTypeId>, RepoError> {
        let state = self.state.read_or_recover(SOURCE, "type_of");
        Ok(state.contents.get(&id).map(|content| content.type_id))
    }

    async fn locate(&self, id: ContentId) -> Result<Option<ContentLocator>, RepoError> {
        let state = self.state.read_or_recover(SOURCE, "locate");
        Ok(state.contents.get(&id).map(|content| ContentLocator {
            type_id: content.type_id,
            link_id: content.link_id,
        }))
    }

    async fn count_rows(&self, plan: &ContentQueryPlan) -> Result<u64, RepoError> {
        let state = self.state.read_or_recover(SOURCE, "count_rows");
        Ok(evaluate(&state, plan)?.len() as u64)
    }

    async fn fetch_rows(&self, plan: &ContentQueryPlan) -> Result<Vec<ContentRow>, RepoError> {
        let state = self.state.read_or_recover(SOURCE, "fetch_rows");
        evaluate(&state, plan)
    }

    async fn find_id_by_link(&self, link_id: LinkId) -> Result<Option<ContentId>, RepoError> {
        let state = self.state.read_or_recover(SOURCE, "find_id_by_link");
        Ok(state
            .contents
            .values()
            .find(|content| content.link_id == Some(link_id))
            .map(|content| content.id))
    }

    async fn increment_hits(&self, id: ContentId) -> Result<Option<u64>, RepoError> {
        let mut state = self.state.write_or_recover(SOURCE, "increment_hits");
        Ok(state.contents.get_mut(&id).map(|content| {
            content.hits += 1;
            u64::try_from(content.hits).unwrap_or(0)
        }))
    }

    async fn insert_content(&self, params: InsertContentParams) -> Result<ContentId, RepoError> {
        if self.take_write_failure() {
            return Err(RepoError::from_persistence("injected write failure"));
        }
        let mut state = self.state.write_or_recover(SOURCE, "insert_content");
        ensure_topics_exist(&state, &params.topics)?;
        if !state.tables.contains_key(&params.extension_table) {
            return Err(missing_table(&params.extension_table));
        }

        let columns = state.columns_of(&params.extension_table);
        let mut row = extension_values(&state, &params.extension_table, params.fields)?;
        for (column, _) in columns {
            row.entry(column).or_insert(Value::Null);
        }

        let id = state.allocate_content_id();
        state.contents.insert(
            id,
            StoredContent {
                id,
                link_id: params.link_id,
                type_id: params.type_id,
                is_standard: params.is_standard,
                title: params.title,
                author_id: params.author_id,
                created_at: params.created_at,
                modified_at: params.modified_at,
                hits: 0,
                privileges: params.privileges,
                topics: params.topics,
            },
        );
        if let Some(rows) = state.tables.get_mut(&params.extension_table) {
            rows.insert(id, row);
        }
        Ok(id)
    }

    async fn update_content(&self, params: UpdateContentParams) -> Result<(), RepoError> {
        if self.take_write_failure() {
            return Err(RepoError::from_persistence("injected write failure"));
        }
        let mut state = self.state.write_or_recover(SOURCE, "update_content");
        if !state.contents.contains_key(&params.id) {
            return Err(RepoError::NotFound);
        }
        ensure_topics_exist(&state, &params.topics)?;
        if !state.tables.contains_key(&params.extension_table) {
            return Err(missing_table(&params.extension_table));
        }
        let values = extension_values(&state, &params.extension_table, params.fields)?;

        if let Some(content) = state.contents.get_mut(&params.id) {
            if let Some(title) = params.title {
                content.title = title;
            }
            if let Some(created_at) = params.created_at {
                content.created_at = created_at;
            }
            content.modified_at = params.modified_at;
            content.privileges = params.privileges;
            content.topics = params.topics;
        }
        if let Some(rows) = state.tables.get_mut(&params.extension_table) {
            rows.entry(params.id).or_default().extend(values);
        }
        Ok(())
    }

    async fn delete_content(
        &self,
        id: ContentId,
        extension_table: Option<&str>,
    ) -> Result<bool, RepoError> {
        let mut state = self.state.write_or_recover(SOURCE, "delete_content");
        let removed = state.contents.remove(&id).is_some();
        if let Some(rows) = extension_table.and_then(|table| state.tables.get_mut(table)) {
            rows.remove(&id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl ContentTypeRegistry for MemoryBackend {
    async fn resolve(&self, id: ContentTypeId) -> Result<Option<ContentTypeRecord>, RepoError> {
        Ok(self.state.read_or_recover(SOURCE, "resolve").types.get(&id).cloned())
    }
}

#[async_trait]
impl CustomFieldRegistry for MemoryBackend {
    async fn fields_for(&self, group: FieldGroupId) -> Result<Vec<CustomFieldDef>, RepoError> {
        Ok(self.state.read_or_recover(SOURCE, "fields_for")
            .field_groups
            .get(&group)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl LinkService for MemoryBackend {
    async fn create_link(&self, link: NewLink) -> Result<LinkId, RepoError> {
        let mut state = self.state.write_or_recover(SOURCE, "create_link");
        if state.links.values().any(|existing| existing.url_path == link.url_path) {
            return Err(RepoError::Duplicate {
                constraint: "links_url_path_key".to_string(),
            });
        }
        let id = state.allocate_link_id();
        state.links.insert(
            id,
            LinkRecord {
                id,
                url_path: link.url_path,
                title: link.title,
                topics: link.topics,
                type_label: link.type_label,
                section: link.section,
            },
        );
        Ok(id)
    }

    async fn find_link(&self, id: LinkId) -> Result<Option<LinkRecord>, RepoError> {
        Ok(self.state.read_or_recover(SOURCE, "find_link").links.get(&id).cloned())
    }

    async fn find_by_path(&self, url_path: &str) -> Result<Option<LinkRecord>, RepoError> {
        Ok(self.state.read_or_recover(SOURCE, "find_by_path")
            .links
            .values()
            .find(|link| link.url_path == url_path)
            .cloned())
    }

    async fn update_path(&self, id: LinkId, url_path: &str) -> Result<(), RepoError> {
        let mut state = self.state.write_or_recover(SOURCE, "update_path");
        if state
            .links
            .values()
            .any(|link| link.id != id && link.url_path == url_path)
        {
            return Err(RepoError::Duplicate {
                constraint: "links_url_path_key".to_string(),
            });
        }
        let link = state.links.get_mut(&id).ok_or(RepoError::NotFound)?;
        link.url_path = url_path.to_string();
        Ok(())
    }

    async fn update_title(&self, id: LinkId, title: &str) -> Result<(), RepoError> {
        let mut state = self.state.write_or_recover(SOURCE, "update_title");
        let link = state.links.get_mut(&id).ok_or(RepoError::NotFound)?;
        link.title = title.to_string();
        Ok(())
    }

    async fn update_topics(&self, id: LinkId, topics: &[TopicId]) -> Result<(), RepoError> {
        let mut state = self.state.write_or_recover(SOURCE, "update_topics");
        let link = state.links.get_mut(&id).ok_or(RepoError::NotFound)?;
        link.topics = topics.to_vec();
        Ok(())
    }

    async fn delete_link(&self, id: LinkId) -> Result<(), RepoError> {
        self.state.write_or_recover(SOURCE, "delete_link").links.remove(&id);
        Ok(())
    }
}
