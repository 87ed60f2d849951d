use std::collections::BTreeMap;

use metrics::counter;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::application::hooks::ContentEvent;
use crate::application::query::ResolvedType;
use crate::application::repos::{InsertContentParams, NewLink, PathError, UpdateContentParams};
use crate::domain::identifiers::validate_identifier;
use crate::domain::publish::{normalize_privileges, normalize_publish_at, normalize_topics};
use crate::domain::slug::derive_slug;
use crate::domain::types::{ContentId, ContentTypeId, LinkId};

use super::service::ContentService;
use super::types::{ContentError, CreateContent, LINK_SECTION, UpdateContent};

impl ContentService {
    #[instrument(skip(self, command), fields(type_id = command.type_id))]
    pub async fn create(&self, command: CreateContent) -> Result<ContentId, ContentError> {
        let resolved = self.require_type(command.type_id).await?;
        ensure_known_fields(&resolved, &command.custom_fields)?;
        let table = validate_identifier(&resolved.record.system_name)?.to_string();

        let topics = normalize_topics(&command.topics);
        let privileges = normalize_privileges(&command.privileges);
        let title = non_blank(command.title);

        let link_id = match &title {
            Some(title) => {
                let source = match non_blank(command.url_path) {
                    Some(path) => self.links.prepare_path(&path)?,
                    None => derive_slug(title)?,
                };
                let url_path = self.unique_path(&source, None).await?;
                let link = NewLink {
                    url_path,
                    topics: topics.iter().copied().collect(),
                    title: title.clone(),
                    type_label: resolved.record.display_name.clone(),
                    section: LINK_SECTION.to_string(),
                };
                Some(self.links.create_link(link).await?)
            }
            None => None,
        };

        let now = self.now();
        let params = InsertContentParams {
            type_id: command.type_id,
            extension_table: table,
            link_id,
            is_standard: title.is_some(),
            title: title.unwrap_or_default(),
            author_id: command.author_id,
            privileges,
            topics,
            created_at: normalize_publish_at(
                command.publish_at,
                now,
                self.settings.recent_publish_window,
            ),
            modified_at: now,
            fields: command.custom_fields,
        };

        let id = match self.store.insert_content(params).await {
            Ok(id) => id,
            Err(err) => {
                if let Some(link_id) = link_id {
                    if let Err(cleanup) = self.links.delete_link(link_id).await {
                        warn!(link_id, error = %cleanup, "failed to remove orphaned link");
                    }
                }
                return Err(err.into());
            }
        };

        self.cache.clear();
        counter!("folio_content_writes_total", "op" => "create").increment(1);
        self.events.emit(ContentEvent::NewContent(id));
        info!(content_id = id, "content created");
        Ok(id)
    }

    #[instrument(skip(self, command), fields(content_id = command.id))]
    pub async fn update(&self, command: UpdateContent) -> Result<bool, ContentError> {
        let Some(current) = self.load_current(command.id).await? else {
            return Ok(false);
        };
        let resolved = self.require_type(current.type_id).await?;
        ensure_known_fields(&resolved, &command.custom_fields)?;
        let table = validate_identifier(&resolved.record.system_name)?.to_string();

        let topics = normalize_topics(&command.topics);
        let privileges = normalize_privileges(&command.privileges);
        let title = non_blank(command.title);

        let mut link_update = None;
        if let (Some(title), Some(link_id)) = (&title, current.link_id) {
            let requested = match non_blank(command.url_path) {
                Some(path) => self.links.prepare_path(&path)?,
                None => derive_slug(title)?,
            };
            let path = if current.url_path.as_deref() == Some(requested.as_str()) {
                None
            } else {
                Some(self.unique_path(&requested, Some(link_id)).await?)
            };
            link_update = Some((link_id, path, title.clone()));
        }

        if let Some((link_id, path, title)) = &link_update {
            if let Some(path) = path {
                self.links.update_path(*link_id, path).await?;
            }
            self.links.update_title(*link_id, title).await?;
            let topic_list: Vec<_> = topics.iter().copied().collect();
            self.links.update_topics(*link_id, &topic_list).await?;
        }

        let params = UpdateContentParams {
            id: command.id,
            extension_table: table,
            title,
            privileges,
            topics,
            created_at: command.publish_at,
            modified_at: self.now(),
            fields: command.custom_fields,
        };
        self.store.update_content(params).await?;

        self.cache.clear();
        counter!("folio_content_writes_total", "op" => "update").increment(1);
        self.events.emit(ContentEvent::UpdateContent(command.id));
        info!(content_id = command.id, "content updated");
        Ok(true)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: ContentId) -> Result<bool, ContentError> {
        if id <= 0 {
            return Ok(false);
        }
        let Some(located) = self.store.locate(id).await? else {
            return Ok(false);
        };

        let table = self
            .types
            .resolve(located.type_id)
            .await?
            .map(|record| record.system_name)
            .filter(|name| validate_identifier(name).is_ok());

        if let Some(link_id) = located.link_id {
            self.links.delete_link(link_id).await?;
        }
        let deleted = self.store.delete_content(id, table.as_deref()).await?;

        self.cache.clear();
        counter!("folio_content_writes_total", "op" => "delete").increment(1);
        self.events.emit(ContentEvent::DeleteContent(id));
        info!(content_id = id, deleted, "content deleted");
        Ok(deleted)
    }

    /// Increment the view counter without touching the cache.
    #[instrument(skip(self))]
    pub async fn record_hit(&self, id: ContentId) -> Result<Option<u64>, ContentError> {
        Ok(self.store.increment_hits(id).await?)
    }

    async fn require_type(&self, type_id: ContentTypeId) -> Result<ResolvedType, ContentError> {
        self.resolve_type(type_id)
            .await?
            .ok_or(ContentError::UnknownType(type_id))
    }

    async fn unique_path(
        &self,
        source: &str,
        owner: Option<LinkId>,
    ) -> Result<String, ContentError> {
        self.links
            .ensure_unique_path(source, owner)
            .await
            .map_err(|err| match err {
                PathError::Slug(err) => ContentError::Slug(err),
                PathError::Repo(err) => ContentError::Repo(err),
            })
    }
}

fn ensure_known_fields(
    resolved: &ResolvedType,
    fields: &BTreeMap<String, Value>,
) -> Result<(), ContentError> {
    match fields.keys().find(|name| !resolved.has_field(name)) {
        Some(field) => Err(ContentError::UnknownField {
            type_id: resolved.record.id,
            field: field.clone(),
        }),
        None => Ok(()),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
