use std::sync::Arc;

use time::OffsetDateTime;

use crate::application::hooks::EventNotifier;
use crate::application::query::{ContentQueryBuilder, ResolvedType};
use crate::application::repos::{
    ContentStore, ContentTypeRegistry, CustomFieldRegistry, LinkService, RepoError,
};
use crate::cache::ContentCache;
use crate::domain::types::ContentTypeId;

use super::types::ContentSettings;

#[derive(Clone)]
pub struct ContentService {
    pub(crate) store: Arc<dyn ContentStore>,
    pub(crate) types: Arc<dyn ContentTypeRegistry>,
    pub(crate) fields: Arc<dyn CustomFieldRegistry>,
    pub(crate) links: Arc<dyn LinkService>,
    pub(crate) cache: Arc<dyn ContentCache>,
    pub(crate) events: Arc<dyn EventNotifier>,
    pub(crate) settings: ContentSettings,
}

impl ContentService {
    pub fn new(
        store: Arc<dyn ContentStore>,
        types: Arc<dyn ContentTypeRegistry>,
        fields: Arc<dyn CustomFieldRegistry>,
        links: Arc<dyn LinkService>,
        cache: Arc<dyn ContentCache>,
        events: Arc<dyn EventNotifier>,
        settings: ContentSettings,
    ) -> Self {
        Self {
            store,
            types,
            fields,
            links,
            cache,
            events,
            settings,
        }
    }

    pub fn settings(&self) -> &ContentSettings {
        &self.settings
    }

    pub(crate) fn query_builder(&self) -> ContentQueryBuilder<'_> {
        ContentQueryBuilder::new(
            self.store.as_ref(),
            self.types.as_ref(),
            self.fields.as_ref(),
            self.settings.tuning,
        )
    }

    pub(crate) async fn resolve_type(
        &self,
        type_id: ContentTypeId,
    ) -> Result<Option<ResolvedType>, RepoError> {
        self.query_builder().resolve_type(type_id).await
    }

    pub(crate) fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
