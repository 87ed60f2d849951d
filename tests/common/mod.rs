#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use folio::application::content::{ContentService, ContentSettings, CreateContent};
use folio::application::hooks::{ContentEvent, HookDispatcher};
use folio::cache::TtlStore;
use folio::domain::entities::{ContentTypeRecord, CustomFieldDef, UserRecord};
use folio::domain::types::{ContentId, ContentTypeId};
use folio::infra::memory::MemoryBackend;
use serde_json::Value;

pub const ARTICLES: ContentTypeId = 1;
pub const WIDE: ContentTypeId = 2;
pub const WIDE_FIELDS: usize = 17;

pub struct Fixture {
    pub backend: Arc<MemoryBackend>,
    pub service: ContentService,
    pub events: Arc<Mutex<Vec<ContentEvent>>>,
}

fn field(name: &str, field_type: &str) -> CustomFieldDef {
    CustomFieldDef {
        name: name.to_string(),
        field_type: field_type.to_string(),
    }
}

fn user(id: i64, username: &str) -> UserRecord {
    UserRecord {
        id,
        username: username.to_string(),
        first_name: username.to_string(),
        last_name: "Tester".to_string(),
        email: format!("{username}@example.org"),
    }
}

pub fn wide_field(index: usize) -> String {
    format!("f{index:02}")
}

pub fn fixture() -> Fixture {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_user(user(1, "ada"));
    backend.add_user(user(2, "grace"));
    for topic in 1..=3 {
        backend.add_topic(topic);
    }

    backend.register_type(
        ContentTypeRecord {
            id: ARTICLES,
            system_name: "articles".to_string(),
            display_name: "Article".to_string(),
            custom_field_group_id: 10,
            template: "article".to_string(),
        },
        vec![
            field("body", "textarea"),
            field("subtitle", "text"),
            field("rating", "number"),
        ],
    );
    backend.register_type(
        ContentTypeRecord {
            id: WIDE,
            system_name: "wide".to_string(),
            display_name: "Wide".to_string(),
            custom_field_group_id: 20,
            template: "wide".to_string(),
        },
        (0..WIDE_FIELDS)
            .map(|index| field(&wide_field(index), "textarea"))
            .collect(),
    );

    let settings = ContentSettings::default();
    let cache = Arc::new(TtlStore::new(&settings.cache));

    let events = Arc::new(Mutex::new(Vec::new()));
    let hooks = HookDispatcher::new();
    for name in ["new_content", "update_content", "delete_content"] {
        let sink = events.clone();
        hooks.on(name, move |event| {
            sink.lock().expect("event sink").push(*event);
        });
    }

    let service = ContentService::new(
        backend.clone(),
        backend.clone(),
        backend.clone(),
        backend.clone(),
        cache,
        Arc::new(hooks),
        settings,
    );

    Fixture {
        backend,
        service,
        events,
    }
}

pub fn article(title: &str) -> CreateContent {
    CreateContent {
        title: Some(title.to_string()),
        ..CreateContent::new(ARTICLES, 1)
    }
}

pub fn with_field(mut command: CreateContent, name: &str, value: impl Into<Value>) -> CreateContent {
    command.custom_fields.insert(name.to_string(), value.into());
    command
}

impl Fixture {
    pub async fn create(&self, command: CreateContent) -> ContentId {
        self.service.create(command).await.expect("create content")
    }

    pub fn recorded_events(&self) -> Vec<ContentEvent> {
        self.events.lock().expect("events").clone()
    }
}
