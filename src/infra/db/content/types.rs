use serde_json::{Map, Value};
use sqlx::types::Json;
use time::OffsetDateTime;

use crate::application::repos::ContentRow;

#[derive(sqlx::FromRow)]
pub(crate) struct ContentRowDb {
    pub(crate) id: i64,
    pub(crate) link_id: Option<i64>,
    pub(crate) type_id: i64,
    pub(crate) is_standard: bool,
    pub(crate) title: String,
    pub(crate) author_id: i64,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) modified_at: OffsetDateTime,
    pub(crate) hits: i64,
    pub(crate) privileges: Vec<i64>,
    pub(crate) relevance: Option<f64>,
    pub(crate) author_username: Option<String>,
    pub(crate) author_first_name: Option<String>,
    pub(crate) author_last_name: Option<String>,
    pub(crate) author_email: Option<String>,
    pub(crate) type_name: Option<String>,
    pub(crate) template: Option<String>,
    pub(crate) url_path: Option<String>,
    pub(crate) topics: Vec<i64>,
    pub(crate) extension: Option<Json<Map<String, Value>>>,
}

impl From<ContentRowDb> for ContentRow {
    fn from(row: ContentRowDb) -> Self {
        let mut extension = row.extension.map(|json| json.0).unwrap_or_default();
        extension.remove("content_id");

        Self {
            id: row.id,
            link_id: row.link_id,
            type_id: row.type_id,
            is_standard: row.is_standard,
            title: row.title,
            author_id: row.author_id,
            created_at: row.created_at,
            modified_at: row.modified_at,
            hits: row.hits,
            privileges: row.privileges,
            topics: row.topics,
            author_username: row.author_username,
            author_first_name: row.author_first_name,
            author_last_name: row.author_last_name,
            author_email: row.author_email,
            type_name: row.type_name,
            template: row.template,
            url_path: row.url_path,
            relevance: row.relevance,
            extension,
        }
    }
}
