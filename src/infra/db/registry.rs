use async_trait::async_trait;

use crate::application::repos::{ContentTypeRegistry, CustomFieldRegistry, RepoError};
use crate::domain::entities::{ContentTypeRecord, CustomFieldDef};
use crate::domain::types::{ContentTypeId, FieldGroupId};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct ContentTypeRow {
    id: i64,
    system_name: String,
    display_name: String,
    custom_field_group_id: i64,
    template: String,
}

impl From<ContentTypeRow> for ContentTypeRecord {
    fn from(row: ContentTypeRow) -> Self {
        Self {
            id: row.id,
            system_name: row.system_name,
            display_name: row.display_name,
            custom_field_group_id: row.custom_field_group_id,
            template: row.template,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CustomFieldRow {
    name: String,
    field_type: String,
}

#[async_trait]
impl ContentTypeRegistry for PostgresRepositories {
    async fn resolve(&self, id: ContentTypeId) -> Result<Option<ContentTypeRecord>, RepoError> {
        let row = sqlx::query_as::<_, ContentTypeRow>(
            "SELECT id, system_name, display_name, custom_field_group_id, template \
             FROM content_types WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(ContentTypeRecord::from))
    }
}

#[async_trait]
impl CustomFieldRegistry for PostgresRepositories {
    async fn fields_for(&self, group: FieldGroupId) -> Result<Vec<CustomFieldDef>, RepoError> {
        let rows = sqlx::query_as::<_, CustomFieldRow>(
            "SELECT name, field_type FROM custom_fields \
             WHERE group_id = $1 ORDER BY position, id",
        )
        .bind(group)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| CustomFieldDef {
                name: row.name,
                field_type: row.field_type,
            })
            .collect())
    }
}
