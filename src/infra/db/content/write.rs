use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder, Transaction};

use crate::application::repos::{InsertContentParams, RepoError, UpdateContentParams};
use crate::domain::identifiers::{quote_identifier, validate_identifier};
use crate::domain::types::{ContentId, TopicId};
use crate::infra::db::{PostgresRepositories, map_sqlx_error};

fn checked_table(table: &str) -> Result<String, RepoError> {
    validate_identifier(table)
        .map(quote_identifier)
        .map_err(|err| RepoError::invalid_input(err.to_string()))
}

fn checked_columns(fields: &BTreeMap<String, Value>) -> Result<Vec<String>, RepoError> {
    fields
        .keys()
        .map(|name| {
            validate_identifier(name)
                .map(quote_identifier)
                .map_err(|err| RepoError::invalid_input(err.to_string()))
        })
        .collect()
}

fn to_array<T: Copy>(set: &BTreeSet<T>) -> Vec<T> {
    set.iter().copied().collect()
}

/// `INSERT` for an extension row; the database coerces JSON values to column types.
pub(super) fn extension_insert_sql(table: &str) -> String {
    format!("INSERT INTO {table} SELECT * FROM jsonb_populate_record(NULL::{table}, $1)")
}

/// `UPDATE` that rewrites only `columns` of an extension row.
pub(super) fn extension_update_sql(table: &str, columns: &[String]) -> String {
    let assignments = columns
        .iter()
        .map(|column| format!("{column} = r.{column}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE {table} SET {assignments} FROM jsonb_populate_record(NULL::{table}, $2) r \
         WHERE {table}.content_id = $1"
    )
}

impl PostgresRepositories {
    async fn replace_topics(
        tx: &mut Transaction<'_, Postgres>,
        id: ContentId,
        topics: &BTreeSet<TopicId>,
    ) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM topic_maps WHERE content_id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        if topics.is_empty() {
            return Ok(());
        }
        sqlx::query(
            "INSERT INTO topic_maps (content_id, topic_id) SELECT $1, UNNEST($2::BIGINT[])",
        )
        .bind(id)
        .bind(to_array(topics))
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn table_exists(
        tx: &mut Transaction<'_, Postgres>,
        quoted_table: &str,
    ) -> Result<bool, RepoError> {
        sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
            .bind(quoted_table)
            .fetch_one(&mut **tx)
            .await
            .map_err(map_sqlx_error)
    }

    pub(super) async fn insert_content_tx(
        &self,
        params: InsertContentParams,
    ) -> Result<ContentId, RepoError> {
        let table = checked_table(&params.extension_table)?;
        checked_columns(&params.fields)?;

        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let id: ContentId = sqlx::query_scalar(
            "INSERT INTO content (link_id, type_id, is_standard, title, author_id, \
             created_at, modified_at, privileges) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id",
        )
        .bind(params.link_id)
        .bind(params.type_id)
        .bind(params.is_standard)
        .bind(&params.title)
        .bind(params.author_id)
        .bind(params.created_at)
        .bind(params.modified_at)
        .bind(to_array(&params.privileges))
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        Self::replace_topics(&mut tx, id, &params.topics).await?;

        let mut row: Map<String, Value> = params.fields.into_iter().collect();
        row.insert("content_id".to_string(), Value::from(id));
        sqlx::query(&extension_insert_sql(&table))
            .bind(Json(row))
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(id)
    }

    pub(super) async fn update_content_tx(
        &self,
        params: UpdateContentParams,
    ) -> Result<(), RepoError> {
        let table = checked_table(&params.extension_table)?;
        let columns = checked_columns(&params.fields)?;

        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE content SET modified_at = ");
        qb.push_bind(params.modified_at);
        qb.push(", privileges = ");
        qb.push_bind(to_array(&params.privileges));
        if let Some(title) = params.title.as_ref() {
            qb.push(", title = ");
            qb.push_bind(title.clone());
        }
        if let Some(created_at) = params.created_at {
            qb.push(", created_at = ");
            qb.push_bind(created_at);
        }
        qb.push(" WHERE id = ");
        qb.push_bind(params.id);
        let updated = qb
            .build()
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        if updated.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        Self::replace_topics(&mut tx, params.id, &params.topics).await?;

        if !columns.is_empty() {
            sqlx::query(&format!(
                "INSERT INTO {table} (content_id) SELECT $1 \
                 WHERE NOT EXISTS (SELECT 1 FROM {table} WHERE content_id = $1)"
            ))
            .bind(params.id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

            let values: Map<String, Value> = params.fields.into_iter().collect();
            sqlx::query(&extension_update_sql(&table, &columns))
                .bind(params.id)
                .bind(Json(values))
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    pub(super) async fn delete_content_tx(
        &self,
        id: ContentId,
        extension_table: Option<&str>,
    ) -> Result<bool, RepoError> {
        let table = extension_table.map(checked_table).transpose()?;

        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM topic_maps WHERE content_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        if let Some(table) = table {
            if Self::table_exists(&mut tx, &table).await? {
                sqlx::query(&format!("DELETE FROM {table} WHERE content_id = $1"))
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?;
            }
        }

        let deleted = sqlx::query("DELETE FROM content WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(deleted.rows_affected() > 0)
    }
}
