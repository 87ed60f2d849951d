use async_trait::async_trait;

use crate::application::repos::{LinkService, NewLink, RepoError};
use crate::domain::entities::LinkRecord;
use crate::domain::types::{LinkId, TopicId};

use super::{PostgresRepositories, map_sqlx_error};

const LINK_COLUMNS: &str = "id, url_path, title, topics, type_label, section";

#[derive(sqlx::FromRow)]
struct LinkRow {
    id: i64,
    url_path: String,
    title: String,
    topics: Vec<i64>,
    type_label: String,
    section: String,
}

impl From<LinkRow> for LinkRecord {
    fn from(row: LinkRow) -> Self {
        Self {
            id: row.id,
            url_path: row.url_path,
            title: row.title,
            topics: row.topics,
            type_label: row.type_label,
            section: row.section,
        }
    }
}

impl PostgresRepositories {
    async fn touch_link(
        &self,
        id: LinkId,
        sql: &str,
        value: LinkValue<'_>,
    ) -> Result<(), RepoError> {
        let query = sqlx::query(sql).bind(id);
        let query = match value {
            LinkValue::Text(text) => query.bind(text),
            LinkValue::Topics(topics) => query.bind(topics.to_vec()),
        };
        let result = query.execute(self.pool()).await.map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

enum LinkValue<'a> {
    Text(&'a str),
    Topics(&'a [TopicId]),
}

#[async_trait]
impl LinkService for PostgresRepositories {
    async fn create_link(&self, link: NewLink) -> Result<LinkId, RepoError> {
        sqlx::query_scalar(
            "INSERT INTO links (url_path, title, topics, type_label, section) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(link.url_path)
        .bind(link.title)
        .bind(link.topics)
        .bind(link.type_label)
        .bind(link.section)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn find_link(&self, id: LinkId) -> Result<Option<LinkRecord>, RepoError> {
        let row = sqlx::query_as::<_, LinkRow>(&format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.map(LinkRecord::from))
    }

    async fn find_by_path(&self, url_path: &str) -> Result<Option<LinkRecord>, RepoError> {
        let row = sqlx::query_as::<_, LinkRow>(&format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE url_path = $1"
        ))
        .bind(url_path)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.map(LinkRecord::from))
    }

    async fn update_path(&self, id: LinkId, url_path: &str) -> Result<(), RepoError> {
        self.touch_link(
            id,
            "UPDATE links SET url_path = $2 WHERE id = $1",
            LinkValue::Text(url_path),
        )
        .await
    }

    async fn update_title(&self, id: LinkId, title: &str) -> Result<(), RepoError> {
        self.touch_link(
            id,
            "UPDATE links SET title = $2 WHERE id = $1",
            LinkValue::Text(title),
        )
        .await
    }

    async fn update_topics(&self, id: LinkId, topics: &[TopicId]) -> Result<(), RepoError> {
        self.touch_link(
            id,
            "UPDATE links SET topics = $2 WHERE id = $1",
            LinkValue::Topics(topics),
        )
        .await
    }

    async fn delete_link(&self, id: LinkId) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM links WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}
