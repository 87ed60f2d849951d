use crate::application::query::ContentQueryPlan;
use crate::application::repos::{ContentLocator, ContentRow, RepoError};
use crate::domain::types::{ContentId, ContentTypeId, LinkId};
use crate::infra::db::PostgresRepositories;
use crate::infra::db::util::{map_sqlx_error, to_count};

use super::render::{render_count, render_select};
use super::types::ContentRowDb;

impl PostgresRepositories {
    pub(super) async fn count_content_of_type(
        &self,
        type_id: ContentTypeId,
    ) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM content WHERE type_id = $1")
            .bind(type_id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        to_count(count)
    }

    pub(super) async fn content_type_of(
        &self,
        id: ContentId,
    ) -> Result<Option<ContentTypeId>, RepoError> {
        sqlx::query_scalar("SELECT type_id FROM content WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    pub(super) async fn locate_content(
        &self,
        id: ContentId,
    ) -> Result<Option<ContentLocator>, RepoError> {
        let row: Option<(ContentTypeId, Option<LinkId>)> =
            sqlx::query_as("SELECT type_id, link_id FROM content WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool())
                .await
                .map_err(map_sqlx_error)?;
        Ok(row.map(|(type_id, link_id)| ContentLocator { type_id, link_id }))
    }

    pub(super) async fn count_plan(&self, plan: &ContentQueryPlan) -> Result<u64, RepoError> {
        let mut qb = render_count(plan);
        let count: i64 = qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        to_count(count)
    }

    pub(super) async fn fetch_plan(
        &self,
        plan: &ContentQueryPlan,
    ) -> Result<Vec<ContentRow>, RepoError> {
        let mut qb = render_select(plan);
        let rows = qb
            .build_query_as::<ContentRowDb>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(ContentRow::from).collect())
    }

    pub(super) async fn content_id_for_link(
        &self,
        link_id: LinkId,
    ) -> Result<Option<ContentId>, RepoError> {
        sqlx::query_scalar("SELECT id FROM content WHERE link_id = $1 ORDER BY id LIMIT 1")
            .bind(link_id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    pub(super) async fn bump_hits(&self, id: ContentId) -> Result<Option<u64>, RepoError> {
        let hits: Option<i64> =
            sqlx::query_scalar("UPDATE content SET hits = hits + 1 WHERE id = $1 RETURNING hits")
                .bind(id)
                .fetch_optional(self.pool())
                .await
                .map_err(map_sqlx_error)?;
        hits.map(to_count).transpose()
    }
}
