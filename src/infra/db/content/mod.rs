mod read;
mod render;
mod types;
mod write;

use async_trait::async_trait;

use crate::application::query::ContentQueryPlan;
use crate::application::repos::{
    ContentLocator, ContentRow, ContentStore, InsertContentParams, RepoError,
    UpdateContentParams,
};
use crate::domain::types::{ContentId, ContentTypeId, LinkId};

use super::PostgresRepositories;

#[async_trait]
impl ContentStore for PostgresRepositories {
    async fn count_of_type(&self, type_id: ContentTypeId) -> Result<u64, RepoError> {
        self.count_content_of_type(type_id).await
    }

    async fn type_of(&self, id: ContentId) -> Result<Option<ContentTypeId>, RepoError> {
        self.content_type_of(id).await
    }

    async fn locate(&self, id: ContentId) -> Result<Option<ContentLocator>, RepoError> {
        self.locate_content(id).await
    }

    async fn count_rows(&self, plan: &ContentQueryPlan) -> Result<u64, RepoError> {
        self.count_plan(plan).await
    }

    async fn fetch_rows(&self, plan: &ContentQueryPlan) -> Result<Vec<ContentRow>, RepoError> {
        self.fetch_plan(plan).await
    }

    async fn find_id_by_link(&self, link_id: LinkId) -> Result<Option<ContentId>, RepoError> {
        self.content_id_for_link(link_id).await
    }

    async fn increment_hits(&self, id: ContentId) -> Result<Option<u64>, RepoError> {
        self.bump_hits(id).await
    }

    async fn insert_content(&self, params: InsertContentParams) -> Result<ContentId, RepoError> {
        self.insert_content_tx(params).await
    }

    async fn update_content(&self, params: UpdateContentParams) -> Result<(), RepoError> {
        self.update_content_tx(params).await
    }

    async fn delete_content(
        &self,
        id: ContentId,
        extension_table: Option<&str>,
    ) -> Result<bool, RepoError> {
        self.delete_content_tx(id, extension_table).await
    }
}
