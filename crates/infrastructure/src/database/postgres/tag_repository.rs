use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use pipeflow_domain::entities::{EntityRef, Tag, TagLink};
use pipeflow_domain::repositories::TagRepository;
use pipeflow_domain::value_objects::TagPatch;
use pipeflow_errors::{PipeflowError, PipeflowResult};

use crate::database::error_handling::map_sqlx_error;
use crate::database::records::tag_patch_set;
use crate::database::store::{self, Record, SqlValue};

pub struct PostgresTagRepository {
    pool: PgPool,
}

impl PostgresTagRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TagRepository for PostgresTagRepository {
    #[instrument(skip(self, tag), fields(name = %tag.name, tag_type = %tag.tag_type))]
    async fn create(&self, tag: &Tag) -> PipeflowResult<Tag> {
        store::postgres::insert(&self.pool, tag).await
    }

    async fn get_by_id(&self, id: i64) -> PipeflowResult<Option<Tag>> {
        store::postgres::fetch_by_id(&self.pool, SqlValue::BigInt(id)).await
    }

    async fn get_by_name(&self, name: &str) -> PipeflowResult<Option<Tag>> {
        store::postgres::fetch_optional_where(
            &self.pool,
            "name = $1",
            vec![SqlValue::Text(name.to_string())],
        )
        .await
    }

    async fn list(&self, limit: Option<i64>, offset: Option<i64>) -> PipeflowResult<Vec<Tag>> {
        store::postgres::list(&self.pool, Vec::new(), limit, offset).await
    }

    #[instrument(skip(self, patch), fields(tag_id = %id))]
    async fn update(&self, id: i64, patch: &TagPatch) -> PipeflowResult<Tag> {
        if patch.is_empty() {
            return self
                .get_by_id(id)
                .await?
                .ok_or_else(|| PipeflowError::tag_not_found(id));
        }

        let affected = store::postgres::update_by_id::<_, Tag>(
            &self.pool,
            SqlValue::BigInt(id),
            tag_patch_set(patch),
        )
        .await?;
        if affected == 0 {
            return Err(PipeflowError::tag_not_found(id));
        }
        self.get_by_id(id)
            .await?
            .ok_or_else(|| PipeflowError::tag_not_found(id))
    }

    #[instrument(skip(self), fields(tag_id = %id))]
    async fn delete(&self, id: i64) -> PipeflowResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("tag", "delete", e))?;

        sqlx::query("DELETE FROM tag_links WHERE tag_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("tag", "delete", e))?;

        let result = sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("tag", "delete", e))?;
        if result.rows_affected() == 0 {
            return Err(PipeflowError::tag_not_found(id));
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("tag", "delete", e))?;
        Ok(())
    }

    #[instrument(skip(self, target), fields(tag_id = %tag_id, target = %target))]
    async fn link(&self, tag_id: i64, target: &EntityRef) -> PipeflowResult<TagLink> {
        let link = TagLink::new(tag_id, target);
        store::postgres::insert(&self.pool, &link).await
    }

    async fn unlink(&self, tag_id: i64, target: &EntityRef) -> PipeflowResult<bool> {
        let result = sqlx::query(
            "DELETE FROM tag_links WHERE tag_id = $1 AND entity_type = $2 AND entity_id = $3",
        )
        .bind(tag_id)
        .bind(target.entity_type())
        .bind(target.entity_id())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("tag link", "delete", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_tags_for(&self, target: &EntityRef) -> PipeflowResult<Vec<Tag>> {
        let columns: Vec<String> = Tag::COLUMNS.iter().map(|c| format!("t.{c}")).collect();
        let sql = format!(
            "SELECT {} FROM tags t \
             INNER JOIN tag_links tl ON tl.tag_id = t.id \
             WHERE tl.entity_type = $1 AND tl.entity_id = $2 ORDER BY t.name",
            columns.join(", "),
        );
        let rows = sqlx::query(&sql)
            .bind(target.entity_type())
            .bind(target.entity_id())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("tag link", "list", e))?;
        rows.iter().map(Tag::from_pg_row).collect()
    }

    async fn list_links_for_tag(&self, tag_id: i64) -> PipeflowResult<Vec<TagLink>> {
        store::postgres::list(
            &self.pool,
            vec![("tag_id", SqlValue::BigInt(tag_id))],
            None,
            None,
        )
        .await
    }
}
