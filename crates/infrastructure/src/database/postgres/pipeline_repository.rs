use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use pipeflow_domain::entities::{Pipeline, User};
use pipeflow_domain::repositories::PipelineRepository;
use pipeflow_domain::value_objects::{PipelineFilter, PipelinePatch};
use pipeflow_errors::{PipeflowError, PipeflowResult};

use crate::database::error_handling::map_sqlx_error;
use crate::database::records::pipeline_patch_set;
use crate::database::store::{self, Record, SqlValue};

pub struct PostgresPipelineRepository {
    pool: PgPool,
}

impl PostgresPipelineRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Ordered cascade, children first. Every statement binds the pipeline id
/// as $1; users and tags themselves are never touched, only their links.
const CASCADE_STATEMENTS: &[&str] = &[
    "DELETE FROM run_param_values WHERE pipeline_run_id IN \
     (SELECT id FROM pipeline_runs WHERE pipeline_id = $1)",
    "DELETE FROM tag_links WHERE entity_type = 'pipeline_run_artifact' AND entity_id IN \
     (SELECT ra.id::text FROM run_artifacts ra \
      JOIN pipeline_runs pr ON pr.id = ra.pipeline_run_id WHERE pr.pipeline_id = $1)",
    "DELETE FROM run_artifacts WHERE pipeline_run_id IN \
     (SELECT id FROM pipeline_runs WHERE pipeline_id = $1)",
    "DELETE FROM tag_links WHERE entity_type = 'pipeline_run' AND entity_id IN \
     (SELECT id::text FROM pipeline_runs WHERE pipeline_id = $1)",
    "DELETE FROM pipeline_runs WHERE pipeline_id = $1",
    "DELETE FROM tag_links WHERE entity_type = 'pipeline_version' AND entity_id IN \
     (SELECT id::text FROM pipeline_versions WHERE pipeline_id = $1)",
    "DELETE FROM pipeline_versions WHERE pipeline_id = $1",
    "DELETE FROM tag_links WHERE entity_type = 'pipeline' AND entity_id = $1::text",
    "DELETE FROM pipeline_owners WHERE pipeline_id = $1",
];

#[async_trait]
impl PipelineRepository for PostgresPipelineRepository {
    #[instrument(skip(self, pipeline), fields(pipeline_id = %pipeline.id, code = %pipeline.code))]
    async fn create(&self, pipeline: &Pipeline, owner_id: Uuid) -> PipeflowResult<Pipeline> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("pipeline", "create", e))?;

        let created: Pipeline = store::postgres::insert(&mut *tx, pipeline).await?;

        sqlx::query(
            "INSERT INTO pipeline_owners (pipeline_id, user_id, created_at) VALUES ($1, $2, $3)",
        )
        .bind(pipeline.id)
        .bind(owner_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("pipeline owner", "create", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("pipeline", "create", e))?;

        debug!("created {}", created.entity_description());
        Ok(created)
    }

    async fn get_by_id(&self, id: Uuid) -> PipeflowResult<Option<Pipeline>> {
        store::postgres::fetch_by_id(&self.pool, SqlValue::Uuid(id)).await
    }

    async fn get_by_code(&self, code: &str) -> PipeflowResult<Option<Pipeline>> {
        store::postgres::fetch_optional_where(
            &self.pool,
            "code = $1",
            vec![SqlValue::Text(code.to_string())],
        )
        .await
    }

    async fn get_by_name(&self, name: &str) -> PipeflowResult<Option<Pipeline>> {
        store::postgres::fetch_optional_where(
            &self.pool,
            "name = $1",
            vec![SqlValue::Text(name.to_string())],
        )
        .await
    }

    #[instrument(skip(self, filter), fields(owner_id = ?filter.owner_id, is_active = ?filter.is_active))]
    async fn list(&self, filter: &PipelineFilter) -> PipeflowResult<Vec<Pipeline>> {
        let columns: Vec<String> = Pipeline::COLUMNS.iter().map(|c| format!("p.{c}")).collect();
        let mut sql = format!("SELECT {} FROM pipelines p", columns.join(", "));
        if filter.owner_id.is_some() {
            sql.push_str(" INNER JOIN pipeline_owners po ON po.pipeline_id = p.id");
        }
        sql.push_str(" WHERE 1=1");

        let mut bind_count = 0;
        if filter.owner_id.is_some() {
            bind_count += 1;
            sql.push_str(&format!(" AND po.user_id = ${bind_count}"));
        }
        if filter.is_active.is_some() {
            bind_count += 1;
            sql.push_str(&format!(" AND p.is_active = ${bind_count}"));
        }
        sql.push_str(" ORDER BY p.created_at DESC, p.id DESC");
        if filter.limit.is_some() {
            bind_count += 1;
            sql.push_str(&format!(" LIMIT ${bind_count}"));
        }
        if filter.offset.is_some() {
            bind_count += 1;
            sql.push_str(&format!(" OFFSET ${bind_count}"));
        }

        let mut query = sqlx::query(&sql);
        if let Some(owner_id) = filter.owner_id {
            query = query.bind(owner_id);
        }
        if let Some(is_active) = filter.is_active {
            query = query.bind(is_active);
        }
        if let Some(limit) = filter.limit {
            query = query.bind(limit);
        }
        if let Some(offset) = filter.offset {
            query = query.bind(offset);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("pipeline", "list", e))?;
        rows.iter().map(Pipeline::from_pg_row).collect()
    }

    #[instrument(skip(self, patch), fields(pipeline_id = %id))]
    async fn update(&self, id: Uuid, patch: &PipelinePatch) -> PipeflowResult<Pipeline> {
        if patch.is_empty() {
            return self
                .get_by_id(id)
                .await?
                .ok_or_else(|| PipeflowError::pipeline_not_found(id));
        }

        let affected = store::postgres::update_by_id::<_, Pipeline>(
            &self.pool,
            SqlValue::Uuid(id),
            pipeline_patch_set(patch),
        )
        .await?;
        if affected == 0 {
            return Err(PipeflowError::pipeline_not_found(id));
        }
        self.get_by_id(id)
            .await?
            .ok_or_else(|| PipeflowError::pipeline_not_found(id))
    }

    #[instrument(skip(self), fields(pipeline_id = %id))]
    async fn delete(&self, id: Uuid) -> PipeflowResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("pipeline", "delete", e))?;

        for sql in CASCADE_STATEMENTS {
            sqlx::query(sql)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("pipeline", "delete", e))?;
        }

        let result = sqlx::query("DELETE FROM pipelines WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("pipeline", "delete", e))?;
        if result.rows_affected() == 0 {
            return Err(PipeflowError::pipeline_not_found(id));
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("pipeline", "delete", e))?;
        debug!("deleted pipeline {id} and its aggregate");
        Ok(())
    }

    #[instrument(skip(self), fields(pipeline_id = %pipeline_id, user_id = %user_id))]
    async fn add_owner(&self, pipeline_id: Uuid, user_id: Uuid) -> PipeflowResult<()> {
        // idempotent: a second insert of the same pair is a no-op
        sqlx::query(
            "INSERT INTO pipeline_owners (pipeline_id, user_id, created_at) VALUES ($1, $2, $3) \
             ON CONFLICT (pipeline_id, user_id) DO NOTHING",
        )
        .bind(pipeline_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("pipeline owner", "create", e))?;
        Ok(())
    }

    async fn remove_owner(&self, pipeline_id: Uuid, user_id: Uuid) -> PipeflowResult<bool> {
        let result =
            sqlx::query("DELETE FROM pipeline_owners WHERE pipeline_id = $1 AND user_id = $2")
                .bind(pipeline_id)
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("pipeline owner", "delete", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_owners(&self, pipeline_id: Uuid) -> PipeflowResult<Vec<User>> {
        let columns: Vec<String> = User::COLUMNS.iter().map(|c| format!("u.{c}")).collect();
        let sql = format!(
            "SELECT {} FROM users u \
             INNER JOIN pipeline_owners po ON po.user_id = u.id \
             WHERE po.pipeline_id = $1 ORDER BY po.created_at, u.id",
            columns.join(", "),
        );
        let rows = sqlx::query(&sql)
            .bind(pipeline_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("pipeline owner", "list", e))?;
        rows.iter().map(User::from_pg_row).collect()
    }

    async fn is_owner(&self, pipeline_id: Uuid, user_id: Uuid) -> PipeflowResult<bool> {
        let row =
            sqlx::query("SELECT 1 FROM pipeline_owners WHERE pipeline_id = $1 AND user_id = $2")
                .bind(pipeline_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("pipeline owner", "read", e))?;
        Ok(row.is_some())
    }
}
