use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use pipeflow_domain::entities::{PipelineRun, RunArtifact, RunParamValue, RunStatus};
use pipeflow_domain::repositories::RunRepository;
use pipeflow_domain::value_objects::RunFilter;
use pipeflow_errors::PipeflowResult;

use crate::database::error_handling::map_sqlx_error;
use crate::database::store::{self, SqlValue};

pub struct PostgresRunRepository {
    pool: PgPool,
}

impl PostgresRunRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunRepository for PostgresRunRepository {
    #[instrument(skip(self, run), fields(
        run_id = %run.id,
        pipeline_id = %run.pipeline_id,
        version_id = %run.pipeline_version_id,
    ))]
    async fn create(&self, run: &PipelineRun) -> PipeflowResult<PipelineRun> {
        let created: PipelineRun = store::postgres::insert(&self.pool, run).await?;
        debug!("created {}", created.entity_description());
        Ok(created)
    }

    async fn get_by_id(&self, id: Uuid) -> PipeflowResult<Option<PipelineRun>> {
        store::postgres::fetch_by_id(&self.pool, SqlValue::Uuid(id)).await
    }

    async fn list(&self, filter: &RunFilter) -> PipeflowResult<Vec<PipelineRun>> {
        let mut filters: Vec<(&'static str, SqlValue)> = Vec::new();
        if let Some(pipeline_id) = filter.pipeline_id {
            filters.push(("pipeline_id", SqlValue::Uuid(pipeline_id)));
        }
        if let Some(version_id) = filter.pipeline_version_id {
            filters.push(("pipeline_version_id", SqlValue::Uuid(version_id)));
        }
        if let Some(user_id) = filter.user_id {
            filters.push(("user_id", SqlValue::Uuid(user_id)));
        }
        if let Some(status) = filter.status {
            filters.push(("status", SqlValue::Text(status.as_str().to_string())));
        }
        store::postgres::list(&self.pool, filters, filter.limit, filter.offset).await
    }

    #[instrument(skip(self), fields(run_id = %id, from = %from, to = %to))]
    async fn update_status(
        &self,
        id: Uuid,
        from: RunStatus,
        to: RunStatus,
        started_at: Option<DateTime<Utc>>,
        finished_at: Option<DateTime<Utc>>,
    ) -> PipeflowResult<bool> {
        // compare-and-swap on the current status: a racing transition makes
        // the guard miss and the row stays untouched
        let result = sqlx::query(
            "UPDATE pipeline_runs SET status = $3, \
             started_at = COALESCE($4, started_at), \
             finished_at = COALESCE($5, finished_at), \
             updated_at = $6 \
             WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(started_at)
        .bind(finished_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("pipeline run", "update", e))?;

        let swapped = result.rows_affected() > 0;
        if !swapped {
            debug!("status guard missed for run {id}: expected {from}");
        }
        Ok(swapped)
    }

    #[instrument(skip(self, artifact), fields(run_id = %artifact.pipeline_run_id, name = %artifact.name))]
    async fn add_artifact(&self, artifact: &RunArtifact) -> PipeflowResult<RunArtifact> {
        store::postgres::insert(&self.pool, artifact).await
    }

    #[instrument(skip(self, param), fields(run_id = %param.pipeline_run_id, name = %param.name))]
    async fn add_param_value(&self, param: &RunParamValue) -> PipeflowResult<RunParamValue> {
        store::postgres::insert(&self.pool, param).await
    }

    async fn list_artifacts(&self, run_id: Uuid) -> PipeflowResult<Vec<RunArtifact>> {
        store::postgres::list(
            &self.pool,
            vec![("pipeline_run_id", SqlValue::Uuid(run_id))],
            None,
            None,
        )
        .await
    }

    async fn list_param_values(&self, run_id: Uuid) -> PipeflowResult<Vec<RunParamValue>> {
        store::postgres::list(
            &self.pool,
            vec![("pipeline_run_id", SqlValue::Uuid(run_id))],
            None,
            None,
        )
        .await
    }
}
