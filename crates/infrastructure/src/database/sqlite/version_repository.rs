use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, instrument};
use uuid::Uuid;

use pipeflow_domain::entities::PipelineVersion;
use pipeflow_domain::repositories::VersionRepository;
use pipeflow_domain::value_objects::VersionPatch;
use pipeflow_errors::{PipeflowError, PipeflowResult};

use crate::database::error_handling::map_sqlx_error;
use crate::database::records::version_patch_set;
use crate::database::store::{self, SqlValue};

pub struct SqliteVersionRepository {
    pool: SqlitePool,
}

impl SqliteVersionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VersionRepository for SqliteVersionRepository {
    #[instrument(skip(self, version), fields(
        version_id = %version.id,
        pipeline_id = %version.pipeline_id,
        activate = version.is_active,
    ))]
    async fn create(&self, version: &PipelineVersion) -> PipeflowResult<PipelineVersion> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("pipeline version", "create", e))?;

        if version.is_active {
            // deactivate-then-activate inside one transaction; the partial
            // unique index catches any racing activation at commit
            sqlx::query(
                "UPDATE pipeline_versions SET is_active = 0, updated_at = $2 \
                 WHERE pipeline_id = $1 AND is_active = 1",
            )
            .bind(version.pipeline_id.to_string())
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("pipeline version", "create", e))?;
        }

        let created: PipelineVersion = store::sqlite::insert(&mut *tx, version).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("pipeline version", "create", e))?;

        debug!(
            "created version '{}' for pipeline {}",
            created.version, created.pipeline_id
        );
        Ok(created)
    }

    async fn get_by_id(&self, id: Uuid) -> PipeflowResult<Option<PipelineVersion>> {
        store::sqlite::fetch_by_id(&self.pool, SqlValue::Uuid(id)).await
    }

    async fn get_active(&self, pipeline_id: Uuid) -> PipeflowResult<Option<PipelineVersion>> {
        store::sqlite::fetch_optional_where(
            &self.pool,
            "pipeline_id = $1 AND is_active = 1",
            vec![SqlValue::Uuid(pipeline_id)],
        )
        .await
    }

    async fn list_by_pipeline(&self, pipeline_id: Uuid) -> PipeflowResult<Vec<PipelineVersion>> {
        store::sqlite::list(
            &self.pool,
            vec![("pipeline_id", SqlValue::Uuid(pipeline_id))],
            None,
            None,
        )
        .await
    }

    #[instrument(skip(self, patch), fields(version_id = %id, activate = patch.activates()))]
    async fn update(&self, id: Uuid, patch: &VersionPatch) -> PipeflowResult<PipelineVersion> {
        if patch.is_empty() {
            return self
                .get_by_id(id)
                .await?
                .ok_or_else(|| PipeflowError::version_not_found(id));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("pipeline version", "update", e))?;

        let id_text = id.to_string();
        if patch.activates() {
            // demote the currently active sibling before this one goes active
            sqlx::query(
                "UPDATE pipeline_versions SET is_active = 0, updated_at = $2 \
                 WHERE pipeline_id = \
                   (SELECT pipeline_id FROM pipeline_versions WHERE id = $1) \
                 AND is_active = 1 AND id != $1",
            )
            .bind(&id_text)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("pipeline version", "update", e))?;
        }

        let affected = store::sqlite::update_by_id::<_, PipelineVersion>(
            &mut *tx,
            SqlValue::Uuid(id),
            version_patch_set(patch),
        )
        .await?;
        if affected == 0 {
            return Err(PipeflowError::version_not_found(id));
        }

        let updated: Option<PipelineVersion> =
            store::sqlite::fetch_by_id(&mut *tx, SqlValue::Uuid(id)).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("pipeline version", "update", e))?;

        updated.ok_or_else(|| PipeflowError::version_not_found(id))
    }

    #[instrument(skip(self), fields(version_id = %id))]
    async fn delete(&self, id: Uuid) -> PipeflowResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("pipeline version", "delete", e))?;

        let id_text = id.to_string();
        // runs of this version go with it, children first
        let cascade = [
            "DELETE FROM run_param_values WHERE pipeline_run_id IN \
             (SELECT id FROM pipeline_runs WHERE pipeline_version_id = $1)",
            "DELETE FROM tag_links WHERE entity_type = 'pipeline_run_artifact' AND entity_id IN \
             (SELECT CAST(ra.id AS TEXT) FROM run_artifacts ra \
              JOIN pipeline_runs pr ON pr.id = ra.pipeline_run_id \
              WHERE pr.pipeline_version_id = $1)",
            "DELETE FROM run_artifacts WHERE pipeline_run_id IN \
             (SELECT id FROM pipeline_runs WHERE pipeline_version_id = $1)",
            "DELETE FROM tag_links WHERE entity_type = 'pipeline_run' AND entity_id IN \
             (SELECT id FROM pipeline_runs WHERE pipeline_version_id = $1)",
            "DELETE FROM pipeline_runs WHERE pipeline_version_id = $1",
            "DELETE FROM tag_links WHERE entity_type = 'pipeline_version' AND entity_id = $1",
        ];
        for sql in cascade {
            sqlx::query(sql)
                .bind(&id_text)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("pipeline version", "delete", e))?;
        }

        let result = sqlx::query("DELETE FROM pipeline_versions WHERE id = $1")
            .bind(&id_text)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("pipeline version", "delete", e))?;
        if result.rows_affected() == 0 {
            return Err(PipeflowError::version_not_found(id));
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("pipeline version", "delete", e))?;
        Ok(())
    }
}
