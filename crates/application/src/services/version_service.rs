use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use pipeflow_domain::entities::PipelineVersion;
use pipeflow_domain::repositories::{PipelineRepository, VersionRepository};
use pipeflow_domain::value_objects::{NewVersion, VersionPatch};
use pipeflow_errors::{PipeflowError, PipeflowResult};

use super::access::OwnershipGuard;

/// Version lifecycle. At most one version per pipeline is active at any
/// committed instant; activation swaps happen inside one repository
/// transaction and the storage-level partial unique index settles races —
/// a loser surfaces Conflict and simply retries against fresh state.
#[derive(Clone)]
pub struct VersionService {
    versions: Arc<dyn VersionRepository>,
    pipelines: Arc<dyn PipelineRepository>,
    guard: OwnershipGuard,
}

impl VersionService {
    pub fn new(
        versions: Arc<dyn VersionRepository>,
        pipelines: Arc<dyn PipelineRepository>,
        guard: OwnershipGuard,
    ) -> Self {
        Self {
            versions,
            pipelines,
            guard,
        }
    }

    #[instrument(skip(self, input), fields(
        actor = %actor_id,
        pipeline_id = %input.pipeline_id,
        activate = input.is_active,
    ))]
    pub async fn create_version(
        &self,
        actor_id: Uuid,
        input: NewVersion,
    ) -> PipeflowResult<PipelineVersion> {
        self.pipelines
            .get_by_id(input.pipeline_id)
            .await?
            .ok_or_else(|| PipeflowError::pipeline_not_found(input.pipeline_id))?;
        self.guard.require_owner(actor_id, input.pipeline_id).await?;

        if input.version.trim().is_empty() {
            return Err(PipeflowError::validation_error("version label must not be empty"));
        }

        let created = self.versions.create(&PipelineVersion::new(input)).await?;
        info!(
            "version '{}' created for pipeline {} (active: {})",
            created.version, created.pipeline_id, created.is_active
        );
        Ok(created)
    }

    pub async fn get_version(&self, id: Uuid) -> PipeflowResult<PipelineVersion> {
        self.versions
            .get_by_id(id)
            .await?
            .ok_or_else(|| PipeflowError::version_not_found(id))
    }

    /// The unique active version, or not-found while none has been
    /// activated yet.
    pub async fn get_active_version(&self, pipeline_id: Uuid) -> PipeflowResult<PipelineVersion> {
        self.pipelines
            .get_by_id(pipeline_id)
            .await?
            .ok_or_else(|| PipeflowError::pipeline_not_found(pipeline_id))?;
        self.versions
            .get_active(pipeline_id)
            .await?
            .ok_or_else(|| PipeflowError::no_active_version(pipeline_id))
    }

    pub async fn list_versions(&self, pipeline_id: Uuid) -> PipeflowResult<Vec<PipelineVersion>> {
        self.pipelines
            .get_by_id(pipeline_id)
            .await?
            .ok_or_else(|| PipeflowError::pipeline_not_found(pipeline_id))?;
        self.versions.list_by_pipeline(pipeline_id).await
    }

    #[instrument(skip(self, patch), fields(actor = %actor_id, version_id = %id))]
    pub async fn update_version(
        &self,
        actor_id: Uuid,
        id: Uuid,
        patch: &VersionPatch,
    ) -> PipeflowResult<PipelineVersion> {
        let version = self.get_version(id).await?;
        self.guard.require_owner(actor_id, version.pipeline_id).await?;
        self.versions.update(id, patch).await
    }

    #[instrument(skip(self), fields(actor = %actor_id, version_id = %id))]
    pub async fn delete_version(&self, actor_id: Uuid, id: Uuid) -> PipeflowResult<()> {
        let version = self.get_version(id).await?;
        self.guard.require_owner(actor_id, version.pipeline_id).await?;
        self.versions.delete(id).await?;
        info!("version {id} deleted by {actor_id}");
        Ok(())
    }
}
