use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use pipeflow_domain::entities::{Pipeline, User};
use pipeflow_domain::repositories::{PipelineRepository, UserRepository};
use pipeflow_domain::value_objects::{NewPipeline, PipelineFilter, PipelinePatch};
use pipeflow_errors::{PipeflowError, PipeflowResult};

use super::access::OwnershipGuard;

/// Pipeline CRUD plus the ownership graph. The creating user becomes the
/// first owner; later owners are added and removed explicitly.
#[derive(Clone)]
pub struct PipelineService {
    pipelines: Arc<dyn PipelineRepository>,
    users: Arc<dyn UserRepository>,
    guard: OwnershipGuard,
}

impl PipelineService {
    pub fn new(pipelines: Arc<dyn PipelineRepository>, users: Arc<dyn UserRepository>) -> Self {
        let guard = OwnershipGuard::new(users.clone(), pipelines.clone());
        Self {
            pipelines,
            users,
            guard,
        }
    }

    #[instrument(skip(self, input), fields(actor = %actor_id, code = %input.code))]
    pub async fn create_pipeline(
        &self,
        actor_id: Uuid,
        input: NewPipeline,
    ) -> PipeflowResult<Pipeline> {
        self.guard.resolve_actor(actor_id).await?;

        if input.name.trim().is_empty() {
            return Err(PipeflowError::validation_error("pipeline name must not be empty"));
        }
        if input.code.trim().is_empty() {
            return Err(PipeflowError::validation_error("pipeline code must not be empty"));
        }
        if input.executor_type.trim().is_empty() {
            return Err(PipeflowError::validation_error(
                "pipeline executor_type must not be empty",
            ));
        }

        // friendly duplicate checks; the unique constraints stay authoritative
        if self.pipelines.get_by_code(&input.code).await?.is_some() {
            return Err(PipeflowError::conflict(format!(
                "pipeline code '{}' is already taken",
                input.code
            )));
        }
        if self.pipelines.get_by_name(&input.name).await?.is_some() {
            return Err(PipeflowError::conflict(format!(
                "pipeline name '{}' is already taken",
                input.name
            )));
        }

        let pipeline = Pipeline::new(input);
        let created = self.pipelines.create(&pipeline, actor_id).await?;
        info!("created {} owned by {actor_id}", created.entity_description());
        Ok(created)
    }

    pub async fn get_pipeline(&self, id: Uuid) -> PipeflowResult<Pipeline> {
        self.pipelines
            .get_by_id(id)
            .await?
            .ok_or_else(|| PipeflowError::pipeline_not_found(id))
    }

    pub async fn list_pipelines(&self, filter: &PipelineFilter) -> PipeflowResult<Vec<Pipeline>> {
        self.pipelines.list(filter).await
    }

    #[instrument(skip(self, patch), fields(actor = %actor_id, pipeline_id = %id))]
    pub async fn update_pipeline(
        &self,
        actor_id: Uuid,
        id: Uuid,
        patch: &PipelinePatch,
    ) -> PipeflowResult<Pipeline> {
        self.get_pipeline(id).await?;
        self.guard.require_owner(actor_id, id).await?;

        if let Some(code) = &patch.code {
            if let Some(existing) = self.pipelines.get_by_code(code).await? {
                if existing.id != id {
                    return Err(PipeflowError::conflict(format!(
                        "pipeline code '{code}' is already taken"
                    )));
                }
            }
        }
        if let Some(name) = &patch.name {
            if let Some(existing) = self.pipelines.get_by_name(name).await? {
                if existing.id != id {
                    return Err(PipeflowError::conflict(format!(
                        "pipeline name '{name}' is already taken"
                    )));
                }
            }
        }

        self.pipelines.update(id, patch).await
    }

    #[instrument(skip(self), fields(actor = %actor_id, pipeline_id = %id))]
    pub async fn delete_pipeline(&self, actor_id: Uuid, id: Uuid) -> PipeflowResult<()> {
        self.get_pipeline(id).await?;
        self.guard.require_owner(actor_id, id).await?;
        self.pipelines.delete(id).await?;
        info!("pipeline {id} deleted by {actor_id}");
        Ok(())
    }

    #[instrument(skip(self), fields(actor = %actor_id, pipeline_id = %pipeline_id, user_id = %user_id))]
    pub async fn add_owner(
        &self,
        actor_id: Uuid,
        pipeline_id: Uuid,
        user_id: Uuid,
    ) -> PipeflowResult<()> {
        self.get_pipeline(pipeline_id).await?;
        self.guard.require_owner(actor_id, pipeline_id).await?;
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| PipeflowError::user_not_found(user_id))?;
        self.pipelines.add_owner(pipeline_id, user_id).await
    }

    /// Removing the last owner leaves the pipeline ownerless (admins can
    /// still reach it); it is never deleted implicitly.
    #[instrument(skip(self), fields(actor = %actor_id, pipeline_id = %pipeline_id, user_id = %user_id))]
    pub async fn remove_owner(
        &self,
        actor_id: Uuid,
        pipeline_id: Uuid,
        user_id: Uuid,
    ) -> PipeflowResult<bool> {
        self.get_pipeline(pipeline_id).await?;
        self.guard.require_owner(actor_id, pipeline_id).await?;
        self.pipelines.remove_owner(pipeline_id, user_id).await
    }

    pub async fn list_owners(&self, pipeline_id: Uuid) -> PipeflowResult<Vec<User>> {
        self.get_pipeline(pipeline_id).await?;
        self.pipelines.list_owners(pipeline_id).await
    }
}
