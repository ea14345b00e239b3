//! Actor resolution and ownership-based authorization.
//!
//! Identity comes from the (external) API layer as an explicit user id;
//! this module only answers "may this user touch that pipeline".

use std::sync::Arc;

use uuid::Uuid;

use pipeflow_domain::entities::User;
use pipeflow_domain::repositories::{PipelineRepository, UserRepository};
use pipeflow_errors::{PipeflowError, PipeflowResult};

#[derive(Clone)]
pub struct OwnershipGuard {
    users: Arc<dyn UserRepository>,
    pipelines: Arc<dyn PipelineRepository>,
}

impl OwnershipGuard {
    pub fn new(users: Arc<dyn UserRepository>, pipelines: Arc<dyn PipelineRepository>) -> Self {
        Self { users, pipelines }
    }

    /// The actor must exist and be active.
    pub async fn resolve_actor(&self, actor_id: Uuid) -> PipeflowResult<User> {
        let user = self
            .users
            .get_by_id(actor_id)
            .await?
            .ok_or_else(|| PipeflowError::user_not_found(actor_id))?;
        if !user.is_active {
            return Err(PipeflowError::forbidden(format!(
                "user {actor_id} is deactivated"
            )));
        }
        Ok(user)
    }

    /// Admins pass; everyone else must be an owner of the pipeline.
    pub async fn require_owner(&self, actor_id: Uuid, pipeline_id: Uuid) -> PipeflowResult<User> {
        let actor = self.resolve_actor(actor_id).await?;
        if actor.is_admin() {
            return Ok(actor);
        }
        if self.pipelines.is_owner(pipeline_id, actor_id).await? {
            Ok(actor)
        } else {
            Err(PipeflowError::forbidden(format!(
                "user {actor_id} does not own pipeline {pipeline_id}"
            )))
        }
    }

    pub async fn require_admin(&self, actor_id: Uuid) -> PipeflowResult<User> {
        let actor = self.resolve_actor(actor_id).await?;
        if actor.is_admin() {
            Ok(actor)
        } else {
            Err(PipeflowError::forbidden(format!(
                "user {actor_id} is not an administrator"
            )))
        }
    }
}
