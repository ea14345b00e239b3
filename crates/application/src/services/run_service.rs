use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use pipeflow_domain::entities::{PipelineRun, RunArtifact, RunParamValue, RunStatus};
use pipeflow_domain::repositories::{RunRepository, VersionRepository};
use pipeflow_domain::value_objects::{NewArtifact, NewRun, RunFilter};
use pipeflow_errors::{PipeflowError, PipeflowResult};

use super::access::OwnershipGuard;

/// Run lifecycle: PENDING -> RUNNING -> {SUCCESS | FAILED}, nothing else.
/// Timestamps are stamped by the transition itself, and the persisted
/// update is a compare-and-swap against the status the decision was made
/// on, so a racing transition cannot corrupt a terminal state.
#[derive(Clone)]
pub struct RunService {
    runs: Arc<dyn RunRepository>,
    versions: Arc<dyn VersionRepository>,
    guard: OwnershipGuard,
}

impl RunService {
    pub fn new(
        runs: Arc<dyn RunRepository>,
        versions: Arc<dyn VersionRepository>,
        guard: OwnershipGuard,
    ) -> Self {
        Self {
            runs,
            versions,
            guard,
        }
    }

    #[instrument(skip(self, input), fields(actor = %actor_id, version_id = %input.pipeline_version_id))]
    pub async fn create_run(&self, actor_id: Uuid, input: NewRun) -> PipeflowResult<PipelineRun> {
        // the version resolves the pipeline linkage; a run can never point
        // at a version of some other pipeline
        let version = self
            .versions
            .get_by_id(input.pipeline_version_id)
            .await?
            .ok_or_else(|| PipeflowError::version_not_found(input.pipeline_version_id))?;
        self.guard.require_owner(actor_id, version.pipeline_id).await?;

        let run = PipelineRun::new(
            version.pipeline_id,
            version.id,
            Some(actor_id),
            input.executor_run_id,
        );
        let created = self.runs.create(&run).await?;
        info!("created {}", created.entity_description());
        Ok(created)
    }

    pub async fn get_run(&self, id: Uuid) -> PipeflowResult<PipelineRun> {
        self.runs
            .get_by_id(id)
            .await?
            .ok_or_else(|| PipeflowError::run_not_found(id))
    }

    pub async fn list_runs(&self, filter: &RunFilter) -> PipeflowResult<Vec<PipelineRun>> {
        self.runs.list(filter).await
    }

    #[instrument(skip(self), fields(actor = %actor_id, run_id = %run_id, target = %target))]
    pub async fn transition_run(
        &self,
        actor_id: Uuid,
        run_id: Uuid,
        target: RunStatus,
    ) -> PipeflowResult<PipelineRun> {
        let run = self.get_run(run_id).await?;
        self.guard.require_owner(actor_id, run.pipeline_id).await?;

        if !run.status.can_transition_to(target) {
            return Err(PipeflowError::invalid_transition(run.status, target));
        }

        let now = Utc::now();
        let started_at = matches!(target, RunStatus::Running).then_some(now);
        let finished_at = target.is_terminal().then_some(now);

        let swapped = self
            .runs
            .update_status(run_id, run.status, target, started_at, finished_at)
            .await?;
        if !swapped {
            // lost a race; report against the state that actually won
            let current = self.get_run(run_id).await?;
            return Err(PipeflowError::invalid_transition(current.status, target));
        }

        let updated = self.get_run(run_id).await?;
        info!("run {run_id}: {} -> {}", run.status, updated.status);
        Ok(updated)
    }

    /// Late telemetry is allowed: artifacts attach in any run state,
    /// terminal included. Duplicate names surface Conflict.
    #[instrument(skip(self, input), fields(actor = %actor_id, run_id = %run_id, name = %input.name))]
    pub async fn attach_artifact(
        &self,
        actor_id: Uuid,
        run_id: Uuid,
        input: NewArtifact,
    ) -> PipeflowResult<RunArtifact> {
        let run = self.get_run(run_id).await?;
        self.guard.require_owner(actor_id, run.pipeline_id).await?;

        if input.name.trim().is_empty() {
            return Err(PipeflowError::validation_error("artifact name must not be empty"));
        }
        self.runs.add_artifact(&RunArtifact::new(run_id, input)).await
    }

    /// Same late-attachment rule as artifacts; `(run, name)` must be unique.
    #[instrument(skip(self, value), fields(actor = %actor_id, run_id = %run_id, name = %name))]
    pub async fn attach_param_value(
        &self,
        actor_id: Uuid,
        run_id: Uuid,
        name: String,
        value: String,
    ) -> PipeflowResult<RunParamValue> {
        let run = self.get_run(run_id).await?;
        self.guard.require_owner(actor_id, run.pipeline_id).await?;

        if name.trim().is_empty() {
            return Err(PipeflowError::validation_error("param name must not be empty"));
        }
        self.runs
            .add_param_value(&RunParamValue::new(run_id, name, value))
            .await
    }

    pub async fn list_artifacts(&self, run_id: Uuid) -> PipeflowResult<Vec<RunArtifact>> {
        self.get_run(run_id).await?;
        self.runs.list_artifacts(run_id).await
    }

    pub async fn list_param_values(&self, run_id: Uuid) -> PipeflowResult<Vec<RunParamValue>> {
        self.get_run(run_id).await?;
        self.runs.list_param_values(run_id).await
    }
}
