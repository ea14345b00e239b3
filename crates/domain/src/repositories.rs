//! Repository abstractions over the entity store.
//!
//! Implementations live in `pipeflow-infrastructure`; every mutating method
//! runs inside a single storage transaction, so a returned error implies
//! nothing was written.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use pipeflow_errors::PipeflowResult;

use crate::entities::{
    EntityRef, Pipeline, PipelineRun, PipelineVersion, RunArtifact, RunParamValue, RunStatus, Tag,
    TagLink, User,
};
use crate::value_objects::{
    PipelineFilter, PipelinePatch, RunFilter, TagPatch, UserPatch, VersionPatch,
};

#[async_trait]
pub trait PipelineRepository: Send + Sync {
    /// Insert the pipeline and its first ownership link in one transaction.
    async fn create(&self, pipeline: &Pipeline, owner_id: Uuid) -> PipeflowResult<Pipeline>;
    async fn get_by_id(&self, id: Uuid) -> PipeflowResult<Option<Pipeline>>;
    async fn get_by_code(&self, code: &str) -> PipeflowResult<Option<Pipeline>>;
    async fn get_by_name(&self, name: &str) -> PipeflowResult<Option<Pipeline>>;
    async fn list(&self, filter: &PipelineFilter) -> PipeflowResult<Vec<Pipeline>>;
    async fn update(&self, id: Uuid, patch: &PipelinePatch) -> PipeflowResult<Pipeline>;
    /// Ordered cascade: param values, artifacts, runs, versions, tag links,
    /// ownership links, then the pipeline row. Users and tags survive.
    async fn delete(&self, id: Uuid) -> PipeflowResult<()>;

    async fn add_owner(&self, pipeline_id: Uuid, user_id: Uuid) -> PipeflowResult<()>;
    async fn remove_owner(&self, pipeline_id: Uuid, user_id: Uuid) -> PipeflowResult<bool>;
    async fn list_owners(&self, pipeline_id: Uuid) -> PipeflowResult<Vec<User>>;
    async fn is_owner(&self, pipeline_id: Uuid, user_id: Uuid) -> PipeflowResult<bool>;
}

#[async_trait]
pub trait VersionRepository: Send + Sync {
    /// When the new version is active, the pipeline's current active version
    /// is deactivated in the same transaction. A racing activation loses at
    /// commit with a Conflict from the partial unique index.
    async fn create(&self, version: &PipelineVersion) -> PipeflowResult<PipelineVersion>;
    async fn get_by_id(&self, id: Uuid) -> PipeflowResult<Option<PipelineVersion>>;
    async fn get_active(&self, pipeline_id: Uuid) -> PipeflowResult<Option<PipelineVersion>>;
    async fn list_by_pipeline(&self, pipeline_id: Uuid) -> PipeflowResult<Vec<PipelineVersion>>;
    /// Same deactivate-then-activate rule when the patch sets `is_active`.
    async fn update(&self, id: Uuid, patch: &VersionPatch) -> PipeflowResult<PipelineVersion>;
    async fn delete(&self, id: Uuid) -> PipeflowResult<()>;
}

#[async_trait]
pub trait RunRepository: Send + Sync {
    async fn create(&self, run: &PipelineRun) -> PipeflowResult<PipelineRun>;
    async fn get_by_id(&self, id: Uuid) -> PipeflowResult<Option<PipelineRun>>;
    async fn list(&self, filter: &RunFilter) -> PipeflowResult<Vec<PipelineRun>>;
    /// Guarded compare-and-swap: the row is only touched while its status
    /// still equals `from`. Returns false when the guard misses.
    async fn update_status(
        &self,
        id: Uuid,
        from: RunStatus,
        to: RunStatus,
        started_at: Option<DateTime<Utc>>,
        finished_at: Option<DateTime<Utc>>,
    ) -> PipeflowResult<bool>;
    async fn add_artifact(&self, artifact: &RunArtifact) -> PipeflowResult<RunArtifact>;
    async fn add_param_value(&self, param: &RunParamValue) -> PipeflowResult<RunParamValue>;
    async fn list_artifacts(&self, run_id: Uuid) -> PipeflowResult<Vec<RunArtifact>>;
    async fn list_param_values(&self, run_id: Uuid) -> PipeflowResult<Vec<RunParamValue>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &User) -> PipeflowResult<User>;
    async fn get_by_id(&self, id: Uuid) -> PipeflowResult<Option<User>>;
    async fn get_by_email(&self, email: &str) -> PipeflowResult<Option<User>>;
    async fn list(&self, limit: Option<i64>, offset: Option<i64>) -> PipeflowResult<Vec<User>>;
    async fn update(&self, id: Uuid, patch: &UserPatch) -> PipeflowResult<User>;
    /// Removes the user's ownership links and nulls `pipeline_runs.user_id`;
    /// pipelines and runs themselves are left in place.
    async fn delete(&self, id: Uuid) -> PipeflowResult<()>;
}

#[async_trait]
pub trait TagRepository: Send + Sync {
    async fn create(&self, tag: &Tag) -> PipeflowResult<Tag>;
    async fn get_by_id(&self, id: i64) -> PipeflowResult<Option<Tag>>;
    async fn get_by_name(&self, name: &str) -> PipeflowResult<Option<Tag>>;
    async fn list(&self, limit: Option<i64>, offset: Option<i64>) -> PipeflowResult<Vec<Tag>>;
    async fn update(&self, id: i64, patch: &TagPatch) -> PipeflowResult<Tag>;
    async fn delete(&self, id: i64) -> PipeflowResult<()>;

    /// Duplicate `(tag, entity_type, entity_id)` triples fail with Conflict.
    async fn link(&self, tag_id: i64, target: &EntityRef) -> PipeflowResult<TagLink>;
    async fn unlink(&self, tag_id: i64, target: &EntityRef) -> PipeflowResult<bool>;
    async fn list_tags_for(&self, target: &EntityRef) -> PipeflowResult<Vec<Tag>>;
    async fn list_links_for_tag(&self, tag_id: i64) -> PipeflowResult<Vec<TagLink>>;
}
