use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;

use pipeflow_domain::entities::{EntityRef, Tag, TagLink};
use pipeflow_domain::repositories::TagRepository;
use pipeflow_domain::value_objects::{NewTag, TagPatch};
use pipeflow_errors::{PipeflowError, PipeflowResult};

use super::access::OwnershipGuard;

/// Tags are catalog-global; any active user can manage them. Targets are
/// typed [`EntityRef`]s, so an unknown entity kind never reaches storage.
#[derive(Clone)]
pub struct TagService {
    tags: Arc<dyn TagRepository>,
    guard: OwnershipGuard,
}

impl TagService {
    pub fn new(tags: Arc<dyn TagRepository>, guard: OwnershipGuard) -> Self {
        Self { tags, guard }
    }

    #[instrument(skip(self, input), fields(actor = %actor_id, name = %input.name))]
    pub async fn create_tag(&self, actor_id: Uuid, input: NewTag) -> PipeflowResult<Tag> {
        self.guard.resolve_actor(actor_id).await?;
        if input.name.trim().is_empty() {
            return Err(PipeflowError::validation_error("tag name must not be empty"));
        }
        if self.tags.get_by_name(&input.name).await?.is_some() {
            return Err(PipeflowError::conflict(format!(
                "tag '{}' already exists",
                input.name
            )));
        }
        self.tags.create(&Tag::new(input)).await
    }

    pub async fn get_tag(&self, id: i64) -> PipeflowResult<Tag> {
        self.tags
            .get_by_id(id)
            .await?
            .ok_or_else(|| PipeflowError::tag_not_found(id))
    }

    pub async fn list_tags(&self, limit: Option<i64>, offset: Option<i64>) -> PipeflowResult<Vec<Tag>> {
        self.tags.list(limit, offset).await
    }

    #[instrument(skip(self, patch), fields(actor = %actor_id, tag_id = %id))]
    pub async fn update_tag(&self, actor_id: Uuid, id: i64, patch: &TagPatch) -> PipeflowResult<Tag> {
        self.guard.resolve_actor(actor_id).await?;
        self.get_tag(id).await?;
        if let Some(name) = &patch.name {
            if let Some(existing) = self.tags.get_by_name(name).await? {
                if existing.id != id {
                    return Err(PipeflowError::conflict(format!("tag '{name}' already exists")));
                }
            }
        }
        self.tags.update(id, patch).await
    }

    #[instrument(skip(self), fields(actor = %actor_id, tag_id = %id))]
    pub async fn delete_tag(&self, actor_id: Uuid, id: i64) -> PipeflowResult<()> {
        self.guard.resolve_actor(actor_id).await?;
        self.get_tag(id).await?;
        self.tags.delete(id).await
    }

    /// Binding is exact-once: a duplicate `(tag, target)` pair surfaces
    /// Conflict, which idempotent-intent callers catch and ignore.
    #[instrument(skip(self, target), fields(actor = %actor_id, tag_id = %tag_id, target = %target))]
    pub async fn tag_entity(
        &self,
        actor_id: Uuid,
        tag_id: i64,
        target: &EntityRef,
    ) -> PipeflowResult<TagLink> {
        self.guard.resolve_actor(actor_id).await?;
        self.get_tag(tag_id).await?;
        self.tags.link(tag_id, target).await
    }

    #[instrument(skip(self, target), fields(actor = %actor_id, tag_id = %tag_id, target = %target))]
    pub async fn untag_entity(
        &self,
        actor_id: Uuid,
        tag_id: i64,
        target: &EntityRef,
    ) -> PipeflowResult<bool> {
        self.guard.resolve_actor(actor_id).await?;
        self.tags.unlink(tag_id, target).await
    }

    pub async fn list_tags_for(&self, target: &EntityRef) -> PipeflowResult<Vec<Tag>> {
        self.tags.list_tags_for(target).await
    }

    pub async fn list_entities_for(&self, tag_id: i64) -> PipeflowResult<Vec<TagLink>> {
        self.get_tag(tag_id).await?;
        self.tags.list_links_for_tag(tag_id).await
    }
}
