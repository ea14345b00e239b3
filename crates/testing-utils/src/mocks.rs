//! In-memory mock repositories.
//!
//! These enforce the same uniqueness and guard semantics as the real
//! backends so service logic can be tested without a database. Aggregate
//! cascade behavior (pipeline delete wiping versions/runs) is the SQL
//! layer's contract and is exercised against real SQLite instead.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use pipeflow_domain::entities::{
    EntityRef, Pipeline, PipelineRun, PipelineVersion, RunArtifact, RunParamValue, RunStatus, Tag,
    TagLink, User,
};
use pipeflow_domain::repositories::{
    PipelineRepository, RunRepository, TagRepository, UserRepository, VersionRepository,
};
use pipeflow_domain::value_objects::{
    PipelineFilter, PipelinePatch, RunFilter, TagPatch, UserPatch, VersionPatch,
};
use pipeflow_errors::{PipeflowError, PipeflowResult};

type UserStore = Arc<Mutex<HashMap<Uuid, User>>>;

#[derive(Clone, Default)]
pub struct MockUserRepository {
    users: UserStore,
}

impl MockUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: Vec<User>) -> Self {
        let repo = Self::new();
        {
            let mut store = repo.users.lock().unwrap();
            for user in users {
                store.insert(user.id, user);
            }
        }
        repo
    }

    /// Synchronous insert for test setup.
    pub fn insert(&self, user: User) {
        self.users.lock().unwrap().insert(user.id, user);
    }

    pub fn count(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub(crate) fn store(&self) -> UserStore {
        self.users.clone()
    }
}

#[async_trait]
impl UserRepository for MockUserRepository {
    async fn create(&self, user: &User) -> PipeflowResult<User> {
        let mut users = self.users.lock().unwrap();
        if users.values().any(|u| u.email == user.email) {
            return Err(PipeflowError::conflict(format!(
                "email '{}' is already registered",
                user.email
            )));
        }
        users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> PipeflowResult<Option<User>> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> PipeflowResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn list(&self, limit: Option<i64>, offset: Option<i64>) -> PipeflowResult<Vec<User>> {
        let mut users: Vec<User> = self.users.lock().unwrap().values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(users, limit, offset))
    }

    async fn update(&self, id: Uuid, patch: &UserPatch) -> PipeflowResult<User> {
        let mut users = self.users.lock().unwrap();
        if let Some(email) = &patch.email {
            if users.values().any(|u| u.email == *email && u.id != id) {
                return Err(PipeflowError::conflict(format!(
                    "email '{email}' is already registered"
                )));
            }
        }
        let user = users
            .get_mut(&id)
            .ok_or_else(|| PipeflowError::user_not_found(id))?;
        if let Some(email) = &patch.email {
            user.email = email.clone();
        }
        if let Some(password_hash) = &patch.password_hash {
            user.password_hash = password_hash.clone();
        }
        if let Some(role) = patch.role {
            user.role = role;
        }
        if let Some(is_active) = patch.is_active {
            user.is_active = is_active;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn delete(&self, id: Uuid) -> PipeflowResult<()> {
        self.users
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| PipeflowError::user_not_found(id))
    }
}

#[derive(Clone)]
pub struct MockPipelineRepository {
    pipelines: Arc<Mutex<HashMap<Uuid, Pipeline>>>,
    owners: Arc<Mutex<Vec<(Uuid, Uuid)>>>,
    users: UserStore,
}

impl MockPipelineRepository {
    /// Shares the user store so `list_owners` can resolve accounts.
    pub fn new(users: &MockUserRepository) -> Self {
        Self {
            pipelines: Arc::new(Mutex::new(HashMap::new())),
            owners: Arc::new(Mutex::new(Vec::new())),
            users: users.store(),
        }
    }

    pub fn insert(&self, pipeline: Pipeline) {
        self.pipelines
            .lock()
            .unwrap()
            .insert(pipeline.id, pipeline);
    }

    pub fn insert_owner(&self, pipeline_id: Uuid, user_id: Uuid) {
        self.owners.lock().unwrap().push((pipeline_id, user_id));
    }

    pub fn count(&self) -> usize {
        self.pipelines.lock().unwrap().len()
    }

    pub fn owner_pairs(&self) -> Vec<(Uuid, Uuid)> {
        self.owners.lock().unwrap().clone()
    }
}

#[async_trait]
impl PipelineRepository for MockPipelineRepository {
    async fn create(&self, pipeline: &Pipeline, owner_id: Uuid) -> PipeflowResult<Pipeline> {
        let mut pipelines = self.pipelines.lock().unwrap();
        if pipelines.values().any(|p| p.code == pipeline.code) {
            return Err(PipeflowError::conflict(format!(
                "pipeline code '{}' is already taken",
                pipeline.code
            )));
        }
        if pipelines.values().any(|p| p.name == pipeline.name) {
            return Err(PipeflowError::conflict(format!(
                "pipeline name '{}' is already taken",
                pipeline.name
            )));
        }
        pipelines.insert(pipeline.id, pipeline.clone());
        self.owners.lock().unwrap().push((pipeline.id, owner_id));
        Ok(pipeline.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> PipeflowResult<Option<Pipeline>> {
        Ok(self.pipelines.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_code(&self, code: &str) -> PipeflowResult<Option<Pipeline>> {
        Ok(self
            .pipelines
            .lock()
            .unwrap()
            .values()
            .find(|p| p.code == code)
            .cloned())
    }

    async fn get_by_name(&self, name: &str) -> PipeflowResult<Option<Pipeline>> {
        Ok(self
            .pipelines
            .lock()
            .unwrap()
            .values()
            .find(|p| p.name == name)
            .cloned())
    }

    async fn list(&self, filter: &PipelineFilter) -> PipeflowResult<Vec<Pipeline>> {
        let owners = self.owners.lock().unwrap();
        let mut pipelines: Vec<Pipeline> = self
            .pipelines
            .lock()
            .unwrap()
            .values()
            .filter(|p| {
                filter
                    .owner_id
                    .map(|owner| owners.iter().any(|(pid, uid)| *pid == p.id && *uid == owner))
                    .unwrap_or(true)
            })
            .filter(|p| filter.is_active.map(|a| p.is_active == a).unwrap_or(true))
            .cloned()
            .collect();
        pipelines.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(pipelines, filter.limit, filter.offset))
    }

    async fn update(&self, id: Uuid, patch: &PipelinePatch) -> PipeflowResult<Pipeline> {
        let mut pipelines = self.pipelines.lock().unwrap();
        if let Some(code) = &patch.code {
            if pipelines.values().any(|p| p.code == *code && p.id != id) {
                return Err(PipeflowError::conflict(format!(
                    "pipeline code '{code}' is already taken"
                )));
            }
        }
        if let Some(name) = &patch.name {
            if pipelines.values().any(|p| p.name == *name && p.id != id) {
                return Err(PipeflowError::conflict(format!(
                    "pipeline name '{name}' is already taken"
                )));
            }
        }
        let pipeline = pipelines
            .get_mut(&id)
            .ok_or_else(|| PipeflowError::pipeline_not_found(id))?;
        if let Some(name) = &patch.name {
            pipeline.name = name.clone();
        }
        if let Some(code) = &patch.code {
            pipeline.code = code.clone();
        }
        if let Some(description) = &patch.description {
            pipeline.description = Some(description.clone());
        }
        if let Some(executor_type) = &patch.executor_type {
            pipeline.executor_type = executor_type.clone();
        }
        if let Some(external_id) = &patch.external_id {
            pipeline.external_id = Some(external_id.clone());
        }
        if let Some(is_active) = patch.is_active {
            pipeline.is_active = is_active;
        }
        pipeline.updated_at = Utc::now();
        Ok(pipeline.clone())
    }

    async fn delete(&self, id: Uuid) -> PipeflowResult<()> {
        self.pipelines
            .lock()
            .unwrap()
            .remove(&id)
            .ok_or_else(|| PipeflowError::pipeline_not_found(id))?;
        self.owners.lock().unwrap().retain(|(pid, _)| *pid != id);
        Ok(())
    }

    async fn add_owner(&self, pipeline_id: Uuid, user_id: Uuid) -> PipeflowResult<()> {
        let mut owners = self.owners.lock().unwrap();
        if !owners
            .iter()
            .any(|(pid, uid)| *pid == pipeline_id && *uid == user_id)
        {
            owners.push((pipeline_id, user_id));
        }
        Ok(())
    }

    async fn remove_owner(&self, pipeline_id: Uuid, user_id: Uuid) -> PipeflowResult<bool> {
        let mut owners = self.owners.lock().unwrap();
        let before = owners.len();
        owners.retain(|(pid, uid)| !(*pid == pipeline_id && *uid == user_id));
        Ok(owners.len() < before)
    }

    async fn list_owners(&self, pipeline_id: Uuid) -> PipeflowResult<Vec<User>> {
        let owners = self.owners.lock().unwrap();
        let users = self.users.lock().unwrap();
        Ok(owners
            .iter()
            .filter(|(pid, _)| *pid == pipeline_id)
            .filter_map(|(_, uid)| users.get(uid).cloned())
            .collect())
    }

    async fn is_owner(&self, pipeline_id: Uuid, user_id: Uuid) -> PipeflowResult<bool> {
        Ok(self
            .owners
            .lock()
            .unwrap()
            .iter()
            .any(|(pid, uid)| *pid == pipeline_id && *uid == user_id))
    }
}

#[derive(Clone, Default)]
pub struct MockVersionRepository {
    versions: Arc<Mutex<HashMap<Uuid, PipelineVersion>>>,
}

impl MockVersionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, version: PipelineVersion) {
        self.versions.lock().unwrap().insert(version.id, version);
    }

    pub fn count(&self) -> usize {
        self.versions.lock().unwrap().len()
    }

    /// Invariant probe used by tests.
    pub fn active_count(&self, pipeline_id: Uuid) -> usize {
        self.versions
            .lock()
            .unwrap()
            .values()
            .filter(|v| v.pipeline_id == pipeline_id && v.is_active)
            .count()
    }
}

#[async_trait]
impl VersionRepository for MockVersionRepository {
    async fn create(&self, version: &PipelineVersion) -> PipeflowResult<PipelineVersion> {
        let mut versions = self.versions.lock().unwrap();
        if version.is_active {
            for existing in versions.values_mut() {
                if existing.pipeline_id == version.pipeline_id && existing.is_active {
                    existing.is_active = false;
                    existing.updated_at = Utc::now();
                }
            }
        }
        versions.insert(version.id, version.clone());
        Ok(version.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> PipeflowResult<Option<PipelineVersion>> {
        Ok(self.versions.lock().unwrap().get(&id).cloned())
    }

    async fn get_active(&self, pipeline_id: Uuid) -> PipeflowResult<Option<PipelineVersion>> {
        Ok(self
            .versions
            .lock()
            .unwrap()
            .values()
            .find(|v| v.pipeline_id == pipeline_id && v.is_active)
            .cloned())
    }

    async fn list_by_pipeline(&self, pipeline_id: Uuid) -> PipeflowResult<Vec<PipelineVersion>> {
        let mut versions: Vec<PipelineVersion> = self
            .versions
            .lock()
            .unwrap()
            .values()
            .filter(|v| v.pipeline_id == pipeline_id)
            .cloned()
            .collect();
        versions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(versions)
    }

    async fn update(&self, id: Uuid, patch: &VersionPatch) -> PipeflowResult<PipelineVersion> {
        let mut versions = self.versions.lock().unwrap();
        let pipeline_id = versions
            .get(&id)
            .map(|v| v.pipeline_id)
            .ok_or_else(|| PipeflowError::version_not_found(id))?;
        if patch.activates() {
            for existing in versions.values_mut() {
                if existing.pipeline_id == pipeline_id && existing.is_active && existing.id != id {
                    existing.is_active = false;
                    existing.updated_at = Utc::now();
                }
            }
        }
        let version = versions
            .get_mut(&id)
            .ok_or_else(|| PipeflowError::version_not_found(id))?;
        if let Some(label) = &patch.version {
            version.version = label.clone();
        }
        if let Some(schema) = &patch.schema {
            version.schema = Some(schema.clone());
        }
        if let Some(description) = &patch.description {
            version.description = Some(description.clone());
        }
        if let Some(is_active) = patch.is_active {
            version.is_active = is_active;
        }
        version.updated_at = Utc::now();
        Ok(version.clone())
    }

    async fn delete(&self, id: Uuid) -> PipeflowResult<()> {
        self.versions
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| PipeflowError::version_not_found(id))
    }
}

#[derive(Clone, Default)]
pub struct MockRunRepository {
    runs: Arc<Mutex<HashMap<Uuid, PipelineRun>>>,
    artifacts: Arc<Mutex<Vec<RunArtifact>>>,
    params: Arc<Mutex<Vec<RunParamValue>>>,
    next_id: Arc<Mutex<i64>>,
}

impl MockRunRepository {
    pub fn new() -> Self {
        Self {
            next_id: Arc::new(Mutex::new(1)),
            ..Self::default()
        }
    }

    pub fn insert(&self, run: PipelineRun) {
        self.runs.lock().unwrap().insert(run.id, run);
    }

    pub fn count(&self) -> usize {
        self.runs.lock().unwrap().len()
    }

    fn allocate_id(&self) -> i64 {
        let mut next = self.next_id.lock().unwrap();
        let id = *next;
        *next += 1;
        id
    }
}

#[async_trait]
impl RunRepository for MockRunRepository {
    async fn create(&self, run: &PipelineRun) -> PipeflowResult<PipelineRun> {
        self.runs.lock().unwrap().insert(run.id, run.clone());
        Ok(run.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> PipeflowResult<Option<PipelineRun>> {
        Ok(self.runs.lock().unwrap().get(&id).cloned())
    }

    async fn list(&self, filter: &RunFilter) -> PipeflowResult<Vec<PipelineRun>> {
        let mut runs: Vec<PipelineRun> = self
            .runs
            .lock()
            .unwrap()
            .values()
            .filter(|r| filter.pipeline_id.map(|p| r.pipeline_id == p).unwrap_or(true))
            .filter(|r| {
                filter
                    .pipeline_version_id
                    .map(|v| r.pipeline_version_id == v)
                    .unwrap_or(true)
            })
            .filter(|r| filter.user_id.map(|u| r.user_id == Some(u)).unwrap_or(true))
            .filter(|r| filter.status.map(|s| r.status == s).unwrap_or(true))
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(runs, filter.limit, filter.offset))
    }

    async fn update_status(
        &self,
        id: Uuid,
        from: RunStatus,
        to: RunStatus,
        started_at: Option<DateTime<Utc>>,
        finished_at: Option<DateTime<Utc>>,
    ) -> PipeflowResult<bool> {
        let mut runs = self.runs.lock().unwrap();
        match runs.get_mut(&id) {
            Some(run) if run.status == from => {
                run.status = to;
                if started_at.is_some() {
                    run.started_at = started_at;
                }
                if finished_at.is_some() {
                    run.finished_at = finished_at;
                }
                run.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn add_artifact(&self, artifact: &RunArtifact) -> PipeflowResult<RunArtifact> {
        let mut artifacts = self.artifacts.lock().unwrap();
        if artifacts.iter().any(|a| a.name == artifact.name) {
            return Err(PipeflowError::conflict(format!(
                "artifact name '{}' already exists",
                artifact.name
            )));
        }
        let mut stored = artifact.clone();
        stored.id = self.allocate_id();
        artifacts.push(stored.clone());
        Ok(stored)
    }

    async fn add_param_value(&self, param: &RunParamValue) -> PipeflowResult<RunParamValue> {
        let mut params = self.params.lock().unwrap();
        if params
            .iter()
            .any(|p| p.pipeline_run_id == param.pipeline_run_id && p.name == param.name)
        {
            return Err(PipeflowError::conflict(format!(
                "param '{}' already exists for run {}",
                param.name, param.pipeline_run_id
            )));
        }
        let mut stored = param.clone();
        stored.id = self.allocate_id();
        params.push(stored.clone());
        Ok(stored)
    }

    async fn list_artifacts(&self, run_id: Uuid) -> PipeflowResult<Vec<RunArtifact>> {
        Ok(self
            .artifacts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.pipeline_run_id == run_id)
            .cloned()
            .collect())
    }

    async fn list_param_values(&self, run_id: Uuid) -> PipeflowResult<Vec<RunParamValue>> {
        Ok(self
            .params
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.pipeline_run_id == run_id)
            .cloned()
            .collect())
    }
}

#[derive(Clone, Default)]
pub struct MockTagRepository {
    tags: Arc<Mutex<HashMap<i64, Tag>>>,
    links: Arc<Mutex<Vec<TagLink>>>,
    next_id: Arc<Mutex<i64>>,
}

impl MockTagRepository {
    pub fn new() -> Self {
        Self {
            next_id: Arc::new(Mutex::new(1)),
            ..Self::default()
        }
    }

    pub fn insert(&self, tag: Tag) {
        self.tags.lock().unwrap().insert(tag.id, tag);
    }

    pub fn link_count(&self) -> usize {
        self.links.lock().unwrap().len()
    }

    fn allocate_id(&self) -> i64 {
        let mut next = self.next_id.lock().unwrap();
        let id = *next;
        *next += 1;
        id
    }
}

#[async_trait]
impl TagRepository for MockTagRepository {
    async fn create(&self, tag: &Tag) -> PipeflowResult<Tag> {
        let mut tags = self.tags.lock().unwrap();
        if tags.values().any(|t| t.name == tag.name) {
            return Err(PipeflowError::conflict(format!(
                "tag '{}' already exists",
                tag.name
            )));
        }
        let mut stored = tag.clone();
        stored.id = self.allocate_id();
        tags.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_by_id(&self, id: i64) -> PipeflowResult<Option<Tag>> {
        Ok(self.tags.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_name(&self, name: &str) -> PipeflowResult<Option<Tag>> {
        Ok(self
            .tags
            .lock()
            .unwrap()
            .values()
            .find(|t| t.name == name)
            .cloned())
    }

    async fn list(&self, limit: Option<i64>, offset: Option<i64>) -> PipeflowResult<Vec<Tag>> {
        let mut tags: Vec<Tag> = self.tags.lock().unwrap().values().cloned().collect();
        tags.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(page(tags, limit, offset))
    }

    async fn update(&self, id: i64, patch: &TagPatch) -> PipeflowResult<Tag> {
        let mut tags = self.tags.lock().unwrap();
        if let Some(name) = &patch.name {
            if tags.values().any(|t| t.name == *name && t.id != id) {
                return Err(PipeflowError::conflict(format!("tag '{name}' already exists")));
            }
        }
        let tag = tags
            .get_mut(&id)
            .ok_or_else(|| PipeflowError::tag_not_found(id))?;
        if let Some(name) = &patch.name {
            tag.name = name.clone();
        }
        if let Some(tag_type) = patch.tag_type {
            tag.tag_type = tag_type;
        }
        if let Some(description) = &patch.description {
            tag.description = Some(description.clone());
        }
        tag.updated_at = Utc::now();
        Ok(tag.clone())
    }

    async fn delete(&self, id: i64) -> PipeflowResult<()> {
        self.tags
            .lock()
            .unwrap()
            .remove(&id)
            .ok_or_else(|| PipeflowError::tag_not_found(id))?;
        self.links.lock().unwrap().retain(|l| l.tag_id != id);
        Ok(())
    }

    async fn link(&self, tag_id: i64, target: &EntityRef) -> PipeflowResult<TagLink> {
        let mut links = self.links.lock().unwrap();
        if links.iter().any(|l| {
            l.tag_id == tag_id
                && l.entity_type == target.entity_type()
                && l.entity_id == target.entity_id()
        }) {
            return Err(PipeflowError::conflict(format!(
                "tag {tag_id} is already linked to {target}"
            )));
        }
        let mut link = TagLink::new(tag_id, target);
        link.id = self.allocate_id();
        links.push(link.clone());
        Ok(link)
    }

    async fn unlink(&self, tag_id: i64, target: &EntityRef) -> PipeflowResult<bool> {
        let mut links = self.links.lock().unwrap();
        let before = links.len();
        links.retain(|l| {
            !(l.tag_id == tag_id
                && l.entity_type == target.entity_type()
                && l.entity_id == target.entity_id())
        });
        Ok(links.len() < before)
    }

    async fn list_tags_for(&self, target: &EntityRef) -> PipeflowResult<Vec<Tag>> {
        let links = self.links.lock().unwrap();
        let tags = self.tags.lock().unwrap();
        Ok(links
            .iter()
            .filter(|l| {
                l.entity_type == target.entity_type() && l.entity_id == target.entity_id()
            })
            .filter_map(|l| tags.get(&l.tag_id).cloned())
            .collect())
    }

    async fn list_links_for_tag(&self, tag_id: i64) -> PipeflowResult<Vec<TagLink>> {
        Ok(self
            .links
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.tag_id == tag_id)
            .cloned()
            .collect())
    }
}

fn page<T>(items: Vec<T>, limit: Option<i64>, offset: Option<i64>) -> Vec<T> {
    let offset = offset.unwrap_or(0).max(0) as usize;
    let limit = limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);
    items.into_iter().skip(offset).take(limit).collect()
}
