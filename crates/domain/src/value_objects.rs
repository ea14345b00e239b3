//! Input payloads, partial-update patches and list filters.
//!
//! Patch structs carry only the fields the caller explicitly set; `None`
//! means "leave untouched", never "set to null".

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::entities::{ArtifactType, RunStatus, TagType, UserRole};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPipeline {
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub executor_type: String,
    pub external_id: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelinePatch {
    pub name: Option<String>,
    pub code: Option<String>,
    pub description: Option<String>,
    pub executor_type: Option<String>,
    pub external_id: Option<String>,
    pub is_active: Option<bool>,
}

impl PipelinePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.code.is_none()
            && self.description.is_none()
            && self.executor_type.is_none()
            && self.external_id.is_none()
            && self.is_active.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineFilter {
    pub owner_id: Option<Uuid>,
    pub is_active: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVersion {
    pub pipeline_id: Uuid,
    pub version: String,
    pub schema: Option<JsonValue>,
    pub description: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionPatch {
    pub version: Option<String>,
    pub schema: Option<JsonValue>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

impl VersionPatch {
    pub fn is_empty(&self) -> bool {
        self.version.is_none()
            && self.schema.is_none()
            && self.description.is_none()
            && self.is_active.is_none()
    }
    pub fn activates(&self) -> bool {
        self.is_active == Some(true)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRun {
    pub pipeline_version_id: Uuid,
    pub executor_run_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RunFilter {
    pub pipeline_id: Option<Uuid>,
    pub pipeline_version_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub status: Option<RunStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewArtifact {
    pub artifact_type: ArtifactType,
    pub name: String,
    pub schema: Option<JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserPatch {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.password_hash.is_none()
            && self.role.is_none()
            && self.is_active.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTag {
    pub name: String,
    pub tag_type: TagType,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagPatch {
    pub name: Option<String>,
    pub tag_type: Option<TagType>,
    pub description: Option<String>,
}

impl TagPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.tag_type.is_none() && self.description.is_none()
    }
}
