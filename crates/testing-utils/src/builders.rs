//! Test data builders with sensible defaults and easy customization.

use chrono::Utc;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use pipeflow_domain::entities::{
    ArtifactType, Pipeline, PipelineRun, PipelineVersion, RunStatus, Tag, TagType, User, UserRole,
};

pub struct PipelineBuilder {
    pipeline: Pipeline,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            pipeline: Pipeline {
                id: Uuid::new_v4(),
                name: "Test Pipeline".to_string(),
                code: "test-pipeline".to_string(),
                description: None,
                executor_type: "airflow".to_string(),
                external_id: None,
                is_active: true,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.pipeline.id = id;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.pipeline.name = name.to_string();
        self
    }

    pub fn with_code(mut self, code: &str) -> Self {
        self.pipeline.code = code.to_string();
        self
    }

    pub fn with_executor_type(mut self, executor_type: &str) -> Self {
        self.pipeline.executor_type = executor_type.to_string();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.pipeline.description = Some(description.to_string());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.pipeline.is_active = false;
        self
    }

    pub fn build(self) -> Pipeline {
        self.pipeline
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct VersionBuilder {
    version: PipelineVersion,
}

impl VersionBuilder {
    pub fn new(pipeline_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            version: PipelineVersion {
                id: Uuid::new_v4(),
                pipeline_id,
                version: "v1".to_string(),
                schema: None,
                description: None,
                is_active: false,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.version.id = id;
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.version.version = label.to_string();
        self
    }

    pub fn with_schema(mut self, schema: JsonValue) -> Self {
        self.version.schema = Some(schema);
        self
    }

    pub fn active(mut self) -> Self {
        self.version.is_active = true;
        self
    }

    pub fn build(self) -> PipelineVersion {
        self.version
    }
}

pub struct RunBuilder {
    run: PipelineRun,
}

impl RunBuilder {
    pub fn new(pipeline_id: Uuid, pipeline_version_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            run: PipelineRun {
                id: Uuid::new_v4(),
                pipeline_id,
                pipeline_version_id,
                user_id: None,
                status: RunStatus::Pending,
                executor_run_id: None,
                started_at: None,
                finished_at: None,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.run.id = id;
        self
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.run.user_id = Some(user_id);
        self
    }

    pub fn with_executor_run_id(mut self, executor_run_id: &str) -> Self {
        self.run.executor_run_id = Some(executor_run_id.to_string());
        self
    }

    pub fn with_status(mut self, status: RunStatus) -> Self {
        self.run.status = status;
        self
    }

    pub fn running(mut self) -> Self {
        self.run.status = RunStatus::Running;
        self.run.started_at = Some(Utc::now());
        self
    }

    pub fn build(self) -> PipelineRun {
        self.run
    }
}

pub struct UserBuilder {
    user: User,
}

impl UserBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            user: User {
                id: Uuid::new_v4(),
                email: "user@example.com".to_string(),
                password_hash: "$2b$12$test-hash".to_string(),
                is_active: true,
                role: UserRole::User,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.user.id = id;
        self
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.user.email = email.to_string();
        self
    }

    pub fn admin(mut self) -> Self {
        self.user.role = UserRole::Admin;
        self
    }

    pub fn deactivated(mut self) -> Self {
        self.user.is_active = false;
        self
    }

    pub fn build(self) -> User {
        self.user
    }
}

impl Default for UserBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct TagBuilder {
    tag: Tag,
}

impl TagBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            tag: Tag {
                id: 0,
                name: "test-tag".to_string(),
                tag_type: TagType::Metadata,
                description: None,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.tag.id = id;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.tag.name = name.to_string();
        self
    }

    pub fn with_type(mut self, tag_type: TagType) -> Self {
        self.tag.tag_type = tag_type;
        self
    }

    pub fn build(self) -> Tag {
        self.tag
    }
}

impl Default for TagBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Shortcut for artifact inputs in tests.
pub fn artifact_input(name: &str, artifact_type: ArtifactType) -> pipeflow_domain::NewArtifact {
    pipeflow_domain::NewArtifact {
        artifact_type,
        name: name.to_string(),
        schema: None,
    }
}
