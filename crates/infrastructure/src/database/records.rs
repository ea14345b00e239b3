//! [`Record`] instantiations: one per entity kind, plus the conversions
//! from domain patch structs into store [`PatchSet`]s.

use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use pipeflow_domain::entities::{
    Pipeline, PipelineRun, PipelineVersion, RunArtifact, RunParamValue, Tag, TagLink, User,
};
use pipeflow_domain::value_objects::{PipelinePatch, TagPatch, UserPatch, VersionPatch};
use pipeflow_errors::PipeflowResult;

use super::mapping::{sqlite_json, sqlite_opt_uuid, sqlite_uuid};
use super::store::{PatchSet, Record, SqlValue};

impl Record for Pipeline {
    const TABLE: &'static str = "pipelines";
    const ENTITY: &'static str = "pipeline";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "code",
        "description",
        "executor_type",
        "external_id",
        "is_active",
        "created_at",
        "updated_at",
    ];
    const INSERT_COLUMNS: &'static [&'static str] = Self::COLUMNS;

    fn insert_values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Uuid(self.id),
            SqlValue::Text(self.name.clone()),
            SqlValue::Text(self.code.clone()),
            SqlValue::OptText(self.description.clone()),
            SqlValue::Text(self.executor_type.clone()),
            SqlValue::OptText(self.external_id.clone()),
            SqlValue::Bool(self.is_active),
            SqlValue::Timestamp(self.created_at),
            SqlValue::Timestamp(self.updated_at),
        ]
    }

    fn from_sqlite_row(row: &SqliteRow) -> PipeflowResult<Self> {
        Ok(Self {
            id: sqlite_uuid(row, "id")?,
            name: row.try_get("name")?,
            code: row.try_get("code")?,
            description: row.try_get("description")?,
            executor_type: row.try_get("executor_type")?,
            external_id: row.try_get("external_id")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn from_pg_row(row: &PgRow) -> PipeflowResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            code: row.try_get("code")?,
            description: row.try_get("description")?,
            executor_type: row.try_get("executor_type")?,
            external_id: row.try_get("external_id")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl Record for PipelineVersion {
    const TABLE: &'static str = "pipeline_versions";
    const ENTITY: &'static str = "pipeline version";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "pipeline_id",
        "version",
        "schema",
        "description",
        "is_active",
        "created_at",
        "updated_at",
    ];
    const INSERT_COLUMNS: &'static [&'static str] = Self::COLUMNS;

    fn insert_values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Uuid(self.id),
            SqlValue::Uuid(self.pipeline_id),
            SqlValue::Text(self.version.clone()),
            SqlValue::Json(self.schema.clone()),
            SqlValue::OptText(self.description.clone()),
            SqlValue::Bool(self.is_active),
            SqlValue::Timestamp(self.created_at),
            SqlValue::Timestamp(self.updated_at),
        ]
    }

    fn from_sqlite_row(row: &SqliteRow) -> PipeflowResult<Self> {
        Ok(Self {
            id: sqlite_uuid(row, "id")?,
            pipeline_id: sqlite_uuid(row, "pipeline_id")?,
            version: row.try_get("version")?,
            schema: sqlite_json(row, "schema")?,
            description: row.try_get("description")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn from_pg_row(row: &PgRow) -> PipeflowResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            pipeline_id: row.try_get("pipeline_id")?,
            version: row.try_get("version")?,
            schema: row.try_get("schema")?,
            description: row.try_get("description")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl Record for PipelineRun {
    const TABLE: &'static str = "pipeline_runs";
    const ENTITY: &'static str = "pipeline run";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "pipeline_id",
        "pipeline_version_id",
        "user_id",
        "status",
        "executor_run_id",
        "started_at",
        "finished_at",
        "created_at",
        "updated_at",
    ];
    const INSERT_COLUMNS: &'static [&'static str] = Self::COLUMNS;

    fn insert_values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Uuid(self.id),
            SqlValue::Uuid(self.pipeline_id),
            SqlValue::Uuid(self.pipeline_version_id),
            SqlValue::OptUuid(self.user_id),
            SqlValue::Text(self.status.as_str().to_string()),
            SqlValue::OptText(self.executor_run_id.clone()),
            SqlValue::OptTimestamp(self.started_at),
            SqlValue::OptTimestamp(self.finished_at),
            SqlValue::Timestamp(self.created_at),
            SqlValue::Timestamp(self.updated_at),
        ]
    }

    fn from_sqlite_row(row: &SqliteRow) -> PipeflowResult<Self> {
        Ok(Self {
            id: sqlite_uuid(row, "id")?,
            pipeline_id: sqlite_uuid(row, "pipeline_id")?,
            pipeline_version_id: sqlite_uuid(row, "pipeline_version_id")?,
            user_id: sqlite_opt_uuid(row, "user_id")?,
            status: row.try_get("status")?,
            executor_run_id: row.try_get("executor_run_id")?,
            started_at: row.try_get("started_at")?,
            finished_at: row.try_get("finished_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn from_pg_row(row: &PgRow) -> PipeflowResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            pipeline_id: row.try_get("pipeline_id")?,
            pipeline_version_id: row.try_get("pipeline_version_id")?,
            user_id: row.try_get("user_id")?,
            status: row.try_get("status")?,
            executor_run_id: row.try_get("executor_run_id")?,
            started_at: row.try_get("started_at")?,
            finished_at: row.try_get("finished_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl Record for RunArtifact {
    const TABLE: &'static str = "run_artifacts";
    const ENTITY: &'static str = "run artifact";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "pipeline_run_id",
        "artifact_type",
        "name",
        "schema",
        "created_at",
        "updated_at",
    ];
    // id assigned by the database
    const INSERT_COLUMNS: &'static [&'static str] = &[
        "pipeline_run_id",
        "artifact_type",
        "name",
        "schema",
        "created_at",
        "updated_at",
    ];

    fn insert_values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Uuid(self.pipeline_run_id),
            SqlValue::Text(self.artifact_type.as_str().to_string()),
            SqlValue::Text(self.name.clone()),
            SqlValue::Json(self.schema.clone()),
            SqlValue::Timestamp(self.created_at),
            SqlValue::Timestamp(self.updated_at),
        ]
    }

    fn from_sqlite_row(row: &SqliteRow) -> PipeflowResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            pipeline_run_id: sqlite_uuid(row, "pipeline_run_id")?,
            artifact_type: row.try_get("artifact_type")?,
            name: row.try_get("name")?,
            schema: sqlite_json(row, "schema")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn from_pg_row(row: &PgRow) -> PipeflowResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            pipeline_run_id: row.try_get("pipeline_run_id")?,
            artifact_type: row.try_get("artifact_type")?,
            name: row.try_get("name")?,
            schema: row.try_get("schema")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl Record for RunParamValue {
    const TABLE: &'static str = "run_param_values";
    const ENTITY: &'static str = "run param value";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "pipeline_run_id",
        "name",
        "value",
        "created_at",
        "updated_at",
    ];
    // id assigned by the database
    const INSERT_COLUMNS: &'static [&'static str] = &[
        "pipeline_run_id",
        "name",
        "value",
        "created_at",
        "updated_at",
    ];

    fn insert_values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Uuid(self.pipeline_run_id),
            SqlValue::Text(self.name.clone()),
            SqlValue::Text(self.value.clone()),
            SqlValue::Timestamp(self.created_at),
            SqlValue::Timestamp(self.updated_at),
        ]
    }

    fn from_sqlite_row(row: &SqliteRow) -> PipeflowResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            pipeline_run_id: sqlite_uuid(row, "pipeline_run_id")?,
            name: row.try_get("name")?,
            value: row.try_get("value")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn from_pg_row(row: &PgRow) -> PipeflowResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            pipeline_run_id: row.try_get("pipeline_run_id")?,
            name: row.try_get("name")?,
            value: row.try_get("value")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl Record for User {
    const TABLE: &'static str = "users";
    const ENTITY: &'static str = "user";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "email",
        "password_hash",
        "is_active",
        "role",
        "created_at",
        "updated_at",
    ];
    const INSERT_COLUMNS: &'static [&'static str] = Self::COLUMNS;

    fn insert_values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Uuid(self.id),
            SqlValue::Text(self.email.clone()),
            SqlValue::Text(self.password_hash.clone()),
            SqlValue::Bool(self.is_active),
            SqlValue::Text(self.role.as_str().to_string()),
            SqlValue::Timestamp(self.created_at),
            SqlValue::Timestamp(self.updated_at),
        ]
    }

    fn from_sqlite_row(row: &SqliteRow) -> PipeflowResult<Self> {
        Ok(Self {
            id: sqlite_uuid(row, "id")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            is_active: row.try_get("is_active")?,
            role: row.try_get("role")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn from_pg_row(row: &PgRow) -> PipeflowResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            is_active: row.try_get("is_active")?,
            role: row.try_get("role")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl Record for Tag {
    const TABLE: &'static str = "tags";
    const ENTITY: &'static str = "tag";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "tag_type",
        "description",
        "created_at",
        "updated_at",
    ];
    // id assigned by the database
    const INSERT_COLUMNS: &'static [&'static str] =
        &["name", "tag_type", "description", "created_at", "updated_at"];

    fn insert_values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Text(self.name.clone()),
            SqlValue::Text(self.tag_type.as_str().to_string()),
            SqlValue::OptText(self.description.clone()),
            SqlValue::Timestamp(self.created_at),
            SqlValue::Timestamp(self.updated_at),
        ]
    }

    fn from_sqlite_row(row: &SqliteRow) -> PipeflowResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            tag_type: row.try_get("tag_type")?,
            description: row.try_get("description")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn from_pg_row(row: &PgRow) -> PipeflowResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            tag_type: row.try_get("tag_type")?,
            description: row.try_get("description")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl Record for TagLink {
    const TABLE: &'static str = "tag_links";
    const ENTITY: &'static str = "tag link";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "tag_id",
        "entity_type",
        "entity_id",
        "created_at",
        "updated_at",
    ];
    // id assigned by the database
    const INSERT_COLUMNS: &'static [&'static str] = &[
        "tag_id",
        "entity_type",
        "entity_id",
        "created_at",
        "updated_at",
    ];

    fn insert_values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::BigInt(self.tag_id),
            SqlValue::Text(self.entity_type.clone()),
            SqlValue::Text(self.entity_id.clone()),
            SqlValue::Timestamp(self.created_at),
            SqlValue::Timestamp(self.updated_at),
        ]
    }

    fn from_sqlite_row(row: &SqliteRow) -> PipeflowResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            tag_id: row.try_get("tag_id")?,
            entity_type: row.try_get("entity_type")?,
            entity_id: row.try_get("entity_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn from_pg_row(row: &PgRow) -> PipeflowResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            tag_id: row.try_get("tag_id")?,
            entity_type: row.try_get("entity_type")?,
            entity_id: row.try_get("entity_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

pub(crate) fn pipeline_patch_set(patch: &PipelinePatch) -> PatchSet {
    let mut set = PatchSet::new();
    if let Some(name) = &patch.name {
        set.set("name", SqlValue::Text(name.clone()));
    }
    if let Some(code) = &patch.code {
        set.set("code", SqlValue::Text(code.clone()));
    }
    if let Some(description) = &patch.description {
        set.set("description", SqlValue::OptText(Some(description.clone())));
    }
    if let Some(executor_type) = &patch.executor_type {
        set.set("executor_type", SqlValue::Text(executor_type.clone()));
    }
    if let Some(external_id) = &patch.external_id {
        set.set("external_id", SqlValue::OptText(Some(external_id.clone())));
    }
    if let Some(is_active) = patch.is_active {
        set.set("is_active", SqlValue::Bool(is_active));
    }
    set
}

pub(crate) fn version_patch_set(patch: &VersionPatch) -> PatchSet {
    let mut set = PatchSet::new();
    if let Some(version) = &patch.version {
        set.set("version", SqlValue::Text(version.clone()));
    }
    if let Some(schema) = &patch.schema {
        set.set("schema", SqlValue::Json(Some(schema.clone())));
    }
    if let Some(description) = &patch.description {
        set.set("description", SqlValue::OptText(Some(description.clone())));
    }
    if let Some(is_active) = patch.is_active {
        set.set("is_active", SqlValue::Bool(is_active));
    }
    set
}

pub(crate) fn user_patch_set(patch: &UserPatch) -> PatchSet {
    let mut set = PatchSet::new();
    if let Some(email) = &patch.email {
        set.set("email", SqlValue::Text(email.clone()));
    }
    if let Some(password_hash) = &patch.password_hash {
        set.set("password_hash", SqlValue::Text(password_hash.clone()));
    }
    if let Some(role) = patch.role {
        set.set("role", SqlValue::Text(role.as_str().to_string()));
    }
    if let Some(is_active) = patch.is_active {
        set.set("is_active", SqlValue::Bool(is_active));
    }
    set
}

pub(crate) fn tag_patch_set(patch: &TagPatch) -> PatchSet {
    let mut set = PatchSet::new();
    if let Some(name) = &patch.name {
        set.set("name", SqlValue::Text(name.clone()));
    }
    if let Some(tag_type) = patch.tag_type {
        set.set("tag_type", SqlValue::Text(tag_type.as_str().to_string()));
    }
    if let Some(description) = &patch.description {
        set.set("description", SqlValue::OptText(Some(description.clone())));
    }
    set
}
