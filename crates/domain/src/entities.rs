use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use pipeflow_errors::{PipeflowError, PipeflowResult};

use crate::value_objects::{NewArtifact, NewPipeline, NewTag, NewUser, NewVersion};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub executor_type: String, // "airflow", "spark", etc.
    pub external_id: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pipeline {
    pub fn new(input: NewPipeline) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: input.name,
            code: input.code,
            description: input.description,
            executor_type: input.executor_type,
            external_id: input.external_id,
            is_active: input.is_active,
            created_at: now,
            updated_at: now,
        }
    }
    pub fn entity_description(&self) -> String {
        format!("pipeline '{}' (code: {}, id: {})", self.name, self.code, self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineVersion {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    pub version: String, // label, not unique across the pipeline
    pub schema: Option<JsonValue>,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PipelineVersion {
    pub fn new(input: NewVersion) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            pipeline_id: input.pipeline_id,
            version: input.version,
            schema: input.schema,
            description: input.description,
            is_active: input.is_active,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    pub pipeline_version_id: Uuid,
    pub user_id: Option<Uuid>, // initiating actor, nulled if the user is deleted
    pub status: RunStatus,
    pub executor_run_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PipelineRun {
    pub fn new(
        pipeline_id: Uuid,
        pipeline_version_id: Uuid,
        user_id: Option<Uuid>,
        executor_run_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            pipeline_id,
            pipeline_version_id,
            user_id,
            status: RunStatus::Pending,
            executor_run_id,
            started_at: None,
            finished_at: None,
            created_at: now,
            updated_at: now,
        }
    }
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
    pub fn is_successful(&self) -> bool {
        matches!(self.status, RunStatus::Success)
    }
    pub fn execution_duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(started), Some(finished)) => Some((finished - started).num_milliseconds()),
            _ => None,
        }
    }
    pub fn entity_description(&self) -> String {
        format!(
            "pipeline run (id: {}, pipeline: {}, status: {})",
            self.id, self.pipeline_id, self.status
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RunStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAILED")]
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "PENDING",
            RunStatus::Running => "RUNNING",
            RunStatus::Success => "SUCCESS",
            RunStatus::Failed => "FAILED",
        }
    }
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::Failed)
    }

    /// The only legal edges: PENDING -> RUNNING -> {SUCCESS | FAILED}.
    pub fn can_transition_to(&self, target: RunStatus) -> bool {
        matches!(
            (self, target),
            (RunStatus::Pending, RunStatus::Running)
                | (RunStatus::Running, RunStatus::Success)
                | (RunStatus::Running, RunStatus::Failed)
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(RunStatus::Pending),
            "RUNNING" => Ok(RunStatus::Running),
            "SUCCESS" => Ok(RunStatus::Success),
            "FAILED" => Ok(RunStatus::Failed),
            _ => Err(format!("Invalid run status: {s}")),
        }
    }
}

impl sqlx::Type<sqlx::Postgres> for RunStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl sqlx::Type<sqlx::Sqlite> for RunStatus {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for RunStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for RunStatus {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for RunStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for RunStatus {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode(self.as_str(), buf)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunArtifact {
    pub id: i64,
    pub pipeline_run_id: Uuid,
    pub artifact_type: ArtifactType,
    pub name: String,
    pub schema: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RunArtifact {
    pub fn new(pipeline_run_id: Uuid, input: NewArtifact) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // assigned by the database
            pipeline_run_id,
            artifact_type: input.artifact_type,
            name: input.name,
            schema: input.schema,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ArtifactType {
    #[serde(rename = "FILE")]
    File,
    #[serde(rename = "LINK")]
    Link,
    #[serde(rename = "TEXT")]
    Text,
    #[serde(rename = "JSON")]
    Json,
}

impl ArtifactType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactType::File => "FILE",
            ArtifactType::Link => "LINK",
            ArtifactType::Text => "TEXT",
            ArtifactType::Json => "JSON",
        }
    }
}

impl std::fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ArtifactType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FILE" => Ok(ArtifactType::File),
            "LINK" => Ok(ArtifactType::Link),
            "TEXT" => Ok(ArtifactType::Text),
            "JSON" => Ok(ArtifactType::Json),
            _ => Err(format!("Invalid artifact type: {s}")),
        }
    }
}

impl sqlx::Type<sqlx::Postgres> for ArtifactType {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl sqlx::Type<sqlx::Sqlite> for ArtifactType {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ArtifactType {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for ArtifactType {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for ArtifactType {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for ArtifactType {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode(self.as_str(), buf)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunParamValue {
    pub id: i64,
    pub pipeline_run_id: Uuid,
    pub name: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RunParamValue {
    pub fn new(pipeline_run_id: Uuid, name: String, value: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // assigned by the database
            pipeline_run_id,
            name,
            value,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String, // opaque: hashing lives in the auth layer
    pub is_active: bool,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(input: NewUser) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: input.email,
            password_hash: input.password_hash,
            is_active: input.is_active,
            role: input.role,
            created_at: now,
            updated_at: now,
        }
    }
    pub fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum UserRole {
    #[serde(rename = "ADMIN")]
    Admin,
    #[serde(rename = "USER")]
    User,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "ADMIN",
            UserRole::User => "USER",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(UserRole::Admin),
            "USER" => Ok(UserRole::User),
            _ => Err(format!("Invalid user role: {s}")),
        }
    }
}

impl sqlx::Type<sqlx::Postgres> for UserRole {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl sqlx::Type<sqlx::Sqlite> for UserRole {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for UserRole {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for UserRole {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for UserRole {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for UserRole {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode(self.as_str(), buf)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub tag_type: TagType,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tag {
    pub fn new(input: NewTag) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // assigned by the database
            name: input.name,
            tag_type: input.tag_type,
            description: input.description,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Tag categories, stored lowercase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TagType {
    #[serde(rename = "data")]
    Data,
    #[serde(rename = "metadata")]
    Metadata,
    #[serde(rename = "system")]
    System,
    #[serde(rename = "pipeline")]
    Pipeline,
    #[serde(rename = "pipeline_version")]
    PipelineVersion,
    #[serde(rename = "pipeline_run")]
    PipelineRun,
    #[serde(rename = "pipeline_run_artifact")]
    PipelineRunArtifact,
}

impl TagType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagType::Data => "data",
            TagType::Metadata => "metadata",
            TagType::System => "system",
            TagType::Pipeline => "pipeline",
            TagType::PipelineVersion => "pipeline_version",
            TagType::PipelineRun => "pipeline_run",
            TagType::PipelineRunArtifact => "pipeline_run_artifact",
        }
    }
}

impl std::fmt::Display for TagType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TagType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "data" => Ok(TagType::Data),
            "metadata" => Ok(TagType::Metadata),
            "system" => Ok(TagType::System),
            "pipeline" => Ok(TagType::Pipeline),
            "pipeline_version" => Ok(TagType::PipelineVersion),
            "pipeline_run" => Ok(TagType::PipelineRun),
            "pipeline_run_artifact" => Ok(TagType::PipelineRunArtifact),
            _ => Err(format!("Invalid tag type: {s}")),
        }
    }
}

impl sqlx::Type<sqlx::Postgres> for TagType {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl sqlx::Type<sqlx::Sqlite> for TagType {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for TagType {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for TagType {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for TagType {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for TagType {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode(self.as_str(), buf)
    }
}

/// Typed reference to a taggable entity. The variant carries the identifier
/// type of its kind, so unknown entity kinds are unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "entity_type", content = "entity_id")]
pub enum EntityRef {
    #[serde(rename = "pipeline")]
    Pipeline(Uuid),
    #[serde(rename = "pipeline_version")]
    PipelineVersion(Uuid),
    #[serde(rename = "pipeline_run")]
    PipelineRun(Uuid),
    #[serde(rename = "pipeline_run_artifact")]
    RunArtifact(i64),
    #[serde(rename = "user")]
    User(Uuid),
}

impl EntityRef {
    pub fn entity_type(&self) -> &'static str {
        match self {
            EntityRef::Pipeline(_) => "pipeline",
            EntityRef::PipelineVersion(_) => "pipeline_version",
            EntityRef::PipelineRun(_) => "pipeline_run",
            EntityRef::RunArtifact(_) => "pipeline_run_artifact",
            EntityRef::User(_) => "user",
        }
    }

    /// Storage form of the identifier (UUIDs hyphenated, artifact ids decimal).
    pub fn entity_id(&self) -> String {
        match self {
            EntityRef::Pipeline(id)
            | EntityRef::PipelineVersion(id)
            | EntityRef::PipelineRun(id)
            | EntityRef::User(id) => id.to_string(),
            EntityRef::RunArtifact(id) => id.to_string(),
        }
    }

    /// Rebuild a reference from its stored `(entity_type, entity_id)` pair.
    /// Unknown kinds and malformed identifiers are rejected here, at the
    /// boundary, not at storage time.
    pub fn parse(entity_type: &str, entity_id: &str) -> PipeflowResult<Self> {
        let bad_id = || {
            PipeflowError::validation_error(format!(
                "invalid entity id '{entity_id}' for entity type '{entity_type}'"
            ))
        };
        match entity_type {
            "pipeline" => Ok(EntityRef::Pipeline(
                Uuid::parse_str(entity_id).map_err(|_| bad_id())?,
            )),
            "pipeline_version" => Ok(EntityRef::PipelineVersion(
                Uuid::parse_str(entity_id).map_err(|_| bad_id())?,
            )),
            "pipeline_run" => Ok(EntityRef::PipelineRun(
                Uuid::parse_str(entity_id).map_err(|_| bad_id())?,
            )),
            "pipeline_run_artifact" => Ok(EntityRef::RunArtifact(
                entity_id.parse().map_err(|_| bad_id())?,
            )),
            "user" => Ok(EntityRef::User(
                Uuid::parse_str(entity_id).map_err(|_| bad_id())?,
            )),
            other => Err(PipeflowError::validation_error(format!(
                "unknown entity type: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.entity_type(), self.entity_id())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagLink {
    pub id: i64,
    pub tag_id: i64,
    pub entity_type: String,
    pub entity_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TagLink {
    pub fn new(tag_id: i64, target: &EntityRef) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // assigned by the database
            tag_id,
            entity_type: target.entity_type().to_string(),
            entity_id: target.entity_id(),
            created_at: now,
            updated_at: now,
        }
    }
    pub fn target(&self) -> PipeflowResult<EntityRef> {
        EntityRef::parse(&self.entity_type, &self.entity_id)
    }
}
