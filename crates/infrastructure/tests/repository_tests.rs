//! Repository contracts against a real (in-memory) SQLite database:
//! constraint-backed conflicts, the active-version backstop, the status
//! compare-and-swap and the ordered cascade.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use pipeflow_domain::entities::{EntityRef, RunStatus, TagType};
use pipeflow_domain::repositories::{
    PipelineRepository, RunRepository, TagRepository, UserRepository, VersionRepository,
};
use pipeflow_domain::value_objects::PipelinePatch;
use pipeflow_domain::{PipelineRun, RunParamValue};
use pipeflow_errors::PipeflowError;
use pipeflow_infrastructure::database::sqlite::{
    run_migrations, SqlitePipelineRepository, SqliteRunRepository, SqliteTagRepository,
    SqliteUserRepository, SqliteVersionRepository,
};
use pipeflow_testing_utils::{PipelineBuilder, RunBuilder, TagBuilder, UserBuilder, VersionBuilder};

async fn memory_pool() -> SqlitePool {
    // one connection: each in-memory SQLite connection is its own database
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

struct Repos {
    pool: SqlitePool,
    users: SqliteUserRepository,
    pipelines: SqlitePipelineRepository,
    versions: SqliteVersionRepository,
    runs: SqliteRunRepository,
    tags: SqliteTagRepository,
}

async fn repos() -> Repos {
    let pool = memory_pool().await;
    Repos {
        users: SqliteUserRepository::new(pool.clone()),
        pipelines: SqlitePipelineRepository::new(pool.clone()),
        versions: SqliteVersionRepository::new(pool.clone()),
        runs: SqliteRunRepository::new(pool.clone()),
        tags: SqliteTagRepository::new(pool.clone()),
        pool,
    }
}

async fn count(pool: &SqlitePool, table: &str) -> i64 {
    let sql = format!("SELECT COUNT(*) AS n FROM {table}");
    sqlx::query(&sql)
        .fetch_one(pool)
        .await
        .unwrap()
        .get::<i64, _>("n")
}

#[tokio::test]
async fn unique_code_violation_maps_to_conflict() {
    let r = repos().await;
    let owner = UserBuilder::new().build();
    r.users.create(&owner).await.unwrap();

    let first = PipelineBuilder::new().with_code("etl-1").build();
    r.pipelines.create(&first, owner.id).await.unwrap();

    // repository level has no pre-checks; the constraint itself answers
    let second = PipelineBuilder::new()
        .with_name("Other name")
        .with_code("etl-1")
        .build();
    let err = r.pipelines.create(&second, owner.id).await.unwrap_err();
    assert!(matches!(err, PipeflowError::Conflict(_)));
    assert_eq!(count(&r.pool, "pipelines").await, 1);
    // the failed transaction also rolled back its ownership insert
    assert_eq!(count(&r.pool, "pipeline_owners").await, 1);
}

#[tokio::test]
async fn partial_unique_index_is_the_activation_backstop() {
    let r = repos().await;
    let owner = UserBuilder::new().build();
    r.users.create(&owner).await.unwrap();
    let pipeline = PipelineBuilder::new().build();
    r.pipelines.create(&pipeline, owner.id).await.unwrap();

    let v1 = VersionBuilder::new(pipeline.id).with_label("v1").active().build();
    r.versions.create(&v1).await.unwrap();

    // a second active row forced past the repository logic loses at the
    // index, exactly like the second committer of a race would
    let forced = sqlx::query(
        "INSERT INTO pipeline_versions \
         (id, pipeline_id, version, schema, description, is_active, created_at, updated_at) \
         VALUES ($1, $2, 'v2', NULL, NULL, 1, $3, $3)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(pipeline.id.to_string())
    .bind(chrono::Utc::now())
    .execute(&r.pool)
    .await;
    assert!(forced.is_err());

    // the repository path swaps instead and keeps the invariant
    let v2 = VersionBuilder::new(pipeline.id).with_label("v2").active().build();
    r.versions.create(&v2).await.unwrap();
    let active = r.versions.get_active(pipeline.id).await.unwrap().unwrap();
    assert_eq!(active.id, v2.id);

    let n: i64 = sqlx::query(
        "SELECT COUNT(*) AS n FROM pipeline_versions WHERE pipeline_id = $1 AND is_active = 1",
    )
    .bind(pipeline.id.to_string())
    .fetch_one(&r.pool)
    .await
    .unwrap()
    .get("n");
    assert_eq!(n, 1);
}

#[tokio::test]
async fn status_update_is_a_guarded_swap() {
    let r = repos().await;
    let owner = UserBuilder::new().build();
    r.users.create(&owner).await.unwrap();
    let pipeline = PipelineBuilder::new().build();
    r.pipelines.create(&pipeline, owner.id).await.unwrap();
    let version = VersionBuilder::new(pipeline.id).active().build();
    r.versions.create(&version).await.unwrap();
    let run = RunBuilder::new(pipeline.id, version.id).build();
    r.runs.create(&run).await.unwrap();

    let now = chrono::Utc::now();
    // guard miss: the run is PENDING, not RUNNING
    let swapped = r
        .runs
        .update_status(run.id, RunStatus::Running, RunStatus::Success, None, Some(now))
        .await
        .unwrap();
    assert!(!swapped);
    let current = r.runs.get_by_id(run.id).await.unwrap().unwrap();
    assert_eq!(current.status, RunStatus::Pending);
    assert!(current.finished_at.is_none());

    // guard hit
    let swapped = r
        .runs
        .update_status(run.id, RunStatus::Pending, RunStatus::Running, Some(now), None)
        .await
        .unwrap();
    assert!(swapped);
    let current = r.runs.get_by_id(run.id).await.unwrap().unwrap();
    assert_eq!(current.status, RunStatus::Running);
    assert!(current.started_at.is_some());
}

#[tokio::test]
async fn partial_update_leaves_unset_fields_alone() {
    let r = repos().await;
    let owner = UserBuilder::new().build();
    r.users.create(&owner).await.unwrap();
    let pipeline = PipelineBuilder::new()
        .with_name("ETL One")
        .with_code("etl-1")
        .with_description("original")
        .build();
    r.pipelines.create(&pipeline, owner.id).await.unwrap();

    let patch = PipelinePatch {
        description: Some("patched".to_string()),
        ..Default::default()
    };
    let updated = r.pipelines.update(pipeline.id, &patch).await.unwrap();
    assert_eq!(updated.description.as_deref(), Some("patched"));
    assert_eq!(updated.name, "ETL One");
    assert_eq!(updated.code, "etl-1");
    assert!(updated.is_active);
    assert!(updated.updated_at >= pipeline.updated_at);
}

#[tokio::test]
async fn foreign_keys_reject_orphan_rows() {
    let r = repos().await;
    let run = RunBuilder::new(Uuid::new_v4(), Uuid::new_v4()).build();
    let err = r.runs.create(&run).await.unwrap_err();
    assert!(matches!(err, PipeflowError::Validation(_)));
}

#[tokio::test]
async fn cascade_delete_clears_aggregate_and_spares_users_and_tags() {
    let r = repos().await;
    let owner = UserBuilder::new().build();
    r.users.create(&owner).await.unwrap();
    let pipeline = PipelineBuilder::new().build();
    r.pipelines.create(&pipeline, owner.id).await.unwrap();
    let version = VersionBuilder::new(pipeline.id).active().build();
    r.versions.create(&version).await.unwrap();
    let run = RunBuilder::new(pipeline.id, version.id).with_user(owner.id).build();
    r.runs.create(&run).await.unwrap();
    r.runs
        .add_param_value(&RunParamValue::new(run.id, "threshold".into(), "0.8".into()))
        .await
        .unwrap();
    r.runs
        .add_artifact(&pipeflow_domain::RunArtifact::new(
            run.id,
            pipeflow_testing_utils::artifact_input("report", pipeflow_domain::ArtifactType::Text),
        ))
        .await
        .unwrap();

    let tag = r.tags.create(&TagBuilder::new().build()).await.unwrap();
    r.tags
        .link(tag.id, &EntityRef::Pipeline(pipeline.id))
        .await
        .unwrap();
    r.tags
        .link(tag.id, &EntityRef::PipelineRun(run.id))
        .await
        .unwrap();

    r.pipelines.delete(pipeline.id).await.unwrap();

    for table in [
        "pipelines",
        "pipeline_versions",
        "pipeline_runs",
        "run_artifacts",
        "run_param_values",
        "pipeline_owners",
        "tag_links",
    ] {
        assert_eq!(count(&r.pool, table).await, 0, "table {table} not empty");
    }
    assert_eq!(count(&r.pool, "users").await, 1);
    assert_eq!(count(&r.pool, "tags").await, 1);
}

#[tokio::test]
async fn delete_missing_pipeline_is_not_found() {
    let r = repos().await;
    let err = r.pipelines.delete(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, PipeflowError::PipelineNotFound { .. }));
}

#[tokio::test]
async fn owner_insert_is_idempotent_at_the_repository() {
    let r = repos().await;
    let owner = UserBuilder::new().build();
    r.users.create(&owner).await.unwrap();
    let pipeline = PipelineBuilder::new().build();
    r.pipelines.create(&pipeline, owner.id).await.unwrap();

    r.pipelines.add_owner(pipeline.id, owner.id).await.unwrap();
    r.pipelines.add_owner(pipeline.id, owner.id).await.unwrap();
    assert_eq!(count(&r.pool, "pipeline_owners").await, 1);
    assert!(r.pipelines.is_owner(pipeline.id, owner.id).await.unwrap());

    assert!(r.pipelines.remove_owner(pipeline.id, owner.id).await.unwrap());
    assert!(!r.pipelines.remove_owner(pipeline.id, owner.id).await.unwrap());
}

#[tokio::test]
async fn duplicate_tag_link_conflicts_at_the_constraint() {
    let r = repos().await;
    let tag = r
        .tags
        .create(&TagBuilder::new().with_type(TagType::System).build())
        .await
        .unwrap();
    assert!(tag.id > 0);

    let target = EntityRef::RunArtifact(7);
    r.tags.link(tag.id, &target).await.unwrap();
    let err = r.tags.link(tag.id, &target).await.unwrap_err();
    assert!(matches!(err, PipeflowError::Conflict(_)));

    let links = r.tags.list_links_for_tag(tag.id).await.unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].target().unwrap(), target);
}

#[tokio::test]
async fn json_schema_round_trips_through_text_storage() {
    let r = repos().await;
    let owner = UserBuilder::new().build();
    r.users.create(&owner).await.unwrap();
    let pipeline = PipelineBuilder::new().build();
    r.pipelines.create(&pipeline, owner.id).await.unwrap();

    let schema = serde_json::json!({"steps": ["extract", "load"], "retries": 3});
    let version = VersionBuilder::new(pipeline.id)
        .with_schema(schema.clone())
        .build();
    r.versions.create(&version).await.unwrap();

    let loaded = r.versions.get_by_id(version.id).await.unwrap().unwrap();
    assert_eq!(loaded.schema, Some(schema));
    assert_eq!(loaded.version, version.version);
}

#[tokio::test]
async fn run_create_resolves_and_persists_linkage() {
    let r = repos().await;
    let owner = UserBuilder::new().build();
    r.users.create(&owner).await.unwrap();
    let pipeline = PipelineBuilder::new().build();
    r.pipelines.create(&pipeline, owner.id).await.unwrap();
    let version = VersionBuilder::new(pipeline.id).active().build();
    r.versions.create(&version).await.unwrap();

    let run = PipelineRun::new(pipeline.id, version.id, Some(owner.id), Some("ext-1".into()));
    let created = r.runs.create(&run).await.unwrap();
    assert_eq!(created.pipeline_id, pipeline.id);
    assert_eq!(created.pipeline_version_id, version.id);
    assert_eq!(created.user_id, Some(owner.id));
    assert_eq!(created.executor_run_id.as_deref(), Some("ext-1"));
    assert_eq!(created.status, RunStatus::Pending);
}
