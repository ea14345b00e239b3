//! End-to-end lifecycle tests over the embedded application and an
//! in-memory SQLite database.

use uuid::Uuid;

use pipeflow::domain::entities::{ArtifactType, EntityRef, RunStatus, TagType, UserRole};
use pipeflow::domain::value_objects::{
    NewArtifact, NewPipeline, NewRun, NewTag, NewUser, NewVersion, PipelineFilter, RunFilter,
    VersionPatch,
};
use pipeflow::{App, AppConfig, PipeflowError};

async fn test_app() -> (App, Uuid) {
    let mut config = AppConfig::default();
    config.database.url = "sqlite::memory:".to_string();
    config.bootstrap.admin_email = Some("admin@example.com".to_string());
    config.bootstrap.admin_password_hash = Some("$2b$12$seed-hash".to_string());

    let app = App::new(config).await.expect("app should start");
    let admin = app
        .users
        .get_user_by_email("admin@example.com")
        .await
        .unwrap()
        .expect("bootstrap admin should exist");
    (app, admin.id)
}

async fn seed_user(app: &App, admin: Uuid, email: &str) -> Uuid {
    app.users
        .create_user(
            admin,
            NewUser {
                email: email.to_string(),
                password_hash: "$2b$12$user-hash".to_string(),
                role: UserRole::User,
                is_active: true,
            },
        )
        .await
        .unwrap()
        .id
}

fn etl_pipeline(code: &str, name: &str) -> NewPipeline {
    NewPipeline {
        name: name.to_string(),
        code: code.to_string(),
        description: Some("extract, transform, load".to_string()),
        executor_type: "airflow".to_string(),
        external_id: None,
        is_active: true,
    }
}

fn version_input(pipeline_id: Uuid, label: &str, active: bool) -> NewVersion {
    NewVersion {
        pipeline_id,
        version: label.to_string(),
        schema: Some(serde_json::json!({"steps": [label]})),
        description: None,
        is_active: active,
    }
}

#[tokio::test]
async fn activating_v2_demotes_v1_atomically() {
    let (app, admin) = test_app().await;
    let owner = seed_user(&app, admin, "owner@example.com").await;

    let pipeline = app
        .pipelines
        .create_pipeline(owner, etl_pipeline("etl-1", "ETL One"))
        .await
        .unwrap();

    let v1 = app
        .versions
        .create_version(owner, version_input(pipeline.id, "v1", true))
        .await
        .unwrap();
    assert!(v1.is_active);
    assert_eq!(
        app.versions.get_active_version(pipeline.id).await.unwrap().id,
        v1.id
    );

    let v2 = app
        .versions
        .create_version(owner, version_input(pipeline.id, "v2", true))
        .await
        .unwrap();

    let active = app.versions.get_active_version(pipeline.id).await.unwrap();
    assert_eq!(active.id, v2.id);
    let v1_now = app.versions.get_version(v1.id).await.unwrap();
    assert!(!v1_now.is_active);

    // invariant: exactly one active version among all committed rows
    let all = app.versions.list_versions(pipeline.id).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all.iter().filter(|v| v.is_active).count(), 1);
}

#[tokio::test]
async fn patch_activation_swaps_and_inactive_create_keeps_current() {
    let (app, admin) = test_app().await;
    let owner = seed_user(&app, admin, "owner@example.com").await;
    let pipeline = app
        .pipelines
        .create_pipeline(owner, etl_pipeline("etl-1", "ETL One"))
        .await
        .unwrap();

    let v1 = app
        .versions
        .create_version(owner, version_input(pipeline.id, "v1", true))
        .await
        .unwrap();
    let v2 = app
        .versions
        .create_version(owner, version_input(pipeline.id, "v2", false))
        .await
        .unwrap();

    // inactive insert leaves v1 in place
    assert_eq!(
        app.versions.get_active_version(pipeline.id).await.unwrap().id,
        v1.id
    );

    let patch = VersionPatch {
        is_active: Some(true),
        ..Default::default()
    };
    app.versions.update_version(owner, v2.id, &patch).await.unwrap();

    assert_eq!(
        app.versions.get_active_version(pipeline.id).await.unwrap().id,
        v2.id
    );
    assert!(!app.versions.get_version(v1.id).await.unwrap().is_active);

    let all = app.versions.list_versions(pipeline.id).await.unwrap();
    assert_eq!(all.iter().filter(|v| v.is_active).count(), 1);
}

#[tokio::test]
async fn no_active_version_reads_as_not_found() {
    let (app, admin) = test_app().await;
    let owner = seed_user(&app, admin, "owner@example.com").await;
    let pipeline = app
        .pipelines
        .create_pipeline(owner, etl_pipeline("etl-1", "ETL One"))
        .await
        .unwrap();
    app.versions
        .create_version(owner, version_input(pipeline.id, "v1", false))
        .await
        .unwrap();

    let err = app.versions.get_active_version(pipeline.id).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn run_lifecycle_happy_path_and_terminal_guard() {
    let (app, admin) = test_app().await;
    let owner = seed_user(&app, admin, "owner@example.com").await;
    let pipeline = app
        .pipelines
        .create_pipeline(owner, etl_pipeline("etl-1", "ETL One"))
        .await
        .unwrap();
    let version = app
        .versions
        .create_version(owner, version_input(pipeline.id, "v1", true))
        .await
        .unwrap();

    let run = app
        .runs
        .create_run(
            owner,
            NewRun {
                pipeline_version_id: version.id,
                executor_run_id: Some("ext-42".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Pending);
    assert_eq!(run.pipeline_id, pipeline.id);
    assert!(run.started_at.is_none());

    let run = app
        .runs
        .transition_run(owner, run.id, RunStatus::Running)
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Running);
    assert!(run.started_at.is_some());
    assert!(run.finished_at.is_none());

    let run = app
        .runs
        .transition_run(owner, run.id, RunStatus::Success)
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Success);
    assert!(run.finished_at.is_some());

    // terminal states are final
    let err = app
        .runs
        .transition_run(owner, run.id, RunStatus::Running)
        .await
        .unwrap_err();
    assert!(matches!(err, PipeflowError::InvalidStatusTransition { .. }));
    let unchanged = app.runs.get_run(run.id).await.unwrap();
    assert_eq!(unchanged.status, RunStatus::Success);
    assert_eq!(unchanged.finished_at, run.finished_at);
}

#[tokio::test]
async fn pending_cannot_jump_to_terminal() {
    let (app, admin) = test_app().await;
    let owner = seed_user(&app, admin, "owner@example.com").await;
    let pipeline = app
        .pipelines
        .create_pipeline(owner, etl_pipeline("etl-1", "ETL One"))
        .await
        .unwrap();
    let version = app
        .versions
        .create_version(owner, version_input(pipeline.id, "v1", true))
        .await
        .unwrap();
    let run = app
        .runs
        .create_run(
            owner,
            NewRun {
                pipeline_version_id: version.id,
                executor_run_id: None,
            },
        )
        .await
        .unwrap();

    for target in [RunStatus::Success, RunStatus::Failed] {
        let err = app
            .runs
            .transition_run(owner, run.id, target)
            .await
            .unwrap_err();
        assert!(matches!(err, PipeflowError::InvalidStatusTransition { .. }));
    }
    let unchanged = app.runs.get_run(run.id).await.unwrap();
    assert_eq!(unchanged.status, RunStatus::Pending);
    assert!(unchanged.started_at.is_none());
}

#[tokio::test]
async fn duplicate_pipeline_code_conflicts() {
    let (app, admin) = test_app().await;
    let owner = seed_user(&app, admin, "owner@example.com").await;

    app.pipelines
        .create_pipeline(owner, etl_pipeline("etl-1", "ETL One"))
        .await
        .unwrap();
    let err = app
        .pipelines
        .create_pipeline(owner, etl_pipeline("etl-1", "ETL Two"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipeflowError::Conflict(_)));
}

#[tokio::test]
async fn duplicate_param_name_conflicts() {
    let (app, admin) = test_app().await;
    let owner = seed_user(&app, admin, "owner@example.com").await;
    let pipeline = app
        .pipelines
        .create_pipeline(owner, etl_pipeline("etl-1", "ETL One"))
        .await
        .unwrap();
    let version = app
        .versions
        .create_version(owner, version_input(pipeline.id, "v1", true))
        .await
        .unwrap();
    let run = app
        .runs
        .create_run(
            owner,
            NewRun {
                pipeline_version_id: version.id,
                executor_run_id: None,
            },
        )
        .await
        .unwrap();

    app.runs
        .attach_param_value(owner, run.id, "threshold".to_string(), "0.8".to_string())
        .await
        .unwrap();
    let err = app
        .runs
        .attach_param_value(owner, run.id, "threshold".to_string(), "0.9".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, PipeflowError::Conflict(_)));

    let params = app.runs.list_param_values(run.id).await.unwrap();
    assert_eq!(params.len(), 1);
    assert_eq!(params[0].value, "0.8");
}

#[tokio::test]
async fn artifacts_attach_after_finish_and_conflict_on_name() {
    let (app, admin) = test_app().await;
    let owner = seed_user(&app, admin, "owner@example.com").await;
    let pipeline = app
        .pipelines
        .create_pipeline(owner, etl_pipeline("etl-1", "ETL One"))
        .await
        .unwrap();
    let version = app
        .versions
        .create_version(owner, version_input(pipeline.id, "v1", true))
        .await
        .unwrap();
    let run = app
        .runs
        .create_run(
            owner,
            NewRun {
                pipeline_version_id: version.id,
                executor_run_id: None,
            },
        )
        .await
        .unwrap();
    app.runs
        .transition_run(owner, run.id, RunStatus::Running)
        .await
        .unwrap();
    app.runs
        .transition_run(owner, run.id, RunStatus::Failed)
        .await
        .unwrap();

    // late telemetry on a failed run is allowed
    let artifact = app
        .runs
        .attach_artifact(
            owner,
            run.id,
            NewArtifact {
                artifact_type: ArtifactType::Json,
                name: "metrics.json".to_string(),
                schema: Some(serde_json::json!({"rows": 10})),
            },
        )
        .await
        .unwrap();
    assert!(artifact.id > 0);

    let err = app
        .runs
        .attach_artifact(
            owner,
            run.id,
            NewArtifact {
                artifact_type: ArtifactType::Text,
                name: "metrics.json".to_string(),
                schema: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PipeflowError::Conflict(_)));
}

#[tokio::test]
async fn ownership_is_idempotent_and_survives_listing() {
    let (app, admin) = test_app().await;
    let alice = seed_user(&app, admin, "alice@example.com").await;
    let bob = seed_user(&app, admin, "bob@example.com").await;

    let pipeline = app
        .pipelines
        .create_pipeline(alice, etl_pipeline("etl-1", "ETL One"))
        .await
        .unwrap();

    app.pipelines.add_owner(alice, pipeline.id, bob).await.unwrap();
    app.pipelines.add_owner(alice, pipeline.id, bob).await.unwrap();

    let owners = app.pipelines.list_owners(pipeline.id).await.unwrap();
    assert_eq!(owners.len(), 2);

    // bob can now mutate, and listing by owner sees the pipeline
    let filter = PipelineFilter {
        owner_id: Some(bob),
        ..Default::default()
    };
    let pipelines = app.pipelines.list_pipelines(&filter).await.unwrap();
    assert_eq!(pipelines.len(), 1);

    let removed = app
        .pipelines
        .remove_owner(alice, pipeline.id, bob)
        .await
        .unwrap();
    assert!(removed);
    let owners = app.pipelines.list_owners(pipeline.id).await.unwrap();
    assert_eq!(owners.len(), 1);
}

#[tokio::test]
async fn cascade_delete_preserves_users_and_tags() {
    let (app, admin) = test_app().await;
    let owner = seed_user(&app, admin, "owner@example.com").await;
    let pipeline = app
        .pipelines
        .create_pipeline(owner, etl_pipeline("etl-1", "ETL One"))
        .await
        .unwrap();
    let version = app
        .versions
        .create_version(owner, version_input(pipeline.id, "v1", true))
        .await
        .unwrap();
    let run = app
        .runs
        .create_run(
            owner,
            NewRun {
                pipeline_version_id: version.id,
                executor_run_id: None,
            },
        )
        .await
        .unwrap();
    app.runs
        .attach_param_value(owner, run.id, "threshold".to_string(), "0.8".to_string())
        .await
        .unwrap();
    app.runs
        .attach_artifact(
            owner,
            run.id,
            NewArtifact {
                artifact_type: ArtifactType::Link,
                name: "dashboard".to_string(),
                schema: None,
            },
        )
        .await
        .unwrap();

    let tag = app
        .tags
        .create_tag(
            owner,
            NewTag {
                name: "nightly".to_string(),
                tag_type: TagType::Pipeline,
                description: None,
            },
        )
        .await
        .unwrap();
    app.tags
        .tag_entity(owner, tag.id, &EntityRef::Pipeline(pipeline.id))
        .await
        .unwrap();
    app.tags
        .tag_entity(owner, tag.id, &EntityRef::PipelineRun(run.id))
        .await
        .unwrap();

    app.pipelines.delete_pipeline(owner, pipeline.id).await.unwrap();

    // the whole aggregate is gone
    assert!(app
        .pipelines
        .get_pipeline(pipeline.id)
        .await
        .unwrap_err()
        .is_not_found());
    assert!(app
        .versions
        .get_version(version.id)
        .await
        .unwrap_err()
        .is_not_found());
    assert!(app.runs.get_run(run.id).await.unwrap_err().is_not_found());

    // users and tags survive; only the links to the aggregate were removed
    assert!(app.users.get_user(owner).await.is_ok());
    assert!(app.tags.get_tag(tag.id).await.is_ok());
    assert!(app.tags.list_entities_for(tag.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn deleting_a_user_keeps_pipelines_and_clears_run_initiator() {
    let (app, admin) = test_app().await;
    let alice = seed_user(&app, admin, "alice@example.com").await;
    let bob = seed_user(&app, admin, "bob@example.com").await;

    let pipeline = app
        .pipelines
        .create_pipeline(alice, etl_pipeline("etl-1", "ETL One"))
        .await
        .unwrap();
    app.pipelines.add_owner(alice, pipeline.id, bob).await.unwrap();
    let version = app
        .versions
        .create_version(alice, version_input(pipeline.id, "v1", true))
        .await
        .unwrap();
    let run = app
        .runs
        .create_run(
            alice,
            NewRun {
                pipeline_version_id: version.id,
                executor_run_id: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(run.user_id, Some(alice));

    app.users.delete_user(admin, alice).await.unwrap();

    // the pipeline still exists with bob as the remaining owner, and the
    // run lost only its initiator
    let owners = app.pipelines.list_owners(pipeline.id).await.unwrap();
    assert_eq!(owners.len(), 1);
    assert_eq!(owners[0].id, bob);
    let run = app.runs.get_run(run.id).await.unwrap();
    assert_eq!(run.user_id, None);
}

#[tokio::test]
async fn tag_projections_work_both_ways() {
    let (app, admin) = test_app().await;
    let owner = seed_user(&app, admin, "owner@example.com").await;
    let pipeline = app
        .pipelines
        .create_pipeline(owner, etl_pipeline("etl-1", "ETL One"))
        .await
        .unwrap();

    let tag = app
        .tags
        .create_tag(
            owner,
            NewTag {
                name: "critical".to_string(),
                tag_type: TagType::System,
                description: Some("page on failure".to_string()),
            },
        )
        .await
        .unwrap();

    let target = EntityRef::Pipeline(pipeline.id);
    app.tags.tag_entity(owner, tag.id, &target).await.unwrap();

    let tags = app.tags.list_tags_for(&target).await.unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].name, "critical");

    let links = app.tags.list_entities_for(tag.id).await.unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].target().unwrap(), target);

    // duplicate link is a conflict, then untag clears the projection
    assert!(matches!(
        app.tags.tag_entity(owner, tag.id, &target).await.unwrap_err(),
        PipeflowError::Conflict(_)
    ));
    assert!(app.tags.untag_entity(owner, tag.id, &target).await.unwrap());
    assert!(app.tags.list_tags_for(&target).await.unwrap().is_empty());
}

#[tokio::test]
async fn runs_are_listable_by_pipeline_and_status() {
    let (app, admin) = test_app().await;
    let owner = seed_user(&app, admin, "owner@example.com").await;
    let pipeline = app
        .pipelines
        .create_pipeline(owner, etl_pipeline("etl-1", "ETL One"))
        .await
        .unwrap();
    let version = app
        .versions
        .create_version(owner, version_input(pipeline.id, "v1", true))
        .await
        .unwrap();

    let first = app
        .runs
        .create_run(
            owner,
            NewRun {
                pipeline_version_id: version.id,
                executor_run_id: None,
            },
        )
        .await
        .unwrap();
    app.runs
        .create_run(
            owner,
            NewRun {
                pipeline_version_id: version.id,
                executor_run_id: None,
            },
        )
        .await
        .unwrap();
    app.runs
        .transition_run(owner, first.id, RunStatus::Running)
        .await
        .unwrap();

    let filter = RunFilter {
        pipeline_id: Some(pipeline.id),
        ..Default::default()
    };
    assert_eq!(app.runs.list_runs(&filter).await.unwrap().len(), 2);

    let filter = RunFilter {
        pipeline_id: Some(pipeline.id),
        status: Some(RunStatus::Pending),
        ..Default::default()
    };
    let pending = app.runs.list_runs(&filter).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_ne!(pending[0].id, first.id);
}

#[tokio::test]
async fn file_backed_database_persists_across_reconnect() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("pipeflow.db").display());

    let mut config = AppConfig::default();
    config.database.url = url.clone();
    config.bootstrap.admin_email = Some("admin@example.com".to_string());
    config.bootstrap.admin_password_hash = Some("$2b$12$seed-hash".to_string());

    let pipeline_id = {
        let app = App::new(config.clone()).await.unwrap();
        let admin = app
            .users
            .get_user_by_email("admin@example.com")
            .await
            .unwrap()
            .unwrap();
        let pipeline = app
            .pipelines
            .create_pipeline(admin.id, etl_pipeline("etl-1", "ETL One"))
            .await
            .unwrap();
        app.close().await;
        pipeline.id
    };

    let app = App::new(config).await.unwrap();
    let reloaded = app.pipelines.get_pipeline(pipeline_id).await.unwrap();
    assert_eq!(reloaded.code, "etl-1");
    app.close().await;
}
