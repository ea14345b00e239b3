//! Service behavior over in-memory mock repositories.

use std::sync::Arc;

use uuid::Uuid;

use pipeflow_application::{
    OwnershipGuard, PipelineService, RunService, TagService, UserService, VersionService,
};
use pipeflow_domain::entities::{ArtifactType, EntityRef, RunStatus, TagType, UserRole};
use pipeflow_domain::value_objects::{
    NewPipeline, NewRun, NewTag, NewUser, NewVersion, PipelineFilter, PipelinePatch, VersionPatch,
};
use pipeflow_errors::PipeflowError;
use pipeflow_testing_utils::{
    MockPipelineRepository, MockRunRepository, MockTagRepository, MockUserRepository,
    MockVersionRepository, PipelineBuilder, UserBuilder, VersionBuilder,
};

struct Harness {
    users: MockUserRepository,
    pipelines: MockPipelineRepository,
    versions: MockVersionRepository,
    runs: MockRunRepository,
    tags: MockTagRepository,
    pipeline_service: PipelineService,
    version_service: VersionService,
    run_service: RunService,
    tag_service: TagService,
    user_service: UserService,
}

fn harness() -> Harness {
    let users = MockUserRepository::new();
    let pipelines = MockPipelineRepository::new(&users);
    let versions = MockVersionRepository::new();
    let runs = MockRunRepository::new();
    let tags = MockTagRepository::new();

    let users_arc: Arc<MockUserRepository> = Arc::new(users.clone());
    let pipelines_arc: Arc<MockPipelineRepository> = Arc::new(pipelines.clone());
    let guard = OwnershipGuard::new(users_arc.clone(), pipelines_arc.clone());

    Harness {
        pipeline_service: PipelineService::new(pipelines_arc.clone(), users_arc.clone()),
        version_service: VersionService::new(
            Arc::new(versions.clone()),
            pipelines_arc.clone(),
            guard.clone(),
        ),
        run_service: RunService::new(Arc::new(runs.clone()), Arc::new(versions.clone()), guard.clone()),
        tag_service: TagService::new(Arc::new(tags.clone()), guard),
        user_service: UserService::new(users_arc),
        users,
        pipelines,
        versions,
        runs,
        tags,
    }
}

fn seed_user(h: &Harness) -> Uuid {
    let user = UserBuilder::new()
        .with_email(&format!("{}@example.com", Uuid::new_v4()))
        .build();
    let id = user.id;
    h.users.insert(user);
    id
}

fn seed_admin(h: &Harness) -> Uuid {
    let user = UserBuilder::new()
        .with_email(&format!("{}@example.com", Uuid::new_v4()))
        .admin()
        .build();
    let id = user.id;
    h.users.insert(user);
    id
}

fn new_pipeline(code: &str) -> NewPipeline {
    NewPipeline {
        name: format!("Pipeline {code}"),
        code: code.to_string(),
        description: None,
        executor_type: "airflow".to_string(),
        external_id: None,
        is_active: true,
    }
}

fn new_version(pipeline_id: Uuid, label: &str, active: bool) -> NewVersion {
    NewVersion {
        pipeline_id,
        version: label.to_string(),
        schema: None,
        description: None,
        is_active: active,
    }
}

#[tokio::test]
async fn creator_becomes_first_owner() {
    let h = harness();
    let actor = seed_user(&h);

    let pipeline = h
        .pipeline_service
        .create_pipeline(actor, new_pipeline("etl-1"))
        .await
        .unwrap();

    assert!(h.pipelines.owner_pairs().contains(&(pipeline.id, actor)));
    let owners = h.pipeline_service.list_owners(pipeline.id).await.unwrap();
    assert_eq!(owners.len(), 1);
    assert_eq!(owners[0].id, actor);
}

#[tokio::test]
async fn duplicate_code_is_a_conflict() {
    let h = harness();
    let actor = seed_user(&h);

    h.pipeline_service
        .create_pipeline(actor, new_pipeline("etl-1"))
        .await
        .unwrap();
    let mut second = new_pipeline("etl-1");
    second.name = "Another name".to_string();
    let err = h
        .pipeline_service
        .create_pipeline(actor, second)
        .await
        .unwrap_err();
    assert!(matches!(err, PipeflowError::Conflict(_)));
}

#[tokio::test]
async fn add_owner_is_idempotent() {
    let h = harness();
    let actor = seed_user(&h);
    let other = seed_user(&h);

    let pipeline = h
        .pipeline_service
        .create_pipeline(actor, new_pipeline("etl-1"))
        .await
        .unwrap();

    h.pipeline_service
        .add_owner(actor, pipeline.id, other)
        .await
        .unwrap();
    h.pipeline_service
        .add_owner(actor, pipeline.id, other)
        .await
        .unwrap();

    let pairs: Vec<_> = h
        .pipelines
        .owner_pairs()
        .into_iter()
        .filter(|(pid, uid)| *pid == pipeline.id && *uid == other)
        .collect();
    assert_eq!(pairs.len(), 1);
}

#[tokio::test]
async fn removing_last_owner_keeps_pipeline() {
    let h = harness();
    let actor = seed_user(&h);

    let pipeline = h
        .pipeline_service
        .create_pipeline(actor, new_pipeline("etl-1"))
        .await
        .unwrap();
    let removed = h
        .pipeline_service
        .remove_owner(actor, pipeline.id, actor)
        .await
        .unwrap();
    assert!(removed);
    // the pipeline itself survives ownerless
    assert!(h.pipeline_service.get_pipeline(pipeline.id).await.is_ok());
}

#[tokio::test]
async fn non_owner_cannot_mutate() {
    let h = harness();
    let owner = seed_user(&h);
    let outsider = seed_user(&h);

    let pipeline = h
        .pipeline_service
        .create_pipeline(owner, new_pipeline("etl-1"))
        .await
        .unwrap();

    let patch = PipelinePatch {
        description: Some("nope".to_string()),
        ..Default::default()
    };
    let err = h
        .pipeline_service
        .update_pipeline(outsider, pipeline.id, &patch)
        .await
        .unwrap_err();
    assert!(matches!(err, PipeflowError::Forbidden(_)));

    let err = h
        .pipeline_service
        .delete_pipeline(outsider, pipeline.id)
        .await
        .unwrap_err();
    assert!(matches!(err, PipeflowError::Forbidden(_)));
}

#[tokio::test]
async fn admin_bypasses_ownership() {
    let h = harness();
    let owner = seed_user(&h);
    let admin = seed_admin(&h);

    let pipeline = h
        .pipeline_service
        .create_pipeline(owner, new_pipeline("etl-1"))
        .await
        .unwrap();
    let patch = PipelinePatch {
        description: Some("admin touch".to_string()),
        ..Default::default()
    };
    let updated = h
        .pipeline_service
        .update_pipeline(admin, pipeline.id, &patch)
        .await
        .unwrap();
    assert_eq!(updated.description.as_deref(), Some("admin touch"));
}

#[tokio::test]
async fn list_pipelines_filters_by_owner() {
    let h = harness();
    let alice = seed_user(&h);
    let bob = seed_user(&h);

    h.pipeline_service
        .create_pipeline(alice, new_pipeline("etl-a"))
        .await
        .unwrap();
    h.pipeline_service
        .create_pipeline(bob, new_pipeline("etl-b"))
        .await
        .unwrap();

    let filter = PipelineFilter {
        owner_id: Some(alice),
        ..Default::default()
    };
    let pipelines = h.pipeline_service.list_pipelines(&filter).await.unwrap();
    assert_eq!(pipelines.len(), 1);
    assert_eq!(pipelines[0].code, "etl-a");
}

#[tokio::test]
async fn activating_second_version_deactivates_first() {
    let h = harness();
    let actor = seed_user(&h);
    let pipeline = h
        .pipeline_service
        .create_pipeline(actor, new_pipeline("etl-1"))
        .await
        .unwrap();

    let v1 = h
        .version_service
        .create_version(actor, new_version(pipeline.id, "v1", true))
        .await
        .unwrap();
    let v2 = h
        .version_service
        .create_version(actor, new_version(pipeline.id, "v2", true))
        .await
        .unwrap();

    assert_eq!(h.versions.active_count(pipeline.id), 1);
    let active = h
        .version_service
        .get_active_version(pipeline.id)
        .await
        .unwrap();
    assert_eq!(active.id, v2.id);
    let v1_now = h.version_service.get_version(v1.id).await.unwrap();
    assert!(!v1_now.is_active);
}

#[tokio::test]
async fn update_patch_can_swap_active_version() {
    let h = harness();
    let actor = seed_user(&h);
    let pipeline = h
        .pipeline_service
        .create_pipeline(actor, new_pipeline("etl-1"))
        .await
        .unwrap();

    let v1 = h
        .version_service
        .create_version(actor, new_version(pipeline.id, "v1", true))
        .await
        .unwrap();
    let v2 = h
        .version_service
        .create_version(actor, new_version(pipeline.id, "v2", false))
        .await
        .unwrap();

    let patch = VersionPatch {
        is_active: Some(true),
        ..Default::default()
    };
    h.version_service
        .update_version(actor, v2.id, &patch)
        .await
        .unwrap();

    assert_eq!(h.versions.active_count(pipeline.id), 1);
    assert!(!h.version_service.get_version(v1.id).await.unwrap().is_active);
    assert!(h.version_service.get_version(v2.id).await.unwrap().is_active);
}

#[tokio::test]
async fn active_version_missing_is_not_found() {
    let h = harness();
    let actor = seed_user(&h);
    let pipeline = h
        .pipeline_service
        .create_pipeline(actor, new_pipeline("etl-1"))
        .await
        .unwrap();
    h.version_service
        .create_version(actor, new_version(pipeline.id, "v1", false))
        .await
        .unwrap();

    let err = h
        .version_service
        .get_active_version(pipeline.id)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn run_walks_the_state_machine() {
    let h = harness();
    let actor = seed_user(&h);
    let pipeline = h
        .pipeline_service
        .create_pipeline(actor, new_pipeline("etl-1"))
        .await
        .unwrap();
    let version = h
        .version_service
        .create_version(actor, new_version(pipeline.id, "v1", true))
        .await
        .unwrap();

    let run = h
        .run_service
        .create_run(
            actor,
            NewRun {
                pipeline_version_id: version.id,
                executor_run_id: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Pending);
    assert_eq!(run.pipeline_id, pipeline.id);
    assert_eq!(run.user_id, Some(actor));
    assert_eq!(h.runs.count(), 1);

    let run = h
        .run_service
        .transition_run(actor, run.id, RunStatus::Running)
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Running);
    assert!(run.started_at.is_some());
    assert!(run.finished_at.is_none());

    let run = h
        .run_service
        .transition_run(actor, run.id, RunStatus::Success)
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Success);
    assert!(run.finished_at.is_some());
}

#[tokio::test]
async fn illegal_transitions_leave_run_unchanged() {
    let h = harness();
    let actor = seed_user(&h);
    let pipeline = h
        .pipeline_service
        .create_pipeline(actor, new_pipeline("etl-1"))
        .await
        .unwrap();
    let version = h
        .version_service
        .create_version(actor, new_version(pipeline.id, "v1", true))
        .await
        .unwrap();
    let run = h
        .run_service
        .create_run(
            actor,
            NewRun {
                pipeline_version_id: version.id,
                executor_run_id: None,
            },
        )
        .await
        .unwrap();

    // PENDING cannot jump straight to a terminal state
    let err = h
        .run_service
        .transition_run(actor, run.id, RunStatus::Success)
        .await
        .unwrap_err();
    assert!(matches!(err, PipeflowError::InvalidStatusTransition { .. }));
    let current = h.run_service.get_run(run.id).await.unwrap();
    assert_eq!(current.status, RunStatus::Pending);
    assert!(current.started_at.is_none());

    // drive to SUCCESS, then try to leave the terminal state
    h.run_service
        .transition_run(actor, run.id, RunStatus::Running)
        .await
        .unwrap();
    h.run_service
        .transition_run(actor, run.id, RunStatus::Success)
        .await
        .unwrap();
    let err = h
        .run_service
        .transition_run(actor, run.id, RunStatus::Running)
        .await
        .unwrap_err();
    assert!(matches!(err, PipeflowError::InvalidStatusTransition { .. }));
    let current = h.run_service.get_run(run.id).await.unwrap();
    assert_eq!(current.status, RunStatus::Success);
}

#[tokio::test]
async fn artifacts_attach_in_terminal_state_but_names_conflict() {
    let h = harness();
    let actor = seed_user(&h);
    let pipeline = h
        .pipeline_service
        .create_pipeline(actor, new_pipeline("etl-1"))
        .await
        .unwrap();
    let version = h
        .version_service
        .create_version(actor, new_version(pipeline.id, "v1", true))
        .await
        .unwrap();
    let run = h
        .run_service
        .create_run(
            actor,
            NewRun {
                pipeline_version_id: version.id,
                executor_run_id: None,
            },
        )
        .await
        .unwrap();
    h.run_service
        .transition_run(actor, run.id, RunStatus::Running)
        .await
        .unwrap();
    h.run_service
        .transition_run(actor, run.id, RunStatus::Failed)
        .await
        .unwrap();

    // late telemetry lands even on a finished run
    h.run_service
        .attach_artifact(
            actor,
            run.id,
            pipeflow_testing_utils::artifact_input("report.html", ArtifactType::File),
        )
        .await
        .unwrap();
    let err = h
        .run_service
        .attach_artifact(
            actor,
            run.id,
            pipeflow_testing_utils::artifact_input("report.html", ArtifactType::File),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PipeflowError::Conflict(_)));

    h.run_service
        .attach_param_value(actor, run.id, "threshold".to_string(), "0.8".to_string())
        .await
        .unwrap();
    let err = h
        .run_service
        .attach_param_value(actor, run.id, "threshold".to_string(), "0.9".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, PipeflowError::Conflict(_)));
    assert_eq!(h.run_service.list_param_values(run.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn duplicate_tag_link_conflicts() {
    let h = harness();
    let actor = seed_user(&h);
    let tag = h
        .tag_service
        .create_tag(
            actor,
            NewTag {
                name: "nightly".to_string(),
                tag_type: TagType::Pipeline,
                description: None,
            },
        )
        .await
        .unwrap();

    let target = EntityRef::Pipeline(Uuid::new_v4());
    h.tag_service.tag_entity(actor, tag.id, &target).await.unwrap();
    let err = h
        .tag_service
        .tag_entity(actor, tag.id, &target)
        .await
        .unwrap_err();
    assert!(matches!(err, PipeflowError::Conflict(_)));
    assert_eq!(h.tags.link_count(), 1);

    let tags = h.tag_service.list_tags_for(&target).await.unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].name, "nightly");
}

#[tokio::test]
async fn user_creation_requires_admin() {
    let h = harness();
    let admin = seed_admin(&h);
    let plain = seed_user(&h);

    let input = NewUser {
        email: "new@example.com".to_string(),
        password_hash: "$2b$12$hash".to_string(),
        role: UserRole::User,
        is_active: true,
    };
    let err = h
        .user_service
        .create_user(plain, input.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, PipeflowError::Forbidden(_)));

    let created = h.user_service.create_user(admin, input).await.unwrap();
    assert_eq!(created.email, "new@example.com");
}

#[tokio::test]
async fn initial_admin_seeding_is_idempotent() {
    let h = harness();
    let first = h
        .user_service
        .ensure_initial_admin("admin@example.com", "$2b$12$hash")
        .await
        .unwrap();
    assert!(first.is_some());
    assert!(first.unwrap().is_admin());

    let second = h
        .user_service
        .ensure_initial_admin("admin@example.com", "$2b$12$hash")
        .await
        .unwrap();
    assert!(second.is_none());
    assert_eq!(h.users.count(), 1);
}

#[tokio::test]
async fn deactivated_actor_is_rejected() {
    let h = harness();
    let user = UserBuilder::new().deactivated().build();
    let actor = user.id;
    h.users.insert(user);

    let err = h
        .pipeline_service
        .create_pipeline(actor, new_pipeline("etl-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipeflowError::Forbidden(_)));
}

#[tokio::test]
async fn create_run_rejects_unknown_version() {
    let h = harness();
    let actor = seed_user(&h);
    let err = h
        .run_service
        .create_run(
            actor,
            NewRun {
                pipeline_version_id: Uuid::new_v4(),
                executor_run_id: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PipeflowError::VersionNotFound { .. }));
}

// builders that are otherwise only used by other crates
#[tokio::test]
async fn builders_cover_non_default_shapes() {
    let pipeline = PipelineBuilder::new()
        .with_code("adhoc")
        .with_description("ad hoc")
        .inactive()
        .build();
    assert!(!pipeline.is_active);

    let version = VersionBuilder::new(pipeline.id).with_label("v9").active().build();
    assert!(version.is_active);
    assert_eq!(version.pipeline_id, pipeline.id);
}
