//! Embedded application facade: configuration in, wired services out.
//!
//! The HTTP layer (external) holds an [`App`] and calls the services with
//! the authenticated actor id it resolved; tests drive the same surface
//! over an in-memory SQLite database.

use tracing::info;

use pipeflow_application::{
    OwnershipGuard, PipelineService, RunService, TagService, UserService, VersionService,
};
use pipeflow_core::AppConfig;
use pipeflow_errors::PipeflowResult;
use pipeflow_infrastructure::DatabaseManager;

pub struct App {
    config: AppConfig,
    db: DatabaseManager,
    pub pipelines: PipelineService,
    pub versions: VersionService,
    pub runs: RunService,
    pub tags: TagService,
    pub users: UserService,
}

impl App {
    /// Connect, migrate, wire the services and run first-boot seeding.
    pub async fn new(config: AppConfig) -> PipeflowResult<Self> {
        config.validate()?;

        let db =
            DatabaseManager::new(&config.database.url, config.database.max_connections).await?;

        let pipeline_repo = db.pipeline_repository();
        let user_repo = db.user_repository();
        let guard = OwnershipGuard::new(user_repo.clone(), pipeline_repo.clone());

        let pipelines = PipelineService::new(pipeline_repo.clone(), user_repo.clone());
        let versions =
            VersionService::new(db.version_repository(), pipeline_repo, guard.clone());
        let runs = RunService::new(db.run_repository(), db.version_repository(), guard.clone());
        let tags = TagService::new(db.tag_repository(), guard);
        let users = UserService::new(user_repo);

        let app = Self {
            config,
            db,
            pipelines,
            versions,
            runs,
            tags,
            users,
        };
        app.bootstrap().await?;
        info!("application wired against {:?}", app.db.database_type());
        Ok(app)
    }

    /// Convenience for tests and embedding: default config over the given
    /// database URL.
    pub async fn connect(database_url: &str) -> PipeflowResult<Self> {
        let mut config = AppConfig::default();
        config.database.url = database_url.to_string();
        Self::new(config).await
    }

    async fn bootstrap(&self) -> PipeflowResult<()> {
        if let Some((email, password_hash)) = self.config.bootstrap.admin_account() {
            self.users.ensure_initial_admin(email, password_hash).await?;
        }
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn health_check(&self) -> PipeflowResult<()> {
        self.db.health_check().await
    }

    pub async fn close(&self) {
        self.db.close().await
    }
}
