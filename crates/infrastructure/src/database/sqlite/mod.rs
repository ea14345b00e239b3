mod pipeline_repository;
mod run_repository;
mod tag_repository;
mod user_repository;
mod version_repository;

pub use pipeline_repository::SqlitePipelineRepository;
pub use run_repository::SqliteRunRepository;
pub use tag_repository::SqliteTagRepository;
pub use user_repository::SqliteUserRepository;
pub use version_repository::SqliteVersionRepository;

use sqlx::SqlitePool;
use tracing::debug;

use pipeflow_errors::PipeflowResult;

use super::error_handling::map_sqlx_error;

/// Create the schema if it does not exist yet. The partial unique index on
/// `pipeline_versions` is the backstop for the single-active-version
/// invariant; racing activations lose here, not in application code.
pub async fn run_migrations(pool: &SqlitePool) -> PipeflowResult<()> {
    debug!("running SQLite migrations");

    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            role TEXT NOT NULL DEFAULT 'USER',
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS pipelines (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            code TEXT NOT NULL UNIQUE,
            description TEXT,
            executor_type TEXT NOT NULL,
            external_id TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_owners (
            pipeline_id TEXT NOT NULL REFERENCES pipelines(id),
            user_id TEXT NOT NULL REFERENCES users(id),
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (pipeline_id, user_id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_versions (
            id TEXT PRIMARY KEY,
            pipeline_id TEXT NOT NULL REFERENCES pipelines(id),
            version TEXT NOT NULL,
            schema TEXT,
            description TEXT,
            is_active INTEGER NOT NULL DEFAULT 0,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_runs (
            id TEXT PRIMARY KEY,
            pipeline_id TEXT NOT NULL REFERENCES pipelines(id),
            pipeline_version_id TEXT NOT NULL REFERENCES pipeline_versions(id),
            user_id TEXT REFERENCES users(id),
            status TEXT NOT NULL DEFAULT 'PENDING',
            executor_run_id TEXT,
            started_at DATETIME,
            finished_at DATETIME,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS run_artifacts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            pipeline_run_id TEXT NOT NULL REFERENCES pipeline_runs(id),
            artifact_type TEXT NOT NULL,
            name TEXT NOT NULL UNIQUE,
            schema TEXT,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS run_param_values (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            pipeline_run_id TEXT NOT NULL REFERENCES pipeline_runs(id),
            name TEXT NOT NULL,
            value TEXT NOT NULL,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (pipeline_run_id, name)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            tag_type TEXT NOT NULL,
            description TEXT,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS tag_links (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tag_id INTEGER NOT NULL REFERENCES tags(id),
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (tag_id, entity_type, entity_id)
        )
        "#,
        // at most one active version per pipeline, enforced by the engine
        "CREATE UNIQUE INDEX IF NOT EXISTS uix_pipeline_versions_one_active \
         ON pipeline_versions (pipeline_id) WHERE is_active = 1",
        "CREATE INDEX IF NOT EXISTS idx_pipeline_versions_pipeline_id \
         ON pipeline_versions (pipeline_id)",
        "CREATE INDEX IF NOT EXISTS idx_pipeline_runs_pipeline_id ON pipeline_runs (pipeline_id)",
        "CREATE INDEX IF NOT EXISTS idx_pipeline_runs_version_id \
         ON pipeline_runs (pipeline_version_id)",
        "CREATE INDEX IF NOT EXISTS idx_pipeline_runs_status ON pipeline_runs (status)",
        "CREATE INDEX IF NOT EXISTS idx_pipeline_runs_user_id ON pipeline_runs (user_id)",
        "CREATE INDEX IF NOT EXISTS idx_run_artifacts_run_id ON run_artifacts (pipeline_run_id)",
        "CREATE INDEX IF NOT EXISTS idx_run_param_values_run_id \
         ON run_param_values (pipeline_run_id)",
        "CREATE INDEX IF NOT EXISTS idx_tag_links_entity ON tag_links (entity_type, entity_id)",
    ];

    for sql in statements {
        sqlx::query(sql)
            .execute(pool)
            .await
            .map_err(|e| map_sqlx_error("schema", "migrate", e))?;
    }

    debug!("SQLite migrations complete");
    Ok(())
}
