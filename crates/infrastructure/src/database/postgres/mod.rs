mod pipeline_repository;
mod run_repository;
mod tag_repository;
mod user_repository;
mod version_repository;

pub use pipeline_repository::PostgresPipelineRepository;
pub use run_repository::PostgresRunRepository;
pub use tag_repository::PostgresTagRepository;
pub use user_repository::PostgresUserRepository;
pub use version_repository::PostgresVersionRepository;

use sqlx::PgPool;
use tracing::debug;

use pipeflow_errors::PipeflowResult;

use super::error_handling::map_sqlx_error;

/// Create the schema if it does not exist yet. Mirrors the SQLite schema
/// with native types; the partial unique index enforces the
/// single-active-version invariant.
pub async fn run_migrations(pool: &PgPool) -> PipeflowResult<()> {
    debug!("running Postgres migrations");

    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY,
            email VARCHAR(255) NOT NULL UNIQUE,
            password_hash VARCHAR(255) NOT NULL,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            role VARCHAR(50) NOT NULL DEFAULT 'USER',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS pipelines (
            id UUID PRIMARY KEY,
            name VARCHAR(255) NOT NULL UNIQUE,
            code VARCHAR(255) NOT NULL UNIQUE,
            description TEXT,
            executor_type VARCHAR(50) NOT NULL,
            external_id VARCHAR(255),
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_owners (
            pipeline_id UUID NOT NULL REFERENCES pipelines(id),
            user_id UUID NOT NULL REFERENCES users(id),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (pipeline_id, user_id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_versions (
            id UUID PRIMARY KEY,
            pipeline_id UUID NOT NULL REFERENCES pipelines(id),
            version VARCHAR(50) NOT NULL,
            schema JSONB,
            description TEXT,
            is_active BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_runs (
            id UUID PRIMARY KEY,
            pipeline_id UUID NOT NULL REFERENCES pipelines(id),
            pipeline_version_id UUID NOT NULL REFERENCES pipeline_versions(id),
            user_id UUID REFERENCES users(id),
            status VARCHAR(50) NOT NULL DEFAULT 'PENDING',
            executor_run_id VARCHAR(255),
            started_at TIMESTAMPTZ,
            finished_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS run_artifacts (
            id BIGSERIAL PRIMARY KEY,
            pipeline_run_id UUID NOT NULL REFERENCES pipeline_runs(id),
            artifact_type VARCHAR(50) NOT NULL,
            name VARCHAR(255) NOT NULL UNIQUE,
            schema JSONB,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS run_param_values (
            id BIGSERIAL PRIMARY KEY,
            pipeline_run_id UUID NOT NULL REFERENCES pipeline_runs(id),
            name VARCHAR(255) NOT NULL,
            value TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (pipeline_run_id, name)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS tags (
            id BIGSERIAL PRIMARY KEY,
            name VARCHAR(255) NOT NULL UNIQUE,
            tag_type VARCHAR(50) NOT NULL,
            description TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS tag_links (
            id BIGSERIAL PRIMARY KEY,
            tag_id BIGINT NOT NULL REFERENCES tags(id),
            entity_type VARCHAR(255) NOT NULL,
            entity_id VARCHAR(255) NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (tag_id, entity_type, entity_id)
        )
        "#,
        // at most one active version per pipeline, enforced by the engine
        "CREATE UNIQUE INDEX IF NOT EXISTS uix_pipeline_versions_one_active \
         ON pipeline_versions (pipeline_id) WHERE is_active",
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

    debug!("Postgres migrations complete");
    Ok(())
}
