use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use pipeflow_domain::entities::User;
use pipeflow_domain::repositories::UserRepository;
use pipeflow_domain::value_objects::UserPatch;
use pipeflow_errors::{PipeflowError, PipeflowResult};

use crate::database::error_handling::map_sqlx_error;
use crate::database::records::user_patch_set;
use crate::database::store::{self, SqlValue};

pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    #[instrument(skip(self, user), fields(user_id = %user.id, email = %user.email))]
    async fn create(&self, user: &User) -> PipeflowResult<User> {
        store::postgres::insert(&self.pool, user).await
    }

    async fn get_by_id(&self, id: Uuid) -> PipeflowResult<Option<User>> {
        store::postgres::fetch_by_id(&self.pool, SqlValue::Uuid(id)).await
    }

    async fn get_by_email(&self, email: &str) -> PipeflowResult<Option<User>> {
        store::postgres::fetch_optional_where(
            &self.pool,
            "email = $1",
            vec![SqlValue::Text(email.to_string())],
        )
        .await
    }

    async fn list(&self, limit: Option<i64>, offset: Option<i64>) -> PipeflowResult<Vec<User>> {
        store::postgres::list(&self.pool, Vec::new(), limit, offset).await
    }

    #[instrument(skip(self, patch), fields(user_id = %id))]
    async fn update(&self, id: Uuid, patch: &UserPatch) -> PipeflowResult<User> {
        if patch.is_empty() {
            return self
                .get_by_id(id)
                .await?
                .ok_or_else(|| PipeflowError::user_not_found(id));
        }

        let affected = store::postgres::update_by_id::<_, User>(
            &self.pool,
            SqlValue::Uuid(id),
            user_patch_set(patch),
        )
        .await?;
        if affected == 0 {
            return Err(PipeflowError::user_not_found(id));
        }
        self.get_by_id(id)
            .await?
            .ok_or_else(|| PipeflowError::user_not_found(id))
    }

    #[instrument(skip(self), fields(user_id = %id))]
    async fn delete(&self, id: Uuid) -> PipeflowResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("user", "delete", e))?;

        // runs survive with the initiator cleared; pipelines keep their
        // other owners
        sqlx::query(
            "UPDATE pipeline_runs SET user_id = NULL, updated_at = $2 WHERE user_id = $1",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("user", "delete", e))?;

        sqlx::query("DELETE FROM pipeline_owners WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("user", "delete", e))?;

        sqlx::query("DELETE FROM tag_links WHERE entity_type = 'user' AND entity_id = $1::text")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("user", "delete", e))?;

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("user", "delete", e))?;
        if result.rows_affected() == 0 {
            return Err(PipeflowError::user_not_found(id));
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("user", "delete", e))?;
        debug!("deleted user {id}");
        Ok(())
    }
}
