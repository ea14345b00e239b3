use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use pipeflow_domain::entities::{User, UserRole};
use pipeflow_domain::repositories::UserRepository;
use pipeflow_domain::value_objects::{NewUser, UserPatch};
use pipeflow_errors::{PipeflowError, PipeflowResult};

/// User management. Passwords arrive pre-hashed; credential handling is
/// the auth layer's problem, this service only stores the opaque hash.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    async fn require_admin(&self, actor_id: Uuid) -> PipeflowResult<User> {
        let actor = self
            .users
            .get_by_id(actor_id)
            .await?
            .ok_or_else(|| PipeflowError::user_not_found(actor_id))?;
        if !actor.is_active {
            return Err(PipeflowError::forbidden(format!(
                "user {actor_id} is deactivated"
            )));
        }
        if !actor.is_admin() {
            return Err(PipeflowError::forbidden(format!(
                "user {actor_id} is not an administrator"
            )));
        }
        Ok(actor)
    }

    fn validate_new_user(input: &NewUser) -> PipeflowResult<()> {
        if input.email.trim().is_empty() || !input.email.contains('@') {
            return Err(PipeflowError::validation_error(format!(
                "invalid email address: '{}'",
                input.email
            )));
        }
        if input.password_hash.is_empty() {
            return Err(PipeflowError::validation_error("password hash must not be empty"));
        }
        Ok(())
    }

    #[instrument(skip(self, input), fields(actor = %actor_id, email = %input.email))]
    pub async fn create_user(&self, actor_id: Uuid, input: NewUser) -> PipeflowResult<User> {
        self.require_admin(actor_id).await?;
        Self::validate_new_user(&input)?;
        if self.users.get_by_email(&input.email).await?.is_some() {
            return Err(PipeflowError::conflict(format!(
                "email '{}' is already registered",
                input.email
            )));
        }
        let created = self.users.create(&User::new(input)).await?;
        info!("user {} created by {actor_id}", created.id);
        Ok(created)
    }

    pub async fn get_user(&self, id: Uuid) -> PipeflowResult<User> {
        self.users
            .get_by_id(id)
            .await?
            .ok_or_else(|| PipeflowError::user_not_found(id))
    }

    pub async fn get_user_by_email(&self, email: &str) -> PipeflowResult<Option<User>> {
        self.users.get_by_email(email).await
    }

    pub async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> PipeflowResult<Vec<User>> {
        self.users.list(limit, offset).await
    }

    /// Users may edit themselves; role changes and editing someone else
    /// take an administrator.
    #[instrument(skip(self, patch), fields(actor = %actor_id, user_id = %id))]
    pub async fn update_user(
        &self,
        actor_id: Uuid,
        id: Uuid,
        patch: &UserPatch,
    ) -> PipeflowResult<User> {
        if actor_id != id || patch.role.is_some() {
            self.require_admin(actor_id).await?;
        } else {
            let actor = self.get_user(actor_id).await?;
            if !actor.is_active {
                return Err(PipeflowError::forbidden(format!(
                    "user {actor_id} is deactivated"
                )));
            }
        }

        if let Some(email) = &patch.email {
            if let Some(existing) = self.users.get_by_email(email).await? {
                if existing.id != id {
                    return Err(PipeflowError::conflict(format!(
                        "email '{email}' is already registered"
                    )));
                }
            }
        }
        self.users.update(id, patch).await
    }

    #[instrument(skip(self), fields(actor = %actor_id, user_id = %id))]
    pub async fn delete_user(&self, actor_id: Uuid, id: Uuid) -> PipeflowResult<()> {
        self.require_admin(actor_id).await?;
        self.get_user(id).await?;
        self.users.delete(id).await?;
        info!("user {id} deleted by {actor_id}");
        Ok(())
    }

    /// Idempotent first-boot seeding: create the admin account unless the
    /// email is already registered. Returns the account when it was created.
    #[instrument(skip(self, password_hash), fields(email = %email))]
    pub async fn ensure_initial_admin(
        &self,
        email: &str,
        password_hash: &str,
    ) -> PipeflowResult<Option<User>> {
        if self.users.get_by_email(email).await?.is_some() {
            return Ok(None);
        }
        let admin = User::new(NewUser {
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role: UserRole::Admin,
            is_active: true,
        });
        let created = self.users.create(&admin).await?;
        info!("seeded initial admin account {}", created.id);
        Ok(Some(created))
    }
}
