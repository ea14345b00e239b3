use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PipeflowError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("database operation failed: {0}")]
    DatabaseOperation(String),
    #[error("pipeline not found: id={id}")]
    PipelineNotFound { id: Uuid },
    #[error("pipeline version not found: id={id}")]
    VersionNotFound { id: Uuid },
    #[error("no active version for pipeline: id={pipeline_id}")]
    ActiveVersionNotFound { pipeline_id: Uuid },
    #[error("pipeline run not found: id={id}")]
    RunNotFound { id: Uuid },
    #[error("user not found: id={id}")]
    UserNotFound { id: Uuid },
    #[error("tag not found: id={id}")]
    TagNotFound { id: i64 },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid run status transition: {from} -> {to}")]
    InvalidStatusTransition { from: String, to: String },
    #[error("permission denied: {0}")]
    Forbidden(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type PipeflowResult<T> = Result<T, PipeflowError>;

impl PipeflowError {
    pub fn database_error<S: Into<String>>(msg: S) -> Self {
        Self::DatabaseOperation(msg.into())
    }
    pub fn pipeline_not_found(id: Uuid) -> Self {
        Self::PipelineNotFound { id }
    }
    pub fn version_not_found(id: Uuid) -> Self {
        Self::VersionNotFound { id }
    }
    pub fn no_active_version(pipeline_id: Uuid) -> Self {
        Self::ActiveVersionNotFound { pipeline_id }
    }
    pub fn run_not_found(id: Uuid) -> Self {
        Self::RunNotFound { id }
    }
    pub fn user_not_found(id: Uuid) -> Self {
        Self::UserNotFound { id }
    }
    pub fn tag_not_found(id: i64) -> Self {
        Self::TagNotFound { id }
    }
    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        Self::Conflict(msg.into())
    }
    pub fn invalid_transition<F, T>(from: F, to: T) -> Self
    where
        F: std::fmt::Display,
        T: std::fmt::Display,
    {
        Self::InvalidStatusTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
    pub fn forbidden<S: Into<String>>(msg: S) -> Self {
        Self::Forbidden(msg.into())
    }
    pub fn validation_error<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Whether the entity the caller asked for was missing.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PipeflowError::PipelineNotFound { .. }
                | PipeflowError::VersionNotFound { .. }
                | PipeflowError::ActiveVersionNotFound { .. }
                | PipeflowError::RunNotFound { .. }
                | PipeflowError::UserNotFound { .. }
                | PipeflowError::TagNotFound { .. }
        )
    }

    /// Transient failures the caller may retry; NotFound/Conflict/transition
    /// errors are definitive and never are.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipeflowError::Database(_) | PipeflowError::DatabaseOperation(_)
        )
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipeflowError::Internal(_) | PipeflowError::Configuration(_)
        )
    }
}

impl From<serde_json::Error> for PipeflowError {
    fn from(err: serde_json::Error) -> Self {
        PipeflowError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for PipeflowError {
    fn from(err: anyhow::Error) -> Self {
        PipeflowError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_classification() {
        assert!(PipeflowError::database_error("connection reset").is_retryable());
        assert!(!PipeflowError::conflict("duplicate code").is_retryable());
        assert!(!PipeflowError::pipeline_not_found(Uuid::new_v4()).is_retryable());
        assert!(!PipeflowError::invalid_transition("SUCCESS", "RUNNING").is_retryable());
    }

    #[test]
    fn not_found_classification() {
        assert!(PipeflowError::run_not_found(Uuid::new_v4()).is_not_found());
        assert!(PipeflowError::no_active_version(Uuid::new_v4()).is_not_found());
        assert!(!PipeflowError::forbidden("not an owner").is_not_found());
    }

    #[test]
    fn display_carries_ids() {
        let id = Uuid::new_v4();
        let msg = PipeflowError::pipeline_not_found(id).to_string();
        assert!(msg.contains(&id.to_string()));
    }
}
