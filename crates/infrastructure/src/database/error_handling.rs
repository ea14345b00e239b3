//! Uniform sqlx-to-domain error mapping for repository operations.
//!
//! Uniqueness violations are contract-level outcomes (duplicate code,
//! duplicate active version, duplicate tag link, ...) and become
//! `Conflict`; everything else stays a storage error. The mapping happens
//! after rollback: sqlx transactions roll back on drop, so no partial
//! write is observable once an error propagates.

use tracing::{error, warn};

use pipeflow_errors::PipeflowError;

pub(crate) fn map_sqlx_error(
    entity: &'static str,
    operation: &'static str,
    err: sqlx::Error,
) -> PipeflowError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            warn!(entity, operation, error = %db_err, "unique constraint violated");
            return PipeflowError::conflict(format!(
                "{entity} {operation} violates a uniqueness constraint: {}",
                db_err.message()
            ));
        }
        if db_err.is_foreign_key_violation() {
            warn!(entity, operation, error = %db_err, "foreign key violated");
            return PipeflowError::validation_error(format!(
                "{entity} {operation} references a missing row: {}",
                db_err.message()
            ));
        }
    }
    error!(entity, operation, error = %err, "database operation failed");
    PipeflowError::Database(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_pass_through() {
        let err = map_sqlx_error("pipeline", "read", sqlx::Error::RowNotFound);
        assert!(matches!(err, PipeflowError::Database(_)));
        assert!(err.is_retryable());
    }
}
