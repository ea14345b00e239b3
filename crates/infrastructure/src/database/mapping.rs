//! Row-decoding helpers for values whose storage form diverges between
//! backends (UUIDs and JSON are TEXT on SQLite, native on Postgres).

use serde_json::Value as JsonValue;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use pipeflow_errors::{PipeflowError, PipeflowResult};

pub(crate) fn sqlite_uuid(row: &SqliteRow, column: &str) -> PipeflowResult<Uuid> {
    let raw: String = row.try_get(column)?;
    Uuid::parse_str(&raw).map_err(|e| {
        PipeflowError::Serialization(format!("column {column} holds a malformed uuid: {e}"))
    })
}

pub(crate) fn sqlite_opt_uuid(row: &SqliteRow, column: &str) -> PipeflowResult<Option<Uuid>> {
    let raw: Option<String> = row.try_get(column)?;
    match raw {
        Some(raw) => Uuid::parse_str(&raw).map(Some).map_err(|e| {
            PipeflowError::Serialization(format!("column {column} holds a malformed uuid: {e}"))
        }),
        None => Ok(None),
    }
}

pub(crate) fn sqlite_json(row: &SqliteRow, column: &str) -> PipeflowResult<Option<JsonValue>> {
    let raw: Option<String> = row.try_get(column)?;
    match raw {
        Some(raw) => serde_json::from_str(&raw).map(Some).map_err(|e| {
            PipeflowError::Serialization(format!("column {column} holds malformed json: {e}"))
        }),
        None => Ok(None),
    }
}
