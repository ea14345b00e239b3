//! SQLite flavor of the generic store. UUIDs and JSON payloads are bound
//! as TEXT.

use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};
use sqlx::Executor;

use pipeflow_errors::PipeflowResult;

use super::{PatchSet, Record, SqlValue};
use crate::database::error_handling::map_sqlx_error;

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

pub(crate) fn bind_value(query: SqliteQuery<'_>, value: SqlValue) -> SqliteQuery<'_> {
    match value {
        SqlValue::Text(v) => query.bind(v),
        SqlValue::OptText(v) => query.bind(v),
        SqlValue::Bool(v) => query.bind(v),
        SqlValue::BigInt(v) => query.bind(v),
        SqlValue::Uuid(v) => query.bind(v.to_string()),
        SqlValue::OptUuid(v) => query.bind(v.map(|id| id.to_string())),
        SqlValue::Json(v) => query.bind(v.map(|json| json.to_string())),
        SqlValue::Timestamp(v) => query.bind(v),
        SqlValue::OptTimestamp(v) => query.bind(v),
    }
}

pub(crate) fn bind_all(mut query: SqliteQuery<'_>, values: Vec<SqlValue>) -> SqliteQuery<'_> {
    for value in values {
        query = bind_value(query, value);
    }
    query
}

pub(crate) async fn insert<'c, E, R>(executor: E, record: &R) -> PipeflowResult<R>
where
    E: Executor<'c, Database = Sqlite>,
    R: Record,
{
    let sql = super::insert_sql::<R>();
    let query = bind_all(sqlx::query(&sql), record.insert_values());
    let row = query
        .fetch_one(executor)
        .await
        .map_err(|e| map_sqlx_error(R::ENTITY, "create", e))?;
    R::from_sqlite_row(&row)
}

pub(crate) async fn fetch_by_id<'c, E, R>(executor: E, id: SqlValue) -> PipeflowResult<Option<R>>
where
    E: Executor<'c, Database = Sqlite>,
    R: Record,
{
    let sql = super::select_by_id_sql::<R>();
    let row = bind_value(sqlx::query(&sql), id)
        .fetch_optional(executor)
        .await
        .map_err(|e| map_sqlx_error(R::ENTITY, "read", e))?;
    row.as_ref().map(R::from_sqlite_row).transpose()
}

pub(crate) async fn fetch_optional_where<'c, E, R>(
    executor: E,
    where_clause: &str,
    values: Vec<SqlValue>,
) -> PipeflowResult<Option<R>>
where
    E: Executor<'c, Database = Sqlite>,
    R: Record,
{
    let sql = super::select_where_sql::<R>(where_clause);
    let row = bind_all(sqlx::query(&sql), values)
        .fetch_optional(executor)
        .await
        .map_err(|e| map_sqlx_error(R::ENTITY, "read", e))?;
    row.as_ref().map(R::from_sqlite_row).transpose()
}

pub(crate) async fn list<'c, E, R>(
    executor: E,
    filters: Vec<(&'static str, SqlValue)>,
    limit: Option<i64>,
    offset: Option<i64>,
) -> PipeflowResult<Vec<R>>
where
    E: Executor<'c, Database = Sqlite>,
    R: Record,
{
    let columns: Vec<&'static str> = filters.iter().map(|(column, _)| *column).collect();
    let sql = super::list_sql::<R>(&columns, limit.is_some(), offset.is_some());

    let mut query = sqlx::query(&sql);
    for (_, value) in filters {
        query = bind_value(query, value);
    }
    if let Some(limit) = limit {
        query = query.bind(limit);
    }
    if let Some(offset) = offset {
        query = query.bind(offset);
    }

    let rows = query
        .fetch_all(executor)
        .await
        .map_err(|e| map_sqlx_error(R::ENTITY, "list", e))?;
    rows.iter().map(R::from_sqlite_row).collect()
}

/// Partial update; returns the number of rows touched (0 = missing id).
pub(crate) async fn update_by_id<'c, E, R>(
    executor: E,
    id: SqlValue,
    patch: PatchSet,
) -> PipeflowResult<u64>
where
    E: Executor<'c, Database = Sqlite>,
    R: Record,
{
    let columns = patch.columns();
    let sql = super::update_sql::<R>(&columns);
    let mut query = bind_value(sqlx::query(&sql), id);
    query = bind_all(query, patch.into_values());
    query = query.bind(chrono::Utc::now());
    let result = query
        .execute(executor)
        .await
        .map_err(|e| map_sqlx_error(R::ENTITY, "update", e))?;
    Ok(result.rows_affected())
}

pub(crate) async fn delete_by_id<'c, E, R>(executor: E, id: SqlValue) -> PipeflowResult<u64>
where
    E: Executor<'c, Database = Sqlite>,
    R: Record,
{
    let sql = super::delete_sql::<R>();
    let result = bind_value(sqlx::query(&sql), id)
        .execute(executor)
        .await
        .map_err(|e| map_sqlx_error(R::ENTITY, "delete", e))?;
    Ok(result.rows_affected())
}
