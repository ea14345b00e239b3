//! Generic SQL entity store.
//!
//! One [`Record`] implementation per entity kind supplies the table
//! metadata, insert bindings and row mappings; the backend modules provide
//! executor-generic CRUD on top. Passing an open transaction instead of the
//! pool defers the commit, which is how multi-step operations (version
//! activation swaps, cascade deletes) compose.

pub(crate) mod postgres;
pub(crate) mod sqlite;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use pipeflow_errors::PipeflowResult;

/// A bindable SQL value. UUIDs and JSON payloads diverge per backend
/// (TEXT on SQLite, native types on Postgres); the bind helpers in the
/// backend modules resolve that.
#[derive(Debug, Clone)]
pub(crate) enum SqlValue {
    Text(String),
    OptText(Option<String>),
    Bool(bool),
    BigInt(i64),
    Uuid(Uuid),
    OptUuid(Option<Uuid>),
    Json(Option<JsonValue>),
    Timestamp(DateTime<Utc>),
    OptTimestamp(Option<DateTime<Utc>>),
}

/// Entity-kind capability set: identify the table, serialize fields for
/// insert, map rows back. Instantiated once per entity kind.
pub(crate) trait Record: Sized + Send + Sync {
    const TABLE: &'static str;
    /// Entity name used in log and error context.
    const ENTITY: &'static str;
    /// Full column list, used for SELECT and INSERT .. RETURNING.
    const COLUMNS: &'static [&'static str];
    /// Columns bound on insert. Excludes `id` for rows with
    /// database-assigned integer keys.
    const INSERT_COLUMNS: &'static [&'static str];

    fn insert_values(&self) -> Vec<SqlValue>;
    fn from_sqlite_row(row: &sqlx::sqlite::SqliteRow) -> PipeflowResult<Self>;
    fn from_pg_row(row: &sqlx::postgres::PgRow) -> PipeflowResult<Self>;
}

/// The fields of a partial update, in bind order. Only columns present
/// here are touched; `updated_at` is appended by the store itself.
#[derive(Debug, Default)]
pub(crate) struct PatchSet {
    fields: Vec<(&'static str, SqlValue)>,
}

impl PatchSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }
    pub(crate) fn set(&mut self, column: &'static str, value: SqlValue) {
        self.fields.push((column, value));
    }
    pub(crate) fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
    pub(crate) fn columns(&self) -> Vec<&'static str> {
        self.fields.iter().map(|(column, _)| *column).collect()
    }
    pub(crate) fn into_values(self) -> Vec<SqlValue> {
        self.fields.into_iter().map(|(_, value)| value).collect()
    }
}

fn select_list<R: Record>() -> String {
    R::COLUMNS.join(", ")
}

pub(crate) fn insert_sql<R: Record>() -> String {
    let placeholders: Vec<String> = (1..=R::INSERT_COLUMNS.len())
        .map(|i| format!("${i}"))
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        R::TABLE,
        R::INSERT_COLUMNS.join(", "),
        placeholders.join(", "),
        select_list::<R>(),
    )
}

pub(crate) fn select_by_id_sql<R: Record>() -> String {
    format!("SELECT {} FROM {} WHERE id = $1", select_list::<R>(), R::TABLE)
}

pub(crate) fn select_where_sql<R: Record>(where_clause: &str) -> String {
    format!(
        "SELECT {} FROM {} WHERE {}",
        select_list::<R>(),
        R::TABLE,
        where_clause,
    )
}

pub(crate) fn list_sql<R: Record>(
    filter_columns: &[&'static str],
    limit: bool,
    offset: bool,
) -> String {
    let mut sql = format!("SELECT {} FROM {} WHERE 1=1", select_list::<R>(), R::TABLE);
    let mut bind_count = 0;
    for column in filter_columns {
        bind_count += 1;
        sql.push_str(&format!(" AND {column} = ${bind_count}"));
    }
    sql.push_str(" ORDER BY created_at DESC, id DESC");
    if limit {
        bind_count += 1;
        sql.push_str(&format!(" LIMIT ${bind_count}"));
    }
    if offset {
        bind_count += 1;
        sql.push_str(&format!(" OFFSET ${bind_count}"));
    }
    sql
}

pub(crate) fn update_sql<R: Record>(columns: &[&'static str]) -> String {
    // $1 is the id; field binds follow, updated_at last.
    let mut assignments: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{column} = ${}", i + 2))
        .collect();
    assignments.push(format!("updated_at = ${}", columns.len() + 2));
    format!(
        "UPDATE {} SET {} WHERE id = $1",
        R::TABLE,
        assignments.join(", "),
    )
}

pub(crate) fn delete_sql<R: Record>() -> String {
    format!("DELETE FROM {} WHERE id = $1", R::TABLE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeflow_domain::entities::Pipeline;

    #[test]
    fn insert_sql_shape() {
        let sql = insert_sql::<Pipeline>();
        assert!(sql.starts_with("INSERT INTO pipelines (id, name, code"));
        assert!(sql.contains("VALUES ($1, $2"));
        assert!(sql.contains("RETURNING id, name, code"));
    }

    #[test]
    fn list_sql_binds_in_order() {
        let sql = list_sql::<Pipeline>(&["is_active"], true, true);
        assert!(sql.contains("AND is_active = $1"));
        assert!(sql.contains("LIMIT $2"));
        assert!(sql.contains("OFFSET $3"));
    }

    #[test]
    fn update_sql_reserves_first_bind_for_id() {
        let sql = update_sql::<Pipeline>(&["name", "is_active"]);
        assert_eq!(
            sql,
            "UPDATE pipelines SET name = $2, is_active = $3, updated_at = $4 WHERE id = $1"
        );
    }

    #[test]
    fn patch_set_preserves_order() {
        let mut patch = PatchSet::new();
        assert!(patch.is_empty());
        patch.set("name", SqlValue::Text("etl".to_string()));
        patch.set("is_active", SqlValue::Bool(false));
        assert_eq!(patch.columns(), vec!["name", "is_active"]);
        assert_eq!(patch.into_values().len(), 2);
    }
}
