//! Postgres execution probe
//!
//! Candidates run over the simple query protocol, so every column arrives in
//! Postgres's text form. Types with a dedicated arm in [`decode_column`] map
//! to native JSON values; everything else (arrays, intervals, bytea, enums,
//! network types, ...) keeps that text form rather than collapsing to null.

use crate::error::ExecutionError;
use crate::execution::probe::{ExecutionProbe, Row, RowSet};
use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use sqlx::postgres::{PgDatabaseError, PgErrorPosition, PgPool, PgRow};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};
use tracing::debug;

pub struct PgExecutionProbe {
    pool: PgPool,
}

impl PgExecutionProbe {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ExecutionProbe for PgExecutionProbe {
    async fn run(&self, sql: &str) -> Result<RowSet, ExecutionError> {
        debug!("Executing SQL: {}", sql);
        let rows = sqlx::raw_sql(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| execution_error(&e, sql))?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn explain(&self, sql: &str) -> Result<JsonValue, ExecutionError> {
        let explain_sql = format!("EXPLAIN (FORMAT JSON) {}", sql);
        let row = sqlx::query(&explain_sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| execution_error(&e, &explain_sql))?;
        row.try_get::<JsonValue, _>(0)
            .map_err(|e| ExecutionError::new(e.to_string()))
    }
}

/// Database failure text in the layout `psql` prints: the server message,
/// then LINE/caret, DETAIL, HINT and CONTEXT when the server sent them.
///
/// Non-database failures (pool, I/O, protocol) keep sqlx's own text.
pub fn execution_error(error: &sqlx::Error, sql: &str) -> ExecutionError {
    let pg_error = error
        .as_database_error()
        .and_then(|d| d.try_downcast_ref::<PgDatabaseError>());
    match pg_error {
        Some(pg_error) => ExecutionError::new(
            ServerError {
                message: pg_error.message(),
                position: pg_error.position(),
                detail: pg_error.detail(),
                hint: pg_error.hint(),
                context: pg_error.r#where(),
            }
            .render(sql),
        ),
        None => ExecutionError::new(error.to_string()),
    }
}

/// Fields of a server-side error report.
pub struct ServerError<'a> {
    pub message: &'a str,
    pub position: Option<PgErrorPosition<'a>>,
    pub detail: Option<&'a str>,
    pub hint: Option<&'a str>,
    pub context: Option<&'a str>,
}

impl ServerError<'_> {
    pub fn render(&self, sql: &str) -> String {
        let mut text = self.message.to_string();
        match self.position {
            Some(PgErrorPosition::Original(position)) => {
                if let Some(pointer) = line_pointer(sql, position) {
                    text.push('\n');
                    text.push_str(&pointer);
                }
            }
            Some(PgErrorPosition::Internal { position, query }) => {
                text.push_str(&format!("\nQUERY:  {}", query));
                if let Some(pointer) = line_pointer(query, position) {
                    text.push('\n');
                    text.push_str(&pointer);
                }
            }
            None => {}
        }
        if let Some(detail) = self.detail {
            text.push_str(&format!("\nDETAIL:  {}", detail));
        }
        if let Some(hint) = self.hint {
            text.push_str(&format!("\nHINT:  {}", hint));
        }
        if let Some(context) = self.context {
            text.push_str(&format!("\nCONTEXT:  {}", context));
        }
        text
    }
}

/// `LINE n: <line>` plus a caret under the 1-based character `position`.
fn line_pointer(sql: &str, position: usize) -> Option<String> {
    let target = position.checked_sub(1)?;
    let mut offset = 0;
    for (idx, line) in sql.split('\n').enumerate() {
        let len = line.chars().count();
        if target <= offset + len {
            let prefix = format!("LINE {}: ", idx + 1);
            let column = target - offset;
            return Some(format!(
                "{}{}\n{}^",
                prefix,
                line.trim_end_matches('\r'),
                " ".repeat(prefix.len() + column)
            ));
        }
        // newline counts as one character
        offset += len + 1;
    }
    None
}

/// Convert a database row to a JSON object.
///
/// Columns are read by position so that duplicate names do not shadow each
/// other during decoding; the last duplicate wins in the resulting map.
pub fn row_to_json(row: &PgRow) -> Row {
    let mut map = Row::new();
    for column in row.columns() {
        let idx = column.ordinal();
        let value = decode_column(row, idx, column.type_info().name())
            .or_else(|| text_form(row, idx).map(JsonValue::String));
        map.insert(column.name().to_string(), value.unwrap_or(JsonValue::Null));
    }
    map
}

fn decode_column(row: &PgRow, idx: usize, type_name: &str) -> Option<JsonValue> {
    match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(idx).ok().flatten().map(|b| json!(b)),
        "INT2" => row.try_get::<Option<i16>, _>(idx).ok().flatten().map(|i| json!(i)),
        "INT4" => row.try_get::<Option<i32>, _>(idx).ok().flatten().map(|i| json!(i)),
        "INT8" => row.try_get::<Option<i64>, _>(idx).ok().flatten().map(|i| json!(i)),
        "FLOAT4" => row.try_get::<Option<f32>, _>(idx).ok().flatten().map(|f| json!(f)),
        "FLOAT8" => row.try_get::<Option<f64>, _>(idx).ok().flatten().map(|f| json!(f)),
        "NUMERIC" => row
            .try_get::<Option<rust_decimal::Decimal>, _>(idx)
            .ok()
            .flatten()
            .map(|d| json!(d.to_string())),
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => row
            .try_get::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map(|s| json!(s)),
        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(idx)
            .ok()
            .flatten()
            .map(|u| json!(u.to_string())),
        "JSON" | "JSONB" => row.try_get::<Option<JsonValue>, _>(idx).ok().flatten(),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)
            .ok()
            .flatten()
            .map(|dt| json!(dt.to_rfc3339())),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(idx)
            .ok()
            .flatten()
            .map(|dt| json!(dt.to_string())),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(idx)
            .ok()
            .flatten()
            .map(|d| json!(d.to_string())),
        "TIME" => row
            .try_get::<Option<chrono::NaiveTime>, _>(idx)
            .ok()
            .flatten()
            .map(|t| json!(t.to_string())),
        other => {
            debug!("Column type {} kept in text form", other);
            None
        }
    }
}

/// The column's text representation, or `None` for SQL NULL.
fn text_form(row: &PgRow, idx: usize) -> Option<String> {
    let raw = row.try_get_raw(idx).ok()?;
    if raw.is_null() {
        return None;
    }
    row.try_get_unchecked::<String, _>(idx).ok()
}
