use crate::error::ExecutionError;
use async_trait::async_trait;

/// One result row, column name -> JSON value.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Rows in the order the database returned them.
pub type RowSet = Vec<Row>;

/// Query execution capability.
///
/// Errors carry the database's failure text unmodified; the retry loop uses
/// it verbatim as feedback for the next generation attempt.
#[async_trait]
pub trait ExecutionProbe: Send + Sync {
    async fn run(&self, sql: &str) -> Result<RowSet, ExecutionError>;

    /// Execution plan of `sql` as JSON. Only the enrichment stage asks for
    /// plans, so probes without plan support can keep the default.
    async fn explain(&self, _sql: &str) -> Result<serde_json::Value, ExecutionError> {
        Err(ExecutionError::new("query plans are not supported by this probe"))
    }
}
