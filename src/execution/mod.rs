//! Execution layer
//!
//! - `ExecutionProbe`: the query-in, rows-out capability used by the retry
//!   loop, the enrichment stage and the evaluation harness
//! - `PgExecutionProbe`: Postgres implementation over a sqlx pool

pub mod postgres;
pub mod probe;

pub use postgres::PgExecutionProbe;
pub use probe::{ExecutionProbe, Row, RowSet};
