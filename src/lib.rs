//! ai2query: natural-language questions to grounded, executed SQL.
//!
//! The session context is an explicit value (`Session`) created by the
//! connect step; nothing is process-global. Callers that share one session
//! across tasks own the synchronization.

pub mod assistant;
pub mod config;
pub mod db;
pub mod enrichment;
pub mod error;
pub mod evaluation;
pub mod execution;
pub mod execution_loop;
pub mod llm;
pub mod prompt;
pub mod reflexion;
pub mod schema;
pub mod session;
pub mod validation;

pub use assistant::{GenerateResponse, QueryAssistant};
pub use error::{ExecutionError, QueryError, Result};
pub use execution_loop::{RetryController, RetryOutcome};
pub use session::Session;
