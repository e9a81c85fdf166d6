//! Database connectivity and catalog introspection (Postgres via sqlx)

pub mod catalog;
pub mod connection;

pub use catalog::load_schema;
pub use connection::init_pool;
