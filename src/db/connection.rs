//! Database connection management using sqlx

use crate::config::ConnectionSettings;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::time::Duration;

pub fn connect_options(settings: &ConnectionSettings) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&settings.host)
        .port(settings.port)
        .database(&settings.dbname)
        .username(&settings.user)
        .password(&settings.password)
}

/// Initialize the connection pool and verify it with a round trip.
pub async fn init_pool(settings: &ConnectionSettings) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(30))
        .connect_with(connect_options(settings))
        .await?;

    sqlx::query("SELECT 1").execute(&pool).await?;

    Ok(pool)
}
