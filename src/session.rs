//! Connected session
//!
//! Created by the "connect" step and passed by reference into every
//! generate/evaluate call. Holding one value per connection keeps sessions
//! independent of each other; nothing here is process-global.

use crate::config::ConnectionSettings;
use crate::db;
use crate::error::Result;
use crate::execution::{ExecutionProbe, PgExecutionProbe};
use crate::schema::SchemaContext;
use tracing::{info, warn};

pub struct Session {
    settings: ConnectionSettings,
    schema: SchemaContext,
    probe: PgExecutionProbe,
}

impl Session {
    /// Open a pool, introspect the catalog and derive the known table set.
    pub async fn connect(settings: ConnectionSettings) -> Result<Self> {
        info!(
            "Connecting to postgres://{}@{}:{}/{}",
            settings.user, settings.host, settings.port, settings.dbname
        );
        let pool = db::init_pool(&settings).await?;
        let descriptor = db::load_schema(&pool).await?;
        if descriptor.is_empty() {
            warn!("No tables found in schema 'public'; generation will be refused");
        }
        let schema = SchemaContext::new(descriptor);
        info!(
            "Database schema loaded: {} tables",
            schema.known_tables().len()
        );

        Ok(Self {
            settings,
            schema,
            probe: PgExecutionProbe::new(pool),
        })
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub fn schema(&self) -> &SchemaContext {
        &self.schema
    }

    pub fn probe(&self) -> &dyn ExecutionProbe {
        &self.probe
    }
}
