//! ScyllaDB client and connection management

use std::sync::Arc;

use scylla::{Session, SessionBuilder};
use stt_gateway_config::PersistenceConfig;

use crate::error::PersistenceError;
use crate::schema;

/// ScyllaDB client wrapper
#[derive(Clone)]
pub struct ScyllaClient {
    session: Arc<Session>,
    keyspace: String,
    replication_factor: u8,
}

impl ScyllaClient {
    /// Connect to the ScyllaDB cluster named by `config.scylla_hosts`.
    pub async fn connect(config: &PersistenceConfig) -> Result<Self, PersistenceError> {
        tracing::info!(hosts = ?config.scylla_hosts, keyspace = %config.keyspace, "connecting to ScyllaDB");

        let session = SessionBuilder::new()
            .known_nodes(&config.scylla_hosts)
            .build()
            .await?;

        Ok(Self {
            session: Arc::new(session),
            keyspace: config.keyspace.clone(),
            replication_factor: config.replication_factor,
        })
    }

    /// Ensure the keyspace and `transcripts` table exist.
    pub async fn ensure_schema(&self) -> Result<(), PersistenceError> {
        schema::create_keyspace(&self.session, &self.keyspace, self.replication_factor).await?;
        schema::create_tables(&self.session, &self.keyspace).await?;
        tracing::info!(keyspace = %self.keyspace, "schema ensured");
        Ok(())
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }
}
