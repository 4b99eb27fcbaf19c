//! ScyllaDB schema creation

use crate::error::PersistenceError;
use scylla::Session;

/// Create the keyspace if it doesn't exist
pub async fn create_keyspace(
    session: &Session,
    keyspace: &str,
    replication_factor: u8,
) -> Result<(), PersistenceError> {
    let query = format!(
        "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = {{'class': 'SimpleStrategy', 'replication_factor': {}}}",
        keyspace, replication_factor
    );

    session
        .query_unpaged(query, &[])
        .await
        .map_err(|e| PersistenceError::Schema(format!("failed to create keyspace: {}", e)))?;

    Ok(())
}

/// Create the `transcripts` table: the single persisted document shape the
/// gateway needs, keyed by `room_id`.
pub async fn create_tables(session: &Session, keyspace: &str) -> Result<(), PersistenceError> {
    let transcripts_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {}.transcripts (
            room_id TEXT,
            qa_json TEXT,
            transcript_json TEXT,
            created_at TIMESTAMP,
            updated_at TIMESTAMP,
            PRIMARY KEY (room_id)
        )
    "#,
        keyspace
    );

    session
        .query_unpaged(transcripts_table, &[])
        .await
        .map_err(|e| PersistenceError::Schema(format!("failed to create transcripts table: {}", e)))?;

    tracing::info!(keyspace, "transcripts table ensured");
    Ok(())
}
