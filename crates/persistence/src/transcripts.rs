//! Persistence Boundary (C10): a single `Upsert(TranscriptRecord)` keyed by
//! `room_id` (§4.10). Called at most once per session, at teardown.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use stt_gateway_pipeline::{QAPair, Segment};

use crate::client::ScyllaClient;
use crate::error::PersistenceError;

/// `{room_id, qa[], transcript[], created_at, updated_at}` (§3).
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TranscriptRecord {
    pub room_id: String,
    pub qa: Vec<QAPair>,
    pub transcript: Vec<Segment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Upserts by `room_id`: preserves `created_at` on update, always
    /// overwrites `qa`/`transcript`/`updated_at`.
    async fn upsert(
        &self,
        room_id: &str,
        qa: &[QAPair],
        transcript: &[Segment],
        now: DateTime<Utc>,
    ) -> Result<(), PersistenceError>;

    async fn get(&self, room_id: &str) -> Result<Option<TranscriptRecord>, PersistenceError>;
}

pub struct ScyllaTranscriptStore {
    client: ScyllaClient,
}

impl ScyllaTranscriptStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }

    fn qualified(&self, table: &str) -> String {
        format!("{}.{}", self.client.keyspace(), table)
    }
}

#[async_trait]
impl TranscriptStore for ScyllaTranscriptStore {
    async fn upsert(
        &self,
        room_id: &str,
        qa: &[QAPair],
        transcript: &[Segment],
        now: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        let existing = self.get(room_id).await?;
        let created_at = existing.map(|r| r.created_at).unwrap_or(now);

        let qa_json = serde_json::to_string(qa).map_err(|e| PersistenceError::Decode(e.to_string()))?;
        let transcript_json =
            serde_json::to_string(transcript).map_err(|e| PersistenceError::Decode(e.to_string()))?;

        let query = format!(
            "INSERT INTO {} (room_id, qa_json, transcript_json, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
            self.qualified("transcripts")
        );
        self.client
            .session()
            .query_unpaged(query, (room_id, qa_json, transcript_json, created_at.timestamp_millis(), now.timestamp_millis()))
            .await?;
        Ok(())
    }

    async fn get(&self, room_id: &str) -> Result<Option<TranscriptRecord>, PersistenceError> {
        let query = format!(
            "SELECT room_id, qa_json, transcript_json, created_at, updated_at FROM {} WHERE room_id = ?",
            self.qualified("transcripts")
        );
        let result = self.client.session().query_unpaged(query, (room_id,)).await?;
        let Some(rows) = result.rows else { return Ok(None) };
        let Some(row) = rows.into_iter().next() else { return Ok(None) };

        let (room_id, qa_json, transcript_json, created_at_ms, updated_at_ms): (
            String,
            String,
            String,
            i64,
            i64,
        ) = row.into_typed().map_err(|e| PersistenceError::Decode(e.to_string()))?;

        let qa: Vec<QAPair> = serde_json::from_str(&qa_json).map_err(|e| PersistenceError::Decode(e.to_string()))?;
        let transcript: Vec<Segment> =
            serde_json::from_str(&transcript_json).map_err(|e| PersistenceError::Decode(e.to_string()))?;

        Ok(Some(TranscriptRecord {
            room_id,
            qa,
            transcript,
            created_at: DateTime::from_timestamp_millis(created_at_ms).unwrap_or_else(Utc::now),
            updated_at: DateTime::from_timestamp_millis(updated_at_ms).unwrap_or_else(Utc::now),
        }))
    }
}

/// In-process fake used by session-level tests (§4.15): no network, same
/// upsert/preserve-`created_at` contract as [`ScyllaTranscriptStore`].
#[derive(Default)]
pub struct InMemoryTranscriptStore {
    records: Mutex<HashMap<String, TranscriptRecord>>,
}

impl InMemoryTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, room_id: &str) -> Option<TranscriptRecord> {
        self.records.lock().get(room_id).cloned()
    }
}

#[async_trait]
impl TranscriptStore for InMemoryTranscriptStore {
    async fn upsert(
        &self,
        room_id: &str,
        qa: &[QAPair],
        transcript: &[Segment],
        now: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        let mut records = self.records.lock();
        let created_at = records.get(room_id).map(|r| r.created_at).unwrap_or(now);
        records.insert(
            room_id.to_string(),
            TranscriptRecord {
                room_id: room_id.to_string(),
                qa: qa.to_vec(),
                transcript: transcript.to_vec(),
                created_at,
                updated_at: now,
            },
        );
        Ok(())
    }

    async fn get(&self, room_id: &str) -> Result<Option<TranscriptRecord>, PersistenceError> {
        Ok(self.records.lock().get(room_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qa(q: &str, a: &str) -> QAPair {
        QAPair {
            q_text: q.to_string(),
            q_speaker: Some(1),
            q_time: 1.0,
            a_text: a.to_string(),
            a_speaker: Some(2),
            a_time: 1.5,
            confidence: 0.9,
        }
    }

    fn seg(text: &str) -> Segment {
        Segment { speaker: Some(1), text: text.to_string(), start: 0.0, end: 1.0 }
    }

    #[tokio::test]
    async fn upsert_preserves_created_at_and_advances_updated_at() {
        let store = InMemoryTranscriptStore::new();
        let t0 = Utc::now();
        store.upsert("room-1", &[qa("q1", "a1")], &[seg("hello")], t0).await.unwrap();

        let t1 = t0 + chrono::Duration::seconds(5);
        store.upsert("room-1", &[qa("q1", "a1"), qa("q2", "a2")], &[seg("hello"), seg("world")], t1).await.unwrap();

        let record = store.get("room-1").await.unwrap().unwrap();
        assert_eq!(record.created_at, t0);
        assert_eq!(record.updated_at, t1);
        assert_eq!(record.qa.len(), 2);
        assert_eq!(record.transcript.len(), 2);
    }

    #[tokio::test]
    async fn unknown_room_returns_none() {
        let store = InMemoryTranscriptStore::new();
        assert!(store.get("missing").await.unwrap().is_none());
    }
}
