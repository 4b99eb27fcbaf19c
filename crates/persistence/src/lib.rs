//! Persistence Boundary (C10): upserts a `TranscriptRecord` keyed by
//! `room_id` into ScyllaDB at session teardown.

pub mod client;
pub mod error;
pub mod schema;
pub mod transcripts;

pub use client::ScyllaClient;
pub use error::PersistenceError;
pub use transcripts::{InMemoryTranscriptStore, ScyllaTranscriptStore, TranscriptRecord, TranscriptStore};
