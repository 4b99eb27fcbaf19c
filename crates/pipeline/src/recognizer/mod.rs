//! Recognizer Adapter (C4): the abstract upstream streaming-recognition
//! contract, plus the two implementations that ship with the gateway.

pub mod fake;
pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use stt_gateway_core::transcript::WordTimestamp;

use crate::PipelineError;

#[derive(Debug, Clone)]
pub struct RecognizerConfig {
    pub sample_rate: u32,
    pub language: String,
    pub model: String,
    pub use_enhanced: bool,
    pub enable_punctuation: bool,
    pub enable_word_time_offsets: bool,
    pub enable_speaker_diarization: bool,
    pub max_speakers: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecognizerEvent {
    Interim { text: String },
    Final { transcript: String, words: Vec<WordTimestamp>, result_end_time: f64 },
    Error { code: String, message: String },
}

/// Abstract upstream streaming-recognition capability (§4.4, §9 "Dynamic
/// dispatch"). Implementations drive the underlying transport; callers
/// never see it.
///
/// Methods take `&self`, not `&mut self`: the session worker calls `send`
/// and `recv` concurrently from a single `tokio::select!` loop (one feeds
/// the outbound PCM channel, the other drains the inbound event channel),
/// so implementations hold their mutable state behind interior mutability.
#[async_trait]
pub trait StreamingRecognizer: Send + Sync {
    async fn open(&self, config: RecognizerConfig) -> Result<(), PipelineError>;

    /// Sends one PCM chunk upstream. Called for every non-sentinel item
    /// drained from the PCM queue.
    async fn send(&self, chunk: Vec<u8>) -> Result<(), PipelineError>;

    /// Signals no more audio will be sent. Called once the teardown
    /// sentinel is drained from the PCM queue.
    async fn close_send(&self) -> Result<(), PipelineError>;

    /// Produces the next event, or `None` once the event stream has ended.
    async fn recv(&self) -> Option<RecognizerEvent>;
}
