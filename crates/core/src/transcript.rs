//! Word-level transcript types shared between the recognizer adapter and the
//! diarization processor.

use serde::{Deserialize, Serialize};

/// A single recognized word with its time offsets and, if the upstream
/// recognizer performed diarization, the speaker tag it assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTimestamp {
    pub word: String,
    /// Offset from the start of the recognition stream, in seconds.
    pub start: f64,
    pub end: f64,
    /// 1-based speaker id assigned by the recognizer's diarizer, if enabled.
    pub speaker_tag: Option<i32>,
}
