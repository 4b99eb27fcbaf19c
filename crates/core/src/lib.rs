//! Core types shared across the STT gateway crates.
//!
//! Kept intentionally small: audio frame/sample-rate primitives and the
//! word-level transcript types that flow from the recognizer adapter into
//! the diarization processor. Everything session-, transport-, or
//! recognizer-specific lives in the crate that owns that concern.

pub mod audio;
pub mod error;
pub mod transcript;

pub use audio::{AudioFrame, Channels, SampleRate};
pub use error::{Error, Result};
pub use transcript::WordTimestamp;
