//! Audio conditioning, the recognizer adapter, diarization, and Q/A
//! extraction — the STT gateway's per-session processing pipeline (C3–C6).

pub mod audio;
pub mod denoise;
pub mod diarization;
pub mod error;
pub mod qa_extractor;
pub mod recognizer;

pub use audio::{AudioPipeline, AudioPipelineConfig, AudioStats};
pub use denoise::{FfmpegNoiseReducer, NoOpNoiseReducer, NoiseReducer};
pub use diarization::{segment_key, DiarizationProcessor, Segment};
pub use error::PipelineError;
pub use qa_extractor::{QAPair, QaConfig, QaExtractor, Sentence};
pub use recognizer::{RecognizerConfig, RecognizerEvent, StreamingRecognizer};
