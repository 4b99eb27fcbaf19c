//! In-memory fake recognizer driven by a scripted sequence of events,
//! independent of any chunk timing. Used for deterministic tests of C5/C6/C8
//! without a live upstream (§4.4, §4.15).

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{RecognizerConfig, RecognizerEvent, StreamingRecognizer};
use crate::PipelineError;

pub struct FakeRecognizer {
    script: Mutex<VecDeque<RecognizerEvent>>,
    sent_chunks: Mutex<Vec<Vec<u8>>>,
    opened: Mutex<bool>,
    closed: Mutex<bool>,
}

impl FakeRecognizer {
    pub fn new(script: Vec<RecognizerEvent>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            sent_chunks: Mutex::new(Vec::new()),
            opened: Mutex::new(false),
            closed: Mutex::new(false),
        }
    }

    pub fn sent_chunks(&self) -> Vec<Vec<u8>> {
        self.sent_chunks.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock()
    }
}

#[async_trait]
impl StreamingRecognizer for FakeRecognizer {
    async fn open(&self, _config: RecognizerConfig) -> Result<(), PipelineError> {
        *self.opened.lock() = true;
        Ok(())
    }

    async fn send(&self, chunk: Vec<u8>) -> Result<(), PipelineError> {
        if !*self.opened.lock() {
            return Err(PipelineError::Internal("send before open".to_string()));
        }
        self.sent_chunks.lock().push(chunk);
        Ok(())
    }

    async fn close_send(&self) -> Result<(), PipelineError> {
        *self.closed.lock() = true;
        Ok(())
    }

    async fn recv(&self) -> Option<RecognizerEvent> {
        self.script.lock().pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_script_in_order() {
        let r = FakeRecognizer::new(vec![
            RecognizerEvent::Interim { text: "안녕".to_string() },
            RecognizerEvent::Final { transcript: "안녕하세요.".to_string(), words: vec![], result_end_time: 1.1 },
        ]);
        r.open(RecognizerConfig {
            sample_rate: 16000,
            language: "ko-KR".to_string(),
            model: "default".to_string(),
            use_enhanced: false,
            enable_punctuation: true,
            enable_word_time_offsets: true,
            enable_speaker_diarization: true,
            max_speakers: 2,
        })
        .await
        .unwrap();

        assert!(matches!(r.recv().await, Some(RecognizerEvent::Interim { .. })));
        assert!(matches!(r.recv().await, Some(RecognizerEvent::Final { .. })));
        assert!(r.recv().await.is_none());
    }

    #[tokio::test]
    async fn send_before_open_is_rejected() {
        let r = FakeRecognizer::new(vec![]);
        assert!(r.send(vec![1, 2, 3]).await.is_err());
    }
}
