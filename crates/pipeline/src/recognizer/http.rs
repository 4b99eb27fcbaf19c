//! Real recognizer implementation: a chunked-body HTTP POST out, a
//! newline-delimited JSON event stream in (§4.4). Authenticates with a
//! service-account bearer token when `recognizer_credentials_path` is set;
//! an unset path surfaces `GOOGLE_AUTH_MISSING` on `open`.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use gcp_auth::{AuthenticationManager, CustomServiceAccount};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::{RecognizerConfig, RecognizerEvent, StreamingRecognizer};
use crate::PipelineError;

const AUTH_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const OUTBOUND_CHANNEL_CAPACITY: usize = 32;
const EVENT_CHANNEL_CAPACITY: usize = 64;

pub struct HttpStreamingRecognizer {
    client: reqwest::Client,
    endpoint: String,
    credentials_path: Option<String>,
    chunk_tx: parking_lot::Mutex<Option<mpsc::Sender<Result<Bytes, std::io::Error>>>>,
    event_rx: tokio::sync::Mutex<Option<mpsc::Receiver<RecognizerEvent>>>,
    task: parking_lot::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl HttpStreamingRecognizer {
    pub fn new(endpoint: String, credentials_path: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            credentials_path,
            chunk_tx: parking_lot::Mutex::new(None),
            event_rx: tokio::sync::Mutex::new(None),
            task: parking_lot::Mutex::new(None),
        }
    }

    async fn bearer_token(&self) -> Result<String, PipelineError> {
        let path = self
            .credentials_path
            .as_ref()
            .ok_or_else(|| PipelineError::GoogleAuthMissing("recognizer_credentials_path is unset".to_string()))?;

        let service_account = CustomServiceAccount::from_file(path)
            .map_err(|e| PipelineError::GoogleAuthMissing(e.to_string()))?;
        let auth = AuthenticationManager::from(service_account);
        let token = auth
            .get_token(&[AUTH_SCOPE])
            .await
            .map_err(|e| PipelineError::GoogleAuthMissing(e.to_string()))?;
        Ok(token.as_str().to_string())
    }
}

#[async_trait]
impl StreamingRecognizer for HttpStreamingRecognizer {
    async fn open(&self, config: RecognizerConfig) -> Result<(), PipelineError> {
        let token = self.bearer_token().await?;

        let (chunk_tx, chunk_rx) = mpsc::channel::<Result<Bytes, std::io::Error>>(OUTBOUND_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel::<RecognizerEvent>(EVENT_CHANNEL_CAPACITY);
        *self.chunk_tx.lock() = Some(chunk_tx);
        *self.event_rx.lock().await = Some(event_rx);

        let body = reqwest::Body::wrap_stream(ReceiverStream::new(chunk_rx));
        let request = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .query(&[
                ("sample_rate", config.sample_rate.to_string()),
                ("language", config.language.clone()),
                ("model", config.model.clone()),
                ("use_enhanced", config.use_enhanced.to_string()),
                ("enable_punctuation", config.enable_punctuation.to_string()),
                ("enable_word_time_offsets", config.enable_word_time_offsets.to_string()),
                ("enable_speaker_diarization", config.enable_speaker_diarization.to_string()),
                ("max_speakers", config.max_speakers.to_string()),
            ])
            .body(body);

        *self.task.lock() = Some(tokio::spawn(async move {
            pump_response(request, event_tx).await;
        }));

        Ok(())
    }

    async fn send(&self, chunk: Vec<u8>) -> Result<(), PipelineError> {
        let tx = {
            let guard = self.chunk_tx.lock();
            guard.clone().ok_or_else(|| PipelineError::Internal("send before open".to_string()))?
        };
        tx.send(Ok(Bytes::from(chunk)))
            .await
            .map_err(|e| PipelineError::UpstreamFail(e.to_string()))
    }

    async fn close_send(&self) -> Result<(), PipelineError> {
        *self.chunk_tx.lock() = None;
        Ok(())
    }

    async fn recv(&self) -> Option<RecognizerEvent> {
        self.event_rx.lock().await.as_mut()?.recv().await
    }
}

async fn pump_response(request: reqwest::RequestBuilder, event_tx: mpsc::Sender<RecognizerEvent>) {
    let response = match request.send().await {
        Ok(r) => r,
        Err(e) => {
            let _ = event_tx
                .send(RecognizerEvent::Error { code: "UPSTREAM_FAIL".to_string(), message: e.to_string() })
                .await;
            return;
        }
    };

    if let Err(e) = response.error_for_status_ref() {
        let _ = event_tx
            .send(RecognizerEvent::Error { code: "UPSTREAM_FAIL".to_string(), message: e.to_string() })
            .await;
        return;
    }

    let mut stream = response.bytes_stream();
    let mut buffer = Vec::new();
    while let Some(next) = stream.next().await {
        let bytes = match next {
            Ok(b) => b,
            Err(e) => {
                let _ = event_tx
                    .send(RecognizerEvent::Error { code: "UPSTREAM_FAIL".to_string(), message: e.to_string() })
                    .await;
                return;
            }
        };
        buffer.extend_from_slice(&bytes);
        while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = buffer.drain(..=pos).collect();
            let line = &line[..line.len() - 1];
            if line.is_empty() {
                continue;
            }
            match serde_json::from_slice::<RecognizerEvent>(line) {
                Ok(event) => {
                    if event_tx.send(event).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "malformed NDJSON event from recognizer, skipping");
                }
            }
        }
    }
}
