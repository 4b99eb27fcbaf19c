//! Signaling State Machine (C2) and Session Object (C8): one [`Session`]
//! owns everything for a single client — the peer connection, the audio
//! pipeline, the recognizer worker, the diarizer, the Q/A extractor, and
//! the outbound event emitter (C7). `Stop` is idempotent (§4.8, §8).

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::Message;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use stt_gateway_config::constants::events;
use stt_gateway_config::Settings;
use stt_gateway_core::audio::AudioFrame;
use stt_gateway_pipeline::{
    segment_key, AudioPipeline, AudioPipelineConfig, DiarizationProcessor, FfmpegNoiseReducer,
    NoOpNoiseReducer, QAPair, QaConfig, QaExtractor, RecognizerConfig, RecognizerEvent, Segment,
    StreamingRecognizer,
};
use stt_gateway_persistence::TranscriptStore;
use stt_gateway_transport::{parse_ice_servers, IceCandidateInit, PeerConnectionEvent, PeerHandle, WebRtcConfig};

use crate::codec::OutboundEnvelope;
use crate::error::ServerError;

/// `IDLE → NEGOTIATING → LIVE → CLOSED` (§4.2). Any event arriving once
/// `Closed` is dropped by the dispatcher in [`crate::websocket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    Idle,
    Negotiating,
    Live,
    Closed,
}

pub type RecognizerFactory = Arc<dyn Fn() -> Arc<dyn StreamingRecognizer> + Send + Sync>;

struct SessionState {
    id: String,
    settings: Arc<Settings>,
    store: Arc<dyn TranscriptStore>,
    recognizer_factory: RecognizerFactory,
    outbound_tx: mpsc::UnboundedSender<Message>,

    signaling: Mutex<SignalingState>,
    peer: tokio::sync::Mutex<Option<Arc<PeerHandle>>>,
    pipeline: tokio::sync::Mutex<Option<Arc<AudioPipeline>>>,
    recognizer: tokio::sync::Mutex<Option<Arc<dyn StreamingRecognizer>>>,

    diarizer: Mutex<DiarizationProcessor>,
    qa: Mutex<QaExtractor>,
    all_segments: Mutex<Vec<Segment>>,
    transcript_segment_keys: Mutex<std::collections::HashSet<String>>,
    all_pairs: Mutex<Vec<QAPair>>,
    room_id: Mutex<Option<String>>,

    started_at: Instant,
    partial_count: AtomicU64,
    final_count: AtomicU64,
    last_partial: Mutex<Option<String>>,

    cancel_tx: watch::Sender<bool>,
    cancel_rx: watch::Receiver<bool>,
    stopped: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Cheap to clone: every clone refers to the same session state.
#[derive(Clone)]
pub struct Session(Arc<SessionState>);

impl Session {
    pub fn new(
        settings: Arc<Settings>,
        store: Arc<dyn TranscriptStore>,
        recognizer_factory: RecognizerFactory,
        outbound_tx: mpsc::UnboundedSender<Message>,
    ) -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let qa_config = QaConfig {
            time_window_sec: settings.stt.qa_time_window_sec,
            sentence_window: settings.stt.qa_sentence_window,
        };
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Session(Arc::new(SessionState {
            id,
            settings,
            store,
            recognizer_factory,
            outbound_tx,
            signaling: Mutex::new(SignalingState::Idle),
            peer: tokio::sync::Mutex::new(None),
            pipeline: tokio::sync::Mutex::new(None),
            recognizer: tokio::sync::Mutex::new(None),
            diarizer: Mutex::new(DiarizationProcessor::new()),
            qa: Mutex::new(QaExtractor::new(qa_config)),
            all_segments: Mutex::new(Vec::new()),
            transcript_segment_keys: Mutex::new(std::collections::HashSet::new()),
            all_pairs: Mutex::new(Vec::new()),
            room_id: Mutex::new(None),
            started_at: Instant::now(),
            partial_count: AtomicU64::new(0),
            final_count: AtomicU64::new(0),
            last_partial: Mutex::new(None),
            cancel_tx,
            cancel_rx,
            stopped: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        }))
    }

    pub fn id(&self) -> &str {
        &self.0.id
    }

    pub fn state(&self) -> SignalingState {
        *self.0.signaling.lock()
    }

    /// Optionally binds `room_id` for at-teardown persistence (§9 Open
    /// Question: the gateway never infers a default — `session.init`'s
    /// `data.room_id`, if present, is the only way to bind it).
    pub fn bind_room(&self, room_id: impl Into<String>) {
        *self.0.room_id.lock() = Some(room_id.into());
    }

    pub fn emit(&self, event: &str, data: serde_json::Value) {
        let envelope = OutboundEnvelope::new(event, data);
        let text = crate::codec::encode(&envelope);
        if self.0.outbound_tx.send(Message::Text(text)).is_err() {
            tracing::debug!(session_id = %self.0.id, event, "outbound channel closed, client is gone");
        }
    }

    pub fn emit_error(&self, err: &ServerError) {
        self.emit(events::STT_ERROR, json!({ "code": err.wire_code(), "message": err.to_string() }));
    }

    /// `IDLE|LIVE, rtc.offer` (§4.2). Creates the peer connection on the
    /// first call; every call sets the remote offer and returns a local
    /// answer immediately, ahead of ICE gathering completion.
    pub async fn handle_offer(&self, sdp: String) -> Result<String, ServerError> {
        if self.state() == SignalingState::Closed {
            return Err(ServerError::SessionNotInitialized);
        }

        let mut peer_guard = self.0.peer.lock().await;
        let first_offer = peer_guard.is_none();

        let peer = if let Some(peer) = peer_guard.as_ref() {
            peer.clone()
        } else {
            let ice_servers = parse_ice_servers(self.0.settings.stt.ice_servers_json.as_deref())
                .map_err(|e| ServerError::Internal(e.to_string()))?;
            let peer = Arc::new(PeerHandle::new(WebRtcConfig { ice_servers }).await?);
            *peer_guard = Some(peer.clone());
            peer
        };
        drop(peer_guard);

        if first_offer {
            self.start_pipeline(peer.clone()).await?;
            self.spawn_ice_forwarder(&peer);
            self.spawn_state_watcher(&peer);
        }

        let answer_sdp = peer.handle_offer(sdp).await?;

        let mut state = self.0.signaling.lock();
        *state = if first_offer { SignalingState::Negotiating } else { SignalingState::Live };
        drop(state);

        Ok(answer_sdp)
    }

    /// `*, rtc.candidate` (§4.2). `SESSION_NOT_INITIALIZED` when no offer
    /// has been exchanged yet, so there is no peer connection to add to.
    pub async fn add_ice_candidate(&self, init: IceCandidateInit) -> Result<(), ServerError> {
        if self.state() == SignalingState::Closed {
            return Ok(());
        }
        let peer_guard = self.0.peer.lock().await;
        let Some(peer) = peer_guard.as_ref() else {
            return Err(ServerError::SessionNotInitialized);
        };
        peer.add_ice_candidate(init).await.map_err(ServerError::from)
    }

    /// Wires the audio pipeline, the recognizer, and the four background
    /// tasks that consume the peer connection's channels (§5). Called once,
    /// right after the first offer creates the peer connection.
    async fn start_pipeline(&self, peer: Arc<PeerHandle>) -> Result<(), ServerError> {
        let stt = &self.0.settings.stt;

        let denoiser: Option<Box<dyn stt_gateway_pipeline::NoiseReducer + Send>> = if stt.enable_denoise {
            match FfmpegNoiseReducer::spawn(stt.stt_sample_rate) {
                Ok(reducer) => Some(Box::new(reducer)),
                Err(e) => {
                    tracing::warn!(session_id = %self.0.id, error = %e, "denoiser unavailable, passing PCM through raw");
                    Some(Box::new(NoOpNoiseReducer))
                }
            }
        } else {
            None
        };

        let pipeline = Arc::new(AudioPipeline::new(
            AudioPipelineConfig {
                session_id: self.0.id.clone(),
                stt_sample_rate: stt.stt_sample_rate,
                storage_dir: PathBuf::from(&stt.storage_dir),
                analysis_dir: Some(PathBuf::from(&stt.analysis_dir)),
            },
            denoiser,
        ));
        *self.0.pipeline.lock().await = Some(pipeline.clone());

        let recognizer = (self.0.recognizer_factory)();
        recognizer
            .open(RecognizerConfig {
                sample_rate: stt.stt_sample_rate,
                language: stt.rtc_language.clone(),
                model: stt.stt_model.clone(),
                use_enhanced: stt.stt_use_enhanced,
                enable_punctuation: true,
                enable_word_time_offsets: true,
                enable_speaker_diarization: stt.enable_speaker_diarization,
                max_speakers: stt.max_speakers,
            })
            .await?;
        *self.0.recognizer.lock().await = Some(recognizer.clone());

        let Some(audio_rx) = peer.take_audio_frames() else {
            return Err(ServerError::Internal("audio frame channel already taken".to_string()));
        };
        let Some(pcm_rx) = pipeline.take_pcm_queue() else {
            return Err(ServerError::Internal("PCM queue already taken".to_string()));
        };

        let inner = self.0.clone();
        self.push_task(spawn_audio_consumer(inner.clone(), audio_rx, pipeline.clone()));
        self.push_task(spawn_recognizer_sender(inner.clone(), pcm_rx, recognizer.clone()));
        self.push_task(spawn_recognizer_dispatcher(Session(inner), recognizer));

        Ok(())
    }

    fn spawn_ice_forwarder(&self, peer: &Arc<PeerHandle>) {
        let Some(ice_rx) = peer.take_ice_candidates() else { return };
        let session = self.clone();
        self.push_task(tokio::spawn(async move {
            let mut ice_rx = ice_rx;
            while let Some(candidate) = ice_rx.recv().await {
                session.emit(
                    events::RTC_CANDIDATE,
                    json!({
                        "candidate": candidate.candidate,
                        "sdpMid": candidate.sdp_mid,
                        "sdpMLineIndex": candidate.sdp_m_line_index,
                    }),
                );
            }
        }));
    }

    fn spawn_state_watcher(&self, peer: &Arc<PeerHandle>) {
        let Some(state_rx) = peer.take_state_events() else { return };
        let session = self.clone();
        self.push_task(tokio::spawn(async move {
            let mut state_rx = state_rx;
            while let Some(event) = state_rx.recv().await {
                match event {
                    PeerConnectionEvent::Connected => {
                        *session.0.signaling.lock() = SignalingState::Live;
                    }
                    PeerConnectionEvent::Disconnected => {
                        tracing::warn!(session_id = %session.0.id, "peer connection disconnected");
                    }
                    PeerConnectionEvent::Failed | PeerConnectionEvent::Closed => {
                        session.stop("peer connection failed").await;
                        break;
                    }
                }
            }
        }));
    }

    fn push_task(&self, handle: JoinHandle<()>) {
        self.0.tasks.lock().push(handle);
    }

    fn handle_interim(&self, text: String) {
        let mut last = self.0.last_partial.lock();
        if last.as_deref() == Some(text.as_str()) {
            return;
        }
        *last = Some(text.clone());
        drop(last);
        self.0.partial_count.fetch_add(1, Ordering::Relaxed);
        self.emit(events::STT_PARTIAL, json!({ "text": text }));
    }

    /// §4.5 → §4.6 → §4.7: diarize, extract Q/A, emit in the required
    /// order (`stt.final_segments` → optional `stt.qa_pairs` → `stt.stats`).
    async fn handle_final(&self, transcript: String, words: Vec<stt_gateway_core::transcript::WordTimestamp>) {
        let novel_segments = self.0.diarizer.lock().process_final(&transcript, &words);
        if novel_segments.is_empty() {
            self.0.final_count.fetch_add(1, Ordering::Relaxed);
            self.emit_stats().await;
            return;
        }

        self.append_to_transcript(&novel_segments);
        self.emit(
            events::STT_FINAL_SEGMENTS,
            json!({ "segments": novel_segments.iter().map(segment_json).collect::<Vec<_>>() }),
        );

        let pairs = self.0.qa.lock().append_segments(&novel_segments);
        if !pairs.is_empty() {
            self.0.all_pairs.lock().extend(pairs.iter().cloned());
            self.emit(events::STT_QA_PAIRS, json!({ "pairs": pairs, "final": false }));
        }

        self.0.final_count.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("stt_gateway_finals_total").increment(1);
        self.emit_stats().await;
    }

    /// Appends to the persisted transcript list, enforcing `segment_key`
    /// uniqueness at append time (§3 TranscriptSegment) independently of the
    /// coarser wire-emission dedup the diarizer already applied.
    fn append_to_transcript(&self, segments: &[Segment]) {
        let mut keys = self.0.transcript_segment_keys.lock();
        let mut store = self.0.all_segments.lock();
        for segment in segments {
            if keys.insert(segment_key(segment)) {
                store.push(segment.clone());
            }
        }
    }

    async fn emit_stats(&self) {
        let stats = match self.0.pipeline.lock().await.as_ref() {
            Some(pipeline) => pipeline.stats(),
            None => Default::default(),
        };
        metrics::gauge!("stt_gateway_pcm_chunks_dropped").set(stats.dropped_chunks as f64);
        self.emit(
            events::STT_STATS,
            json!({
                "partials": self.0.partial_count.load(Ordering::Relaxed),
                "finals": self.0.final_count.load(Ordering::Relaxed),
                "bytes": stats.bytes,
                "chunks": stats.chunks,
            }),
        );
    }

    /// Idempotent teardown (§4.8, §8): cancellation, recognizer close,
    /// peer-connection close, task join, final Q/A flush, persistence,
    /// `session.close`.
    pub async fn stop(&self, reason: &str) {
        if self.0.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.0.signaling.lock() = SignalingState::Closed;
        let _ = self.0.cancel_tx.send(true);

        if let Some(pipeline) = self.0.pipeline.lock().await.as_ref() {
            pipeline.close();
        }
        if let Some(recognizer) = self.0.recognizer.lock().await.as_ref() {
            let _ = recognizer.close_send().await;
        }
        if let Some(peer) = self.0.peer.lock().await.as_ref() {
            let _ = peer.close().await;
        }

        self.join_tasks().await;

        let trailing_pairs = self.0.qa.lock().append_segments(&[]);
        if !trailing_pairs.is_empty() {
            self.0.all_pairs.lock().extend(trailing_pairs.iter().cloned());
        }
        let all_pairs = self.0.all_pairs.lock().clone();
        self.emit(events::STT_QA_PAIRS, json!({ "pairs": trailing_pairs, "final": true }));

        self.persist(&all_pairs).await;

        self.emit(events::SESSION_CLOSE, json!({ "reason": reason }));
        tracing::info!(
            session_id = %self.0.id,
            duration_secs = self.0.started_at.elapsed().as_secs_f64(),
            finals = self.0.final_count.load(Ordering::Relaxed),
            "session stopped"
        );
    }

    async fn join_tasks(&self) {
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.0.tasks.lock());
        let drain = std::time::Duration::from_millis(stt_gateway_config::constants::timeouts::SHUTDOWN_DRAIN_MS);
        for handle in handles {
            let _ = tokio::time::timeout(drain, handle).await;
        }
    }

    /// Persistence failures are logged, never surfaced to the client (§7) —
    /// the session is already closing.
    async fn persist(&self, qa: &[QAPair]) {
        let Some(room_id) = self.0.room_id.lock().clone() else {
            tracing::debug!(session_id = %self.0.id, "no room_id bound, skipping persistence");
            return;
        };
        let transcript = self.0.all_segments.lock().clone();
        if qa.is_empty() && transcript.is_empty() {
            return;
        }
        if let Err(e) = self.0.store.upsert(&room_id, qa, &transcript, chrono::Utc::now()).await {
            tracing::error!(session_id = %self.0.id, room_id, error = %e, "persistence upsert failed at teardown");
        }
    }
}

fn segment_json(segment: &Segment) -> serde_json::Value {
    json!({
        "speaker": segment.speaker,
        "text": segment.text,
        "start": segment.start,
        "end": segment.end,
    })
}

/// Audio-track consumer task (§5 task b): never performs CPU-heavy work
/// itself, just hands decoded frames to the pipeline.
fn spawn_audio_consumer(
    state: Arc<SessionState>,
    mut audio_rx: mpsc::Receiver<AudioFrame>,
    pipeline: Arc<AudioPipeline>,
) -> JoinHandle<()> {
    let mut cancel_rx = state.cancel_rx.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                changed = cancel_rx.changed() => {
                    if changed.is_err() || *cancel_rx.borrow() {
                        break;
                    }
                }
                frame = audio_rx.recv() => {
                    match frame {
                        Some(frame) => pipeline.push_frame(&frame),
                        None => break,
                    }
                }
            }
        }
        tracing::debug!(session_id = %state.id, "audio consumer exiting");
    })
}

/// Recognizer worker, send half (§5 task c, §4.4): drains the PCM queue,
/// treats an empty chunk as the teardown sentinel.
fn spawn_recognizer_sender(
    state: Arc<SessionState>,
    mut pcm_rx: mpsc::Receiver<Vec<u8>>,
    recognizer: Arc<dyn StreamingRecognizer>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(chunk) = pcm_rx.recv().await {
            if chunk.is_empty() {
                let _ = recognizer.close_send().await;
                break;
            }
            if let Err(e) = recognizer.send(chunk).await {
                tracing::warn!(session_id = %state.id, error = %e, "recognizer send failed");
                break;
            }
        }
        tracing::debug!(session_id = %state.id, "recognizer sender exiting");
    })
}

/// Recognizer worker, receive half (§5 task c): dispatches events on this
/// task, never on the audio thread. Auth/upstream errors terminate this
/// task but not the session (§4.4, §7).
fn spawn_recognizer_dispatcher(session: Session, recognizer: Arc<dyn StreamingRecognizer>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match recognizer.recv().await {
                Some(RecognizerEvent::Interim { text }) => session.handle_interim(text),
                Some(RecognizerEvent::Final { transcript, words, .. }) => {
                    session.handle_final(transcript, words).await
                }
                Some(RecognizerEvent::Error { code, message }) => {
                    metrics::counter!("stt_gateway_recognizer_errors_total").increment(1);
                    session.emit(events::STT_ERROR, json!({ "code": code, "message": message }));
                    break;
                }
                None => break,
            }
        }
        tracing::debug!(session_id = %session.0.id, "recognizer dispatcher exiting");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stt_gateway_persistence::InMemoryTranscriptStore;

    fn settings() -> Arc<Settings> {
        let mut s = Settings::default();
        s.stt.enable_denoise = false;
        Arc::new(s)
    }

    #[tokio::test]
    async fn new_session_starts_idle_with_fresh_hex_id() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = Session::new(
            settings(),
            Arc::new(InMemoryTranscriptStore::new()),
            Arc::new(|| unreachable!()),
            tx,
        );
        assert_eq!(session.state(), SignalingState::Idle);
        assert_eq!(session.id().len(), 32);
        assert!(session.id().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_emits_close_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = Session::new(
            settings(),
            Arc::new(InMemoryTranscriptStore::new()),
            Arc::new(|| unreachable!()),
            tx,
        );
        session.stop("test").await;
        session.stop("test").await;

        let mut close_events = 0;
        while let Ok(Message::Text(text)) = rx.try_recv() {
            if text.contains(r#""session.close""#) {
                close_events += 1;
            }
        }
        assert_eq!(close_events, 1);
    }

    #[tokio::test]
    async fn persistence_is_skipped_without_a_bound_room_id() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let store = Arc::new(InMemoryTranscriptStore::new());
        let session = Session::new(settings(), store.clone(), Arc::new(|| unreachable!()), tx);
        session.stop("test").await;
        assert!(store.snapshot("any-room").is_none());
    }

    fn word(word: &str, start: f64, end: f64, speaker_tag: Option<i32>) -> stt_gateway_core::transcript::WordTimestamp {
        stt_gateway_core::transcript::WordTimestamp { word: word.to_string(), start, end, speaker_tag }
    }

    /// Drains every `RecognizerEvent` in `script` through a real
    /// [`Session`] the way [`spawn_recognizer_dispatcher`] would, without
    /// standing up a peer connection or audio pipeline.
    async fn drive_script(session: &Session, script: Vec<RecognizerEvent>) {
        let fake = std::sync::Arc::new(stt_gateway_pipeline::recognizer::fake::FakeRecognizer::new(script));
        spawn_recognizer_dispatcher(session.clone(), fake).await.unwrap();
    }

    #[tokio::test]
    async fn final_segments_then_qa_pairs_then_stats_are_emitted_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session =
            Session::new(settings(), Arc::new(InMemoryTranscriptStore::new()), Arc::new(|| unreachable!()), tx);

        // One `Final` whose words span a speaker change, so both a question
        // and its answer land in a single diarization pass and the Q/A
        // extractor matches them on the same call.
        let words = vec![
            word("방향이", 0.0, 0.5, Some(1)),
            word("어디에요?", 0.5, 2.0, Some(1)),
            word("남향입니다.", 2.5, 3.8, Some(2)),
        ];
        drive_script(
            &session,
            vec![RecognizerEvent::Final {
                transcript: "방향이 어디에요? 남향입니다.".to_string(),
                words,
                result_end_time: 3.8,
            }],
        )
        .await;

        let mut events = Vec::new();
        while let Ok(Message::Text(text)) = rx.try_recv() {
            let value: serde_json::Value = serde_json::from_str(&text).unwrap();
            events.push(value["event"].as_str().unwrap().to_string());
        }

        let final_idx = events.iter().position(|e| e == events::STT_FINAL_SEGMENTS).unwrap();
        let qa_idx = events.iter().position(|e| e == events::STT_QA_PAIRS).unwrap();
        let stats_idx = events.iter().position(|e| e == events::STT_STATS).unwrap();
        assert!(final_idx < qa_idx, "final_segments must precede qa_pairs");
        assert!(qa_idx < stats_idx, "qa_pairs must precede stats");
    }

    #[tokio::test]
    async fn persisted_transcript_and_qa_dedup_to_unique_counts_with_created_at_preserved() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let store = Arc::new(InMemoryTranscriptStore::new());
        let session = Session::new(settings(), store.clone(), Arc::new(|| unreachable!()), tx);
        session.bind_room("room-42");

        let question_words =
            vec![word("방향이", 0.0, 0.5, Some(1)), word("어디에요?", 0.5, 2.0, Some(1))];
        let full_words = {
            let mut w = question_words.clone();
            w.push(word("남향입니다.", 2.5, 3.8, Some(2)));
            w
        };

        drive_script(
            &session,
            vec![
                RecognizerEvent::Final {
                    transcript: "방향이 어디에요?".to_string(),
                    words: question_words.clone(),
                    result_end_time: 2.0,
                },
                // Repeats the same final verbatim: must not double-count.
                RecognizerEvent::Final {
                    transcript: "방향이 어디에요?".to_string(),
                    words: question_words,
                    result_end_time: 2.0,
                },
                RecognizerEvent::Final {
                    transcript: "방향이 어디에요? 남향입니다.".to_string(),
                    words: full_words,
                    result_end_time: 3.8,
                },
            ],
        )
        .await;

        session.stop("test").await;

        let record = store.snapshot("room-42").expect("session bound a room, persistence must run");
        assert_eq!(record.transcript.len(), 2, "question + answer segments, deduped");
        assert_eq!(record.qa.len(), 1, "one unique question/answer match");
        let created_at = record.created_at;

        // A later upsert against the same room must preserve `created_at`
        // while advancing `updated_at`.
        let later = created_at + chrono::Duration::seconds(30);
        store.upsert("room-42", &record.qa, &record.transcript, later).await.unwrap();
        let resnapshot = store.snapshot("room-42").unwrap();
        assert_eq!(resnapshot.created_at, created_at);
        assert_eq!(resnapshot.updated_at, later);
    }

    #[tokio::test]
    async fn ice_candidate_before_any_offer_is_rejected() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = Session::new(
            settings(),
            Arc::new(InMemoryTranscriptStore::new()),
            Arc::new(|| unreachable!()),
            tx,
        );
        let result = session
            .add_ice_candidate(IceCandidateInit { candidate: None, sdp_mid: None, sdp_m_line_index: None })
            .await;
        assert!(matches!(result, Err(ServerError::SessionNotInitialized)));
    }
}
