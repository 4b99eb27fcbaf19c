//! Audio-only, receive-only WebRTC peer connection wrapper.
//!
//! One [`PeerHandle`] is created per session. It owns the underlying
//! `RTCPeerConnection`, decodes the inbound Opus track into
//! [`stt_gateway_core::AudioFrame`]s, and exposes local ICE candidates and
//! connection-state changes as channels so the signaling state machine can
//! trickle them over the control channel without blocking on gathering
//! completion.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::setting_engine::SettingEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTCRtpCodecParameters, RTPCodecType};
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::track::track_remote::TrackRemote;

use stt_gateway_core::audio::{AudioFrame, Channels, SampleRate};

use crate::ice::IceServer;
use crate::TransportError;

pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

const OPUS_PAYLOAD_TYPE: u8 = 111;
const OPUS_CLOCK_RATE: u32 = 48_000;
/// 120 ms of stereo @ 48 kHz, Opus's largest standard frame.
const MAX_DECODE_SAMPLES: usize = 5760 * 2;

#[derive(Debug, Clone)]
pub struct WebRtcConfig {
    pub ice_servers: Vec<IceServer>,
}

impl Default for WebRtcConfig {
    fn default() -> Self {
        Self { ice_servers: vec![IceServer::default()] }
    }
}

/// Wire shape of `rtc.candidate` data. `candidate: None` is the
/// end-of-candidates sentinel in both directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceCandidateInit {
    pub candidate: Option<String>,
    #[serde(rename = "sdpMid", default)]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", default)]
    pub sdp_m_line_index: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerConnectionEvent {
    Connected,
    Disconnected,
    Failed,
    Closed,
}

pub struct PeerHandle {
    pc: Arc<RTCPeerConnection>,
    audio_frames_rx: parking_lot::Mutex<Option<mpsc::Receiver<AudioFrame>>>,
    ice_candidates_rx: parking_lot::Mutex<Option<mpsc::Receiver<IceCandidateInit>>>,
    state_events_rx: parking_lot::Mutex<Option<mpsc::Receiver<PeerConnectionEvent>>>,
}

impl PeerHandle {
    pub async fn new(config: WebRtcConfig) -> Result<Self, TransportError> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_codec(
                RTCRtpCodecParameters {
                    capability: RTCRtpCodecCapability {
                        mime_type: "audio/opus".to_string(),
                        clock_rate: OPUS_CLOCK_RATE,
                        channels: 2,
                        sdp_fmtp_line: "minptime=10;useinbandfec=1".to_string(),
                        rtcp_feedback: vec![],
                    },
                    payload_type: OPUS_PAYLOAD_TYPE,
                    stats_id: String::new(),
                },
                RTPCodecType::Audio,
            )
            .map_err(|e| TransportError::Internal(e.to_string()))?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)
            .map_err(|e| TransportError::Internal(e.to_string()))?;

        let setting_engine = SettingEngine::default();

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .with_setting_engine(setting_engine)
            .build();

        let ice_servers: Vec<RTCIceServer> = config
            .ice_servers
            .iter()
            .map(|s| RTCIceServer {
                urls: s.urls.clone(),
                username: s.username.clone().unwrap_or_default(),
                credential: s.credential.clone().unwrap_or_default(),
                ..Default::default()
            })
            .collect();

        let pc = api
            .new_peer_connection(RTCConfiguration { ice_servers, ..Default::default() })
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        let pc = Arc::new(pc);

        // Audio-only, receive-only: the browser is the only media sender.
        pc.add_transceiver_from_kind(
            webrtc::rtp_transceiver::rtp_codec::RTPCodecType::Audio,
            Some(RTCRtpTransceiverInit {
                direction: RTCRtpTransceiverDirection::Recvonly,
                send_encodings: vec![],
            }),
        )
        .await
        .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let (audio_tx, audio_rx) = mpsc::channel::<AudioFrame>(256);
        let sequence = Arc::new(AtomicU64::new(0));
        pc.on_track(Box::new(move |track: Arc<TrackRemote>, _, _| {
            if track.kind() != webrtc::rtp_transceiver::rtp_codec::RTPCodecType::Audio {
                return Box::pin(async {});
            }
            let audio_tx = audio_tx.clone();
            let sequence = sequence.clone();
            Box::pin(async move { read_audio_track(track, audio_tx, sequence).await })
        }));

        let (ice_tx, ice_rx) = mpsc::channel::<IceCandidateInit>(64);
        pc.on_ice_candidate(Box::new(move |candidate| {
            let ice_tx = ice_tx.clone();
            Box::pin(async move {
                let init = match candidate {
                    Some(c) => match c.to_json() {
                        Ok(json) => IceCandidateInit {
                            candidate: Some(json.candidate),
                            sdp_mid: json.sdp_mid,
                            sdp_m_line_index: json.sdp_mline_index,
                        },
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to serialize local ICE candidate");
                            return;
                        }
                    },
                    None => IceCandidateInit { candidate: None, sdp_mid: None, sdp_m_line_index: None },
                };
                let _ = ice_tx.send(init).await;
            })
        }));

        let (state_tx, state_rx) = mpsc::channel::<PeerConnectionEvent>(16);
        pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
            let event = match s {
                RTCPeerConnectionState::Connected => Some(PeerConnectionEvent::Connected),
                RTCPeerConnectionState::Disconnected => Some(PeerConnectionEvent::Disconnected),
                RTCPeerConnectionState::Failed => Some(PeerConnectionEvent::Failed),
                RTCPeerConnectionState::Closed => Some(PeerConnectionEvent::Closed),
                _ => None,
            };
            let state_tx = state_tx.clone();
            Box::pin(async move {
                if let Some(event) = event {
                    let _ = state_tx.send(event).await;
                }
            })
        }));

        Ok(Self {
            pc,
            audio_frames_rx: parking_lot::Mutex::new(Some(audio_rx)),
            ice_candidates_rx: parking_lot::Mutex::new(Some(ice_rx)),
            state_events_rx: parking_lot::Mutex::new(Some(state_rx)),
        })
    }

    /// Takes ownership of the inbound audio frame channel. Returns `None` if
    /// already taken (only the audio-track consumer task should call this).
    pub fn take_audio_frames(&self) -> Option<mpsc::Receiver<AudioFrame>> {
        self.audio_frames_rx.lock().take()
    }

    /// Takes ownership of the local-ICE-candidate channel for the trickling
    /// forwarder task.
    pub fn take_ice_candidates(&self) -> Option<mpsc::Receiver<IceCandidateInit>> {
        self.ice_candidates_rx.lock().take()
    }

    /// Takes ownership of the connection-state-change channel.
    pub fn take_state_events(&self) -> Option<mpsc::Receiver<PeerConnectionEvent>> {
        self.state_events_rx.lock().take()
    }

    /// Sets the remote offer, creates and sets the local answer, and returns
    /// the answer SDP immediately — ICE gathering continues asynchronously
    /// and candidates are delivered via `take_ice_candidates`.
    pub async fn handle_offer(&self, sdp: String) -> Result<String, TransportError> {
        let offer = RTCSessionDescription::offer(sdp)
            .map_err(|e| TransportError::InvalidOffer(e.to_string()))?;

        self.pc
            .set_remote_description(offer)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        self.pc
            .set_local_description(answer.clone())
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        Ok(answer.sdp)
    }

    /// Adds a remote ICE candidate. `None` (or an empty string) signals
    /// end-of-candidates.
    pub async fn add_ice_candidate(&self, init: IceCandidateInit) -> Result<(), TransportError> {
        let candidate = init.candidate.unwrap_or_default();
        if candidate.trim().is_empty() {
            return self
                .pc
                .add_ice_candidate(RTCIceCandidateInit::default())
                .await
                .map_err(|e| TransportError::InvalidCandidate(e.to_string()));
        }

        self.pc
            .add_ice_candidate(RTCIceCandidateInit {
                candidate,
                sdp_mid: init.sdp_mid,
                sdp_mline_index: init.sdp_m_line_index,
                username_fragment: None,
            })
            .await
            .map_err(|e| TransportError::InvalidCandidate(e.to_string()))
    }

    pub async fn close(&self) -> Result<(), TransportError> {
        self.pc.close().await.map_err(|e| TransportError::Internal(e.to_string()))
    }
}

async fn read_audio_track(
    track: Arc<TrackRemote>,
    audio_tx: mpsc::Sender<AudioFrame>,
    sequence: Arc<AtomicU64>,
) {
    let channels = audiopus::Channels::Stereo;
    let mut decoder = match audiopus::coder::Decoder::new(audiopus::SampleRate::Hz48000, channels) {
        Ok(d) => d,
        Err(e) => {
            tracing::error!(error = %e, "failed to construct opus decoder, dropping inbound track");
            return;
        }
    };

    let mut pcm = vec![0i16; MAX_DECODE_SAMPLES];
    loop {
        match track.read_rtp().await {
            Ok((packet, _)) => {
                if packet.payload.is_empty() {
                    continue;
                }
                let decoded = decoder.decode(Some(&packet.payload), &mut pcm, false);
                let samples_per_channel = match decoded {
                    Ok(n) => n,
                    Err(e) => {
                        tracing::warn!(error = %e, "opus decode error, skipping packet");
                        continue;
                    }
                };
                let total_samples = samples_per_channel * 2;
                let samples: Vec<f32> = pcm[..total_samples]
                    .iter()
                    .map(|&s| s as f32 / i16::MAX as f32)
                    .collect();

                let seq = sequence.fetch_add(1, Ordering::Relaxed);
                let frame = AudioFrame::new(samples, SampleRate::Hz48000, Channels::Stereo, seq);
                if audio_tx.send(frame).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "inbound audio track ended");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn peer_handle_new_builds_a_connection() {
        let handle = PeerHandle::new(WebRtcConfig::default()).await;
        assert!(handle.is_ok());
    }

    #[tokio::test]
    async fn channels_can_only_be_taken_once() {
        let handle = PeerHandle::new(WebRtcConfig::default()).await.unwrap();
        assert!(handle.take_audio_frames().is_some());
        assert!(handle.take_audio_frames().is_none());
    }

    #[test]
    fn ice_candidate_init_deserializes_camel_case_fields() {
        let json = r#"{"candidate":"candidate:1 1 udp 2130706431 10.0.0.1 1 typ host","sdpMid":"0","sdpMLineIndex":0}"#;
        let init: IceCandidateInit = serde_json::from_str(json).unwrap();
        assert_eq!(init.sdp_mid.as_deref(), Some("0"));
        assert_eq!(init.sdp_m_line_index, Some(0));
    }

    #[test]
    fn end_of_candidates_deserializes_with_null_candidate() {
        let init: IceCandidateInit = serde_json::from_str(r#"{"candidate":null}"#).unwrap();
        assert!(init.candidate.is_none());
    }
}
