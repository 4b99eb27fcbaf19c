//! WebRTC signaling and inbound-audio transport for the STT gateway.
//!
//! The browser client is the only media sender: the peer connection this
//! crate builds is audio-only and receive-only (§ WebRTC, component C2/C3).
//! There is no outbound media track and therefore no encoder — only an Opus
//! decoder on the inbound RTP path.

pub mod error;
pub mod ice;
pub mod webrtc;

pub use error::TransportError;
pub use ice::{parse_ice_servers, IceServer};
pub use webrtc::{
    IceCandidateInit, PeerConnectionEvent, PeerHandle, WebRtcConfig, DEFAULT_STUN_SERVER,
};

pub type Result<T> = std::result::Result<T, TransportError>;
