//! WebSocket control channel (C1), WebRTC signaling (C2), session lifecycle
//! (C7/C8), session registry (C9), and HTTP surface (C13) for the STT
//! gateway.

pub mod codec;
pub mod error;
pub mod http;
pub mod metrics;
pub mod registry;
pub mod session;
pub mod state;
pub mod websocket;

pub use error::ServerError;
pub use registry::SessionRegistry;
pub use session::{Session, SignalingState};
pub use state::AppState;
