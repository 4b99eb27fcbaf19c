//! Error taxonomy (C14): the wire codes of §7, plus the status-code mapping
//! for the HTTP surface. Protocol-level errors (the first four) are
//! reported to the client and the session continues; recognizer errors
//! (`GOOGLE_AUTH_MISSING`, `UPSTREAM_FAIL`) terminate the recognizer worker
//! but not the session; `NOT_IMPLEMENTED` covers `rtc.start` semantics the
//! gateway only acknowledges.

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("invalid control-channel payload: {0}")]
    InvalidPayload(String),

    #[error("unknown event: {0}")]
    UnknownEvent(String),

    #[error("session not initialized")]
    SessionNotInitialized,

    #[error("invalid SDP offer: {0}")]
    InvalidOffer(String),

    #[error("invalid ICE candidate: {0}")]
    InvalidCandidate(String),

    #[error("recognizer credentials missing: {0}")]
    GoogleAuthMissing(String),

    #[error("upstream recognizer error: {0}")]
    UpstreamFail(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("internal server error: {0}")]
    Internal(String),
}

impl ServerError {
    /// The wire `code` field of `stt.error` (§7).
    pub fn wire_code(&self) -> &'static str {
        match self {
            Self::InvalidPayload(_) => "INVALID_PAYLOAD",
            Self::UnknownEvent(_) => "UNKNOWN_EVENT",
            Self::SessionNotInitialized => "SESSION_NOT_INITIALIZED",
            Self::InvalidOffer(_) => "INVALID_OFFER",
            Self::InvalidCandidate(_) => "INVALID_CANDIDATE",
            Self::GoogleAuthMissing(_) => "GOOGLE_AUTH_MISSING",
            Self::UpstreamFail(_) => "UPSTREAM_FAIL",
            Self::NotImplemented(_) => "NOT_IMPLEMENTED",
            Self::Persistence(_) | Self::Internal(_) => "UPSTREAM_FAIL",
        }
    }
}

impl From<&ServerError> for StatusCode {
    fn from(err: &ServerError) -> Self {
        match err {
            ServerError::InvalidPayload(_) | ServerError::UnknownEvent(_) => StatusCode::BAD_REQUEST,
            ServerError::SessionNotInitialized => StatusCode::CONFLICT,
            ServerError::InvalidOffer(_) | ServerError::InvalidCandidate(_) => StatusCode::BAD_REQUEST,
            ServerError::GoogleAuthMissing(_) => StatusCode::UNAUTHORIZED,
            ServerError::UpstreamFail(_) => StatusCode::BAD_GATEWAY,
            ServerError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            ServerError::Persistence(_) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<stt_gateway_transport::TransportError> for ServerError {
    fn from(err: stt_gateway_transport::TransportError) -> Self {
        use stt_gateway_transport::TransportError as T;
        match err {
            T::InvalidOffer(msg) => ServerError::InvalidOffer(msg),
            T::InvalidCandidate(msg) => ServerError::InvalidCandidate(msg),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<stt_gateway_pipeline::PipelineError> for ServerError {
    fn from(err: stt_gateway_pipeline::PipelineError) -> Self {
        use stt_gateway_pipeline::PipelineError as P;
        match err {
            P::GoogleAuthMissing(msg) => ServerError::GoogleAuthMissing(msg),
            P::UpstreamFail(msg) => ServerError::UpstreamFail(msg),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<stt_gateway_persistence::PersistenceError> for ServerError {
    fn from(err: stt_gateway_persistence::PersistenceError) -> Self {
        ServerError::Persistence(err.to_string())
    }
}
