use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("invalid SDP offer: {0}")]
    InvalidOffer(String),

    #[error("invalid ICE candidate: {0}")]
    InvalidCandidate(String),

    #[error("peer connection setup failed: {0}")]
    ConnectionFailed(String),

    #[error("opus decode failed: {0}")]
    Decode(String),

    #[error("transport already closed")]
    Closed,

    #[error("internal transport error: {0}")]
    Internal(String),
}
