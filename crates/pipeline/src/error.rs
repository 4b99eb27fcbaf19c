use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("audio I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("wav writer error: {0}")]
    Wav(#[from] hound::Error),

    #[error("recognizer auth missing: {0}")]
    GoogleAuthMissing(String),

    #[error("upstream recognizer error: {0}")]
    UpstreamFail(String),

    #[error("denoiser unavailable: {0}")]
    DenoiseUnavailable(String),

    #[error("internal pipeline error: {0}")]
    Internal(String),
}
