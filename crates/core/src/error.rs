//! Shared error type for core-level fallibility.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid audio data: {0}")]
    InvalidAudio(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
