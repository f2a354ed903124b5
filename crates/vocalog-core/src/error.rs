//! Error taxonomy shared by the store, the TTS adapter and the HTTP layer.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VocalogError {
    /// Missing or blank required input. Nothing was written or sent.
    #[error("{0}")]
    Validation(String),

    /// Request body exceeded the configured upload limit.
    #[error("{0}")]
    TooLarge(String),

    #[error("Audio not found")]
    NotFound(i64),

    /// The TTS provider failed; carries the provider-facing message.
    #[error("{0}")]
    Synthesis(String),

    #[error("storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, VocalogError>;
