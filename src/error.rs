//! Error types for the podium gateway

use thiserror::Error;

/// Result type alias for podium operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the podium gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Microphone unavailable (permission denied or no input device)
    #[error("microphone unavailable: {0}")]
    Microphone(String),

    /// Audio processing error
    #[error("audio error: {0}")]
    Audio(String),

    /// Transport-level socket failure on either relay leg
    #[error("transport error: {0}")]
    Transport(String),

    /// Upstream transcription service error
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Deck error (missing or malformed section data)
    #[error("deck error: {0}")]
    Deck(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
