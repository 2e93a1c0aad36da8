//! Error types for the charla client.

/// Top-level error type for the chat client.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// HTTP transport error talking to the tutor backend.
    #[error("backend error: {0}")]
    Backend(#[from] reqwest::Error),

    /// Backend reached but the response was not usable (bad status,
    /// server-reported error, malformed body).
    #[error("API error: {0}")]
    Api(String),

    /// Audio device or stream error.
    #[error("audio error: {0}")]
    Audio(String),

    /// Synthesized audio payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ChatError>;
