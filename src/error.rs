//! Error types for the chat client.

use thiserror::Error;

/// Chat client error type.
#[derive(Error, Debug)]
pub enum ChatError {
    /// HTTP request failed, either while connecting or mid-stream.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Endpoint returned a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body text, if any.
        message: String,
    },

    /// The user interrupted the reply before it finished.
    #[error("reply cancelled")]
    Cancelled,

    /// Writing to the surface failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    /// Whether the failure is confined to one exchange, so the session can go on.
    ///
    /// Surface write failures are not; everything on the network side is.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Api { .. } | Self::InvalidUrl(_) | Self::Cancelled
        )
    }
}

/// Result type alias for chat client operations.
pub type Result<T> = std::result::Result<T, ChatError>;
