//! Error types for the mog client

/// Result type alias for mog client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to a mog server
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed at the transport level
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Server answered with a non-2xx status
    #[error("{status_text}")]
    Status { status: u16, status_text: String },

    /// Command name not understood
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Song id not in `protocol|id` form
    #[error("bad songid: {0}")]
    InvalidSongId(String),

    /// Configuration error (from mogconfig/anyhow)
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a generic error from a string
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Build a status error from an HTTP status code
    ///
    /// The message is the canonical reason phrase, falling back to the
    /// numeric code for unregistered statuses.
    pub fn status(status: reqwest::StatusCode) -> Self {
        let status_text = status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| status.as_u16().to_string());
        Self::Status {
            status: status.as_u16(),
            status_text,
        }
    }
}
