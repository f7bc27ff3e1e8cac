//! Error taxonomy for backend interactions
//!
//! Two failures never reach the network (`InvalidFileType`,
//! `MissingInput`); the rest describe what went wrong once a request was
//! in flight. Every failure is recovered at the component boundary;
//! nothing here is allowed to crash the application.

/// Errors from the backend API boundary
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// File rejected before any network call
    #[error("invalid file: {0}")]
    InvalidFileType(String),

    /// A required input is absent; no network call was made
    #[error("missing input: {0}")]
    MissingInput(&'static str),

    /// The server answered 4xx/5xx; `detail` is surfaced verbatim
    #[error("server rejected the request ({status}): {detail}")]
    ServerRejected {
        /// HTTP status code
        status: u16,
        /// Server-supplied detail message
        detail: String,
    },

    /// The connection could not be established or was interrupted
    #[error("could not reach the generation service: {0}")]
    Transport(String),

    /// The server sent a structured error event mid-stream
    #[error("assistant stream failed: {0}")]
    Stream(String),

    /// A stream frame could not be decoded
    #[error("malformed stream payload: {0}")]
    MalformedEvent(String),

    /// The operation was cancelled by its owner
    #[error("operation cancelled")]
    Cancelled,
}

impl ApiError {
    /// Whether this failure happened before any network traffic
    #[inline]
    #[must_use]
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            ApiError::InvalidFileType(_) | ApiError::MissingInput(_)
        )
    }

    /// Whether this failure must roll back optimistic state
    #[inline]
    #[must_use]
    pub fn rolls_back(&self) -> bool {
        matches!(
            self,
            ApiError::Transport(_)
                | ApiError::Stream(_)
                | ApiError::MalformedEvent(_)
                | ApiError::ServerRejected { .. }
                | ApiError::Cancelled
        )
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(value: reqwest::Error) -> Self {
        ApiError::Transport(value.to_string())
    }
}
