//! Error types for the backend client.

use thiserror::Error;

/// Errors that can occur while talking to the history backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// HTTP client configuration error.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// The backend rejected the credentials (401/403).
    #[error("Unauthorized: {0}")]
    Auth(String),

    /// The backend answered with a non-success status.
    #[error("Backend returned status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Detail extracted from the response body.
        message: String,
    },

    /// Response body was not the expected JSON shape.
    #[error("JSON parsing error: {0}")]
    Decode(#[from] serde_json::Error),

    /// No usable endpoint was configured.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Convenience result alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
