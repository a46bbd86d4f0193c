//! Error types for the tutor session SDK

use thiserror::Error;

/// Main error type for session and chat operations
#[derive(Error, Debug)]
pub enum SessionError {
    /// The identity provider declined, was cancelled, or is not configured
    #[error("Identity provider error: {0}")]
    Exchange(String),

    /// The backend refused the exchanged credential or the session token
    #[error("Backend rejected credential (status {status}): {message}")]
    BackendRejected {
        /// HTTP status returned by the backend
        status: u16,
        /// Message extracted from the response body
        message: String,
    },

    /// Transport-level failure before a response was received
    #[error("Network error: {0}")]
    Network(String),

    /// Chat request returned a non-success status
    #[error("Chat request failed: {status} {status_text}")]
    ChatRequestFailed {
        /// HTTP status code
        status: u16,
        /// Reason phrase reported for the status
        status_text: String,
    },

    /// Chat request succeeded but carried no body to stream
    #[error("Chat response has no body")]
    EmptyResponseBody,

    /// A chat stream that had already started was cut off
    #[error("Chat stream interrupted: {0}")]
    StreamInterrupted(String),

    /// No durable storage area is available in this execution context
    #[error("Session storage unavailable")]
    StorageUnavailable,

    /// Session storage read or write failed
    #[error("Session storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// JSON encode or decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation needs a session token but none is stored
    #[error("Not authenticated")]
    NotAuthenticated,

    /// A newer sign-in or sign-out started before this operation completed
    #[error("Superseded by a newer session transition")]
    Superseded,
}

/// Result type alias for session SDK operations
pub type Result<T> = std::result::Result<T, SessionError>;

impl SessionError {
    /// Create an identity provider error
    pub fn exchange(msg: impl Into<String>) -> Self {
        Self::Exchange(msg.into())
    }

    /// Create a backend rejection error
    pub fn backend_rejected(status: u16, msg: impl Into<String>) -> Self {
        Self::BackendRejected {
            status,
            message: msg.into(),
        }
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a chat request failure
    pub fn chat_request_failed(status: u16, status_text: impl Into<String>) -> Self {
        Self::ChatRequestFailed {
            status,
            status_text: status_text.into(),
        }
    }

    /// Create a stream interruption error
    pub fn stream_interrupted(msg: impl Into<String>) -> Self {
        Self::StreamInterrupted(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Whether retrying the triggering action could succeed without user input
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::StreamInterrupted(_) | Self::Superseded => true,
            Self::ChatRequestFailed { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether the error means the stored session is no longer usable
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::BackendRejected { .. } | Self::NotAuthenticated => true,
            Self::ChatRequestFailed { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::network(format!("invalid response body: {err}"))
        } else {
            Self::network(err.to_string())
        }
    }
}
