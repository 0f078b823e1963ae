//! Error type for remote index calls.

use thiserror::Error;

/// Error type for remote search index operations.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Failure injected by [`crate::RecordingClient`]
    #[error("Injected failure: {0}")]
    Injected(String),
}

impl RemoteError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Transport(_) | RemoteError::RateLimitExceeded => true,
            RemoteError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<sync_types::SyncError> for RemoteError {
    fn from(err: sync_types::SyncError) -> Self {
        RemoteError::Config(err.to_string())
    }
}
