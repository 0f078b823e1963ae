//! Error types for the sync engines.

use thiserror::Error;

use sync_remote::RemoteError;
use sync_storage::StorageError;
use sync_types::{ItemId, SyncError};

/// Errors that can occur while reconciling, purging or running hooks
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Tracking store operation failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Remote search index call failed
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Missing credentials or prefix; remote calls cannot proceed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Content database could not be read
    #[error("Content error: {0}")]
    Content(String),

    /// Index declaration rejected at registration
    #[error("Registry error: {0}")]
    Registry(String),

    /// No definition registered under this name
    #[error("Unknown index: {0}")]
    UnknownIndex(String),

    /// A field callback or document hook failed for one item
    #[error("Extraction failed for item {item_id}, field {field}: {reason}")]
    Extraction {
        item_id: ItemId,
        field: String,
        reason: String,
    },

    /// Caller passed an unusable argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<SyncError> for IndexingError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Config(msg) => IndexingError::Config(msg),
            SyncError::Extraction {
                item_id,
                field,
                reason,
            } => IndexingError::Extraction {
                item_id,
                field,
                reason,
            },
            SyncError::InvalidInput(msg) => IndexingError::InvalidInput(msg),
            other => IndexingError::Content(other.to_string()),
        }
    }
}
