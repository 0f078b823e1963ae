//! Error types shared across the sync system.

use thiserror::Error;

use crate::content::ItemId;

/// Unified error type for domain-level operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration error (missing credentials, unreadable config file)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Content database could not be read
    #[error("Content source error: {0}")]
    Content(String),

    /// A field could not be extracted for an item
    #[error("Extraction failed for item {item_id}, field {field}: {reason}")]
    Extraction {
        item_id: ItemId,
        field: String,
        reason: String,
    },

    /// Not found error
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
