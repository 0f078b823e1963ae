//! Storage layer error types.

use thiserror::Error;

/// Errors that can occur in the storage layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// RocksDB operation failed
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    /// Another process (or another handle) holds the store's LOCK file
    #[error("Tracking store is locked: {0}")]
    Locked(String),

    /// SQLite content database error
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Column family not found
    #[error("Column family not found: {0}")]
    ColumnFamilyNotFound(String),

    /// Key encoding/decoding error
    #[error("Key error: {0}")]
    Key(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Connection lock was poisoned by a panicking thread
    #[error("Lock poisoned: {0}")]
    Poisoned(String),
}

impl StorageError {
    /// Classify an open failure, separating lock contention from the rest.
    pub(crate) fn from_open(err: rocksdb::Error) -> Self {
        let message = err.to_string();
        if err.kind() == rocksdb::ErrorKind::IOError && message.to_lowercase().contains("lock") {
            StorageError::Locked(message)
        } else {
            StorageError::RocksDb(err)
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, StorageError::Locked(_))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<StorageError> for sync_types::SyncError {
    fn from(err: StorageError) -> Self {
        sync_types::SyncError::Content(err.to_string())
    }
}
