//! Storage layer for search-sync.
//!
//! Provides:
//! - RocksDB-backed tracking store: per-index sync state and the
//!   pending-deletion log, each in its own column family
//! - Atomic multi-key writes via WriteBatch (delete hook, bookkeeping)
//! - A SQLite content source reading a WordPress-shaped schema

pub mod column_families;
#[cfg(feature = "sqlite")]
pub mod content;
pub mod db;
pub mod error;
pub mod keys;

#[cfg(feature = "sqlite")]
pub use content::SqliteContentSource;
pub use db::{IndexStats, Storage, StorageStats};
pub use error::StorageError;
pub use keys::TrackingKey;
