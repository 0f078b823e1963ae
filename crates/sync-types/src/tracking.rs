//! Local bookkeeping records for remote index state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::ItemId;

/// Sync state of one item in one index.
///
/// `synced = true` means the remote index holds an up-to-date document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub index_name: String,
    pub item_id: ItemId,
    pub synced: bool,

    /// Last write, microseconds since epoch so writes within one pass order
    #[serde(with = "chrono::serde::ts_microseconds")]
    pub updated_at: DateTime<Utc>,
}

impl TrackingRecord {
    pub fn new(index_name: impl Into<String>, item_id: ItemId, synced: bool) -> Self {
        Self {
            index_name: index_name.into(),
            item_id,
            synced,
            updated_at: Utc::now(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// An item waiting to be removed from a remote index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletionEntry {
    pub index_name: String,
    pub item_id: ItemId,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub deleted_at: DateTime<Utc>,
}

impl DeletionEntry {
    pub fn new(index_name: impl Into<String>, item_id: ItemId) -> Self {
        Self {
            index_name: index_name.into(),
            item_id,
            deleted_at: Utc::now(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Why an item is part of a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncKind {
    /// No tracking record exists yet
    New,
    /// A record exists with `synced = false`
    Stale,
}

impl std::fmt::Display for SyncKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncKind::New => write!(f, "new"),
            SyncKind::Stale => write!(f, "stale"),
        }
    }
}
