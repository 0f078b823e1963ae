//! Key encoding and decoding for the tracking store.
//!
//! Key format: `{index_name}:{item_id:020}`
//! - index_name: registry-validated, `[A-Za-z0-9_-]` only, so `:` never
//!   appears inside it
//! - item_id: zero-padded to 20 digits so keys sort by id
//!
//! Both column families use the same layout, which makes "everything for
//! one index" a prefix scan.

use sync_types::ItemId;

use crate::error::StorageError;

/// Key of a tracking record or a deletion entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingKey {
    pub index_name: String,
    pub item_id: ItemId,
}

impl TrackingKey {
    pub fn new(index_name: impl Into<String>, item_id: ItemId) -> Self {
        Self {
            index_name: index_name.into(),
            item_id,
        }
    }

    /// Encode key to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        format!("{}:{:020}", self.index_name, self.item_id).into_bytes()
    }

    /// Decode key from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let s = std::str::from_utf8(bytes)
            .map_err(|e| StorageError::Key(format!("Invalid UTF-8: {}", e)))?;

        let (index_name, id) = s
            .rsplit_once(':')
            .ok_or_else(|| StorageError::Key(format!("Invalid tracking key format: {}", s)))?;
        if index_name.is_empty() || id.len() != 20 {
            return Err(StorageError::Key(format!(
                "Invalid tracking key format: {}",
                s
            )));
        }

        let item_id: ItemId = id
            .parse()
            .map_err(|e| StorageError::Key(format!("Invalid item id: {}", e)))?;

        Ok(Self::new(index_name, item_id))
    }

    /// Prefix covering every key of one index
    pub fn index_prefix(index_name: &str) -> Vec<u8> {
        format!("{}:", index_name).into_bytes()
    }
}
