//! Content items and the content database seam.
//!
//! The sync engine never writes content. It reads published items of the
//! indexed types, looks up metadata while building documents, and resolves
//! the type of a deleted item. [`ContentSource`] is that read-only surface.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SyncError;

/// Identifier of a content item. `0` never names a real item.
pub type ItemId = u64;

/// One row of the content database as seen by the sync engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: ItemId,
    pub item_type: String,
    pub title: String,
    pub status: String,
    /// Raw columns as returned by the content source, keyed by column name
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl ContentItem {
    pub fn new(
        id: ItemId,
        item_type: impl Into<String>,
        title: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            id,
            item_type: item_type.into(),
            title: title.into(),
            status: status.into(),
            attributes: Map::new(),
        }
    }

    /// Attach a raw attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Resolve an attribute for direct field extraction.
    ///
    /// Raw attributes win; `id`, `title`, `status` and `type` fall back to
    /// the typed fields.
    pub fn attribute(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.attributes.get(name) {
            return Some(value.clone());
        }
        match name {
            "id" => Some(Value::from(self.id)),
            "title" => Some(Value::from(self.title.clone())),
            "status" => Some(Value::from(self.status.clone())),
            "type" => Some(Value::from(self.item_type.clone())),
            _ => None,
        }
    }
}

/// Read-only access to the content database.
pub trait ContentSource: Send + Sync {
    /// List items whose type is in `types` and status is in `statuses`.
    fn list_content_items(
        &self,
        types: &[String],
        statuses: &[String],
    ) -> Result<Vec<ContentItem>, SyncError>;

    /// First metadata value stored for `key` on the item, if any.
    fn get_meta(&self, item_id: ItemId, key: &str) -> Result<Option<Value>, SyncError>;

    /// Type of the item, or `None` when the item is unknown.
    fn item_type(&self, item_id: ItemId) -> Result<Option<String>, SyncError>;
}

/// Content source held in memory.
///
/// Used by tests and dry runs. Items are listed in id order.
#[derive(Debug, Default)]
pub struct InMemoryContentSource {
    items: RwLock<BTreeMap<ItemId, ContentItem>>,
    meta: RwLock<HashMap<(ItemId, String), Value>>,
}

impl InMemoryContentSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an item.
    pub fn put_item(&self, item: ContentItem) {
        if let Ok(mut items) = self.items.write() {
            items.insert(item.id, item);
        }
    }

    /// Remove an item and its metadata.
    pub fn remove_item(&self, item_id: ItemId) -> Option<ContentItem> {
        if let Ok(mut meta) = self.meta.write() {
            meta.retain(|(id, _), _| *id != item_id);
        }
        self.items.write().ok()?.remove(&item_id)
    }

    /// Set a metadata value.
    pub fn put_meta(&self, item_id: ItemId, key: impl Into<String>, value: impl Into<Value>) {
        if let Ok(mut meta) = self.meta.write() {
            meta.insert((item_id, key.into()), value.into());
        }
    }

    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ContentSource for InMemoryContentSource {
    fn list_content_items(
        &self,
        types: &[String],
        statuses: &[String],
    ) -> Result<Vec<ContentItem>, SyncError> {
        let items = self
            .items
            .read()
            .map_err(|e| SyncError::Content(e.to_string()))?;
        Ok(items
            .values()
            .filter(|item| types.contains(&item.item_type) && statuses.contains(&item.status))
            .cloned()
            .collect())
    }

    fn get_meta(&self, item_id: ItemId, key: &str) -> Result<Option<Value>, SyncError> {
        let meta = self
            .meta
            .read()
            .map_err(|e| SyncError::Content(e.to_string()))?;
        Ok(meta.get(&(item_id, key.to_string())).cloned())
    }

    fn item_type(&self, item_id: ItemId) -> Result<Option<String>, SyncError> {
        let items = self
            .items
            .read()
            .map_err(|e| SyncError::Content(e.to_string()))?;
        Ok(items.get(&item_id).map(|item| item.item_type.clone()))
    }
}
