//! Documents sent to the remote search index.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::content::ItemId;

/// Flat JSON object keyed by `objectID`.
///
/// Built per pass and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    #[serde(rename = "objectID")]
    pub object_id: String,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl IndexedDocument {
    pub fn new(item_id: ItemId) -> Self {
        Self {
            object_id: item_id.to_string(),
            fields: Map::new(),
        }
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}
