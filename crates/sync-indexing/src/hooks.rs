//! Mutation hooks called by the content layer on save and delete.
//!
//! Both run in the mutation request path: they touch the tracking store
//! only and never call the remote service.

use std::sync::Arc;

use tracing::debug;

use sync_storage::Storage;
use sync_types::{ContentSource, ItemId};

use crate::error::IndexingError;
use crate::registry::IndexDefinitions;

pub struct MutationHooks {
    definitions: IndexDefinitions,
    storage: Arc<Storage>,
    content: Arc<dyn ContentSource>,
}

impl MutationHooks {
    pub fn new(
        definitions: IndexDefinitions,
        storage: Arc<Storage>,
        content: Arc<dyn ContentSource>,
    ) -> Self {
        Self {
            definitions,
            storage,
            content,
        }
    }

    /// Mark the item stale in every index fed by `item_type`.
    ///
    /// `update` tells a create from an edit; both are handled the same.
    /// Returns the names of the affected indexes.
    pub fn on_save(
        &self,
        item_id: ItemId,
        item_type: &str,
        update: bool,
    ) -> Result<Vec<String>, IndexingError> {
        if item_id == 0 {
            return Err(IndexingError::InvalidInput("item id 0".to_string()));
        }

        let mut affected = Vec::new();
        for definition in self.definitions.matching_type(item_type) {
            self.storage
                .insert_or_update_tracking(&definition.name, item_id, false)?;
            affected.push(definition.name.clone());
        }
        debug!(item_id, item_type, update, indexes = ?affected, "Save hook");
        Ok(affected)
    }

    /// Log the item for deletion in every index fed by its type.
    ///
    /// When `item_type` is `None` it is looked up in the content source; an
    /// item the source does not know is ignored.
    pub fn on_delete(
        &self,
        item_id: ItemId,
        item_type: Option<&str>,
    ) -> Result<Vec<String>, IndexingError> {
        if item_id == 0 {
            return Err(IndexingError::InvalidInput("item id 0".to_string()));
        }

        let item_type = match item_type {
            Some(item_type) => item_type.to_string(),
            None => match self.content.item_type(item_id)? {
                Some(item_type) => item_type,
                None => {
                    debug!(item_id, "Delete hook for unknown item, ignoring");
                    return Ok(Vec::new());
                }
            },
        };

        let mut affected = Vec::new();
        for definition in self.definitions.matching_type(&item_type) {
            self.storage.record_deletion(&definition.name, item_id)?;
            affected.push(definition.name.clone());
        }
        debug!(item_id, item_type = %item_type, indexes = ?affected, "Delete hook");
        Ok(affected)
    }
}
