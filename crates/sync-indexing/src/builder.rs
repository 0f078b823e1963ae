//! Object builder: one content item to one remote document.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use sync_types::{BoxError, ContentItem, ContentSource, FieldSpec, IndexDefinition, IndexedDocument};

use crate::error::IndexingError;

/// What a [`DocumentHook`] sees besides the document itself.
pub struct HookContext<'a> {
    pub item: &'a ContentItem,
    pub index_name: &'a str,
    pub definition: &'a IndexDefinition,
}

/// Extension point run on every built document.
///
/// Returning `Ok(None)` drops the document from the pass; the item keeps
/// its tracking state.
pub trait DocumentHook: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    fn apply(
        &self,
        document: IndexedDocument,
        ctx: &HookContext<'_>,
    ) -> Result<Option<IndexedDocument>, BoxError>;
}

/// Builds documents according to an index definition.
pub struct ObjectBuilder {
    content: Arc<dyn ContentSource>,
    hooks: Vec<Arc<dyn DocumentHook>>,
}

impl ObjectBuilder {
    pub fn new(content: Arc<dyn ContentSource>) -> Self {
        Self {
            content,
            hooks: Vec::new(),
        }
    }

    /// Append a hook; hooks run in the order they were added.
    pub fn add_hook(&mut self, hook: Arc<dyn DocumentHook>) {
        self.hooks.push(hook);
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    /// Build the document for `item`.
    ///
    /// `Ok(None)` means a hook dropped it.
    pub fn build(
        &self,
        item: &ContentItem,
        definition: &IndexDefinition,
    ) -> Result<Option<IndexedDocument>, IndexingError> {
        let mut document = IndexedDocument::new(item.id);

        for (field_id, spec) in &definition.fields {
            match spec {
                FieldSpec::Direct(attr) => {
                    if let Some(value) = item.attribute(attr) {
                        document.set(field_id.clone(), value);
                    }
                }
                FieldSpec::Meta(key) => {
                    let value = self
                        .content
                        .get_meta(item.id, key)
                        .map_err(|e| IndexingError::Extraction {
                            item_id: item.id,
                            field: field_id.clone(),
                            reason: e.to_string(),
                        })?
                        .unwrap_or_else(|| Value::String(String::new()));
                    document.set(field_id.clone(), value);
                }
                FieldSpec::Callback(callback) => {
                    let value =
                        callback(item.id, field_id).map_err(|e| IndexingError::Extraction {
                            item_id: item.id,
                            field: field_id.clone(),
                            reason: e.to_string(),
                        })?;
                    document.set(field_id.clone(), value);
                }
            }
        }

        let ctx = HookContext {
            item,
            index_name: &definition.name,
            definition,
        };
        for hook in &self.hooks {
            document = match hook.apply(document, &ctx) {
                Ok(Some(document)) => document,
                Ok(None) => {
                    debug!(index = %definition.name, item_id = item.id, hook = hook.name(), "Document dropped by hook");
                    return Ok(None);
                }
                Err(e) => {
                    return Err(IndexingError::Extraction {
                        item_id: item.id,
                        field: format!("hook:{}", hook.name()),
                        reason: e.to_string(),
                    })
                }
            };
        }

        Ok(Some(document))
    }
}
