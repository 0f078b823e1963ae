//! The remote search index seam.

use async_trait::async_trait;
use serde_json::{Map, Value};

use sync_types::{IndexedDocument, ItemId};

use crate::error::RemoteError;

/// Outbound calls to the remote search index service.
///
/// `index_name` is always the remote name, i.e. already prefixed.
#[async_trait]
pub trait SearchIndexClient: Send + Sync {
    /// Add or replace documents, keyed by their `objectID`.
    async fn upsert_documents(
        &self,
        index_name: &str,
        documents: &[IndexedDocument],
    ) -> Result<(), RemoteError>;

    /// Remove documents by id.
    async fn delete_documents(&self, index_name: &str, ids: &[ItemId]) -> Result<(), RemoteError>;

    /// Replace the index settings with `settings`.
    async fn set_index_settings(
        &self,
        index_name: &str,
        settings: &Map<String, Value>,
    ) -> Result<(), RemoteError>;
}
