//! Purge engine: drains the deletion log to the remote service.
//!
//! Only the log entries read at the start of a pass are removed after the
//! remote delete succeeds. Entries logged while the call was in flight stay
//! for the next pass.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use sync_remote::SearchIndexClient;
use sync_storage::Storage;
use sync_types::IndexDefinition;

use crate::error::IndexingError;
use crate::reconcile::SyncConfig;
use crate::registry::IndexDefinitions;

/// Outcome of purging one index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurgeResult {
    pub index: String,
    /// Ids sent to the remote delete call
    pub purged: usize,
}

/// Outcome of purging every index.
#[derive(Debug, Default)]
pub struct PurgeSummary {
    pub results: Vec<PurgeResult>,
    pub errors: Vec<(String, IndexingError)>,
}

impl PurgeSummary {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn total_purged(&self) -> usize {
        self.results.iter().map(|r| r.purged).sum()
    }
}

pub struct PurgeEngine {
    definitions: IndexDefinitions,
    storage: Arc<Storage>,
    client: Arc<dyn SearchIndexClient>,
    config: SyncConfig,
}

impl PurgeEngine {
    pub fn new(
        definitions: IndexDefinitions,
        storage: Arc<Storage>,
        client: Arc<dyn SearchIndexClient>,
        config: SyncConfig,
    ) -> Self {
        Self {
            definitions,
            storage,
            client,
            config,
        }
    }

    /// Purge the index registered as `name`.
    pub async fn purge_one(&self, name: &str) -> Result<PurgeResult, IndexingError> {
        let definition = self.definitions.require(name)?;
        self.purge_definition(definition).await
    }

    async fn purge_definition(
        &self,
        definition: &IndexDefinition,
    ) -> Result<PurgeResult, IndexingError> {
        let read = self.storage.pending_deletions(&definition.name)?;
        let ids: Vec<_> = read.iter().copied().filter(|id| *id != 0).collect();

        if ids.is_empty() {
            // Only falsy ids (or nothing) were logged; drop them without a call.
            self.storage.remove_deletions(&definition.name, &read)?;
            debug!(index = %definition.name, "Nothing to purge");
            return Ok(PurgeResult {
                index: definition.name.clone(),
                purged: 0,
            });
        }

        let remote_name = definition.remote_name(&self.config.index_prefix);
        self.client.delete_documents(&remote_name, &ids).await?;
        self.storage.remove_deletions(&definition.name, &read)?;

        info!(
            index = %definition.name,
            remote = %remote_name,
            purged = ids.len(),
            "Purge pass complete"
        );
        Ok(PurgeResult {
            index: definition.name.clone(),
            purged: ids.len(),
        })
    }

    /// Purge every index. One index failing does not stop the rest.
    pub async fn purge_all(&self) -> PurgeSummary {
        let mut summary = PurgeSummary::default();
        for definition in self.definitions.iter() {
            match self.purge_definition(definition).await {
                Ok(result) => summary.results.push(result),
                Err(e) => {
                    warn!(index = %definition.name, error = %e, "Purge pass failed");
                    summary.errors.push((definition.name.clone(), e));
                }
            }
        }
        summary
    }
}
