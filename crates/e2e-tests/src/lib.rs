//! End-to-end test infrastructure for search-sync.
//!
//! Provides a shared TestHarness wiring a real RocksDB tracking store to an
//! in-memory content source and a recording remote client, plus helpers
//! for building engines over a set of index declarations.

use std::sync::Arc;

use sync_indexing::{
    IndexDefinitions, IndexRegistry, MutationHooks, PurgeEngine, ReconcileEngine, SyncConfig,
};
use sync_remote::RecordingClient;
use sync_storage::Storage;
use sync_types::{ContentItem, IndexDeclaration, InMemoryContentSource, ItemId};

/// Prefix used for remote index names in every harness engine.
pub const TEST_PREFIX: &str = "e2e_";

/// Shared test harness for E2E tests.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// Tracking store
    pub storage: Arc<Storage>,
    /// Content the engines read
    pub content: Arc<InMemoryContentSource>,
    /// Records every remote call
    pub client: Arc<RecordingClient>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let storage =
            Arc::new(Storage::open(temp_dir.path()).expect("Failed to open test storage"));

        Self {
            _temp_dir: temp_dir,
            storage,
            content: Arc::new(InMemoryContentSource::new()),
            client: Arc::new(RecordingClient::new()),
        }
    }

    /// Sync config with the test prefix and the given batch limit.
    pub fn config(batch_limit: usize) -> SyncConfig {
        SyncConfig::default()
            .with_batch_limit(batch_limit)
            .with_index_prefix(TEST_PREFIX)
    }

    pub fn reconcile_engine(
        &self,
        definitions: &IndexDefinitions,
        batch_limit: usize,
    ) -> ReconcileEngine {
        ReconcileEngine::new(
            definitions.clone(),
            self.storage.clone(),
            self.content.clone(),
            self.client.clone(),
            Self::config(batch_limit),
        )
    }

    pub fn purge_engine(&self, definitions: &IndexDefinitions) -> PurgeEngine {
        PurgeEngine::new(
            definitions.clone(),
            self.storage.clone(),
            self.client.clone(),
            Self::config(100),
        )
    }

    pub fn hooks(&self, definitions: &IndexDefinitions) -> MutationHooks {
        MutationHooks::new(
            definitions.clone(),
            self.storage.clone(),
            self.content.clone(),
        )
    }

    /// Add a published item to the content source.
    pub fn publish(&self, id: ItemId, item_type: &str, title: &str) {
        self.content
            .put_item(ContentItem::new(id, item_type, title, "publish"));
    }

    /// Add `count` published items with ids `first..first + count`.
    pub fn publish_many(&self, first: ItemId, count: u64, item_type: &str) {
        for id in first..first + count {
            self.publish(id, item_type, &format!("{} {}", item_type, id));
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Register the declarations and normalize them.
pub fn define(declarations: Vec<(&str, IndexDeclaration)>) -> IndexDefinitions {
    let mut registry = IndexRegistry::new();
    for (name, declaration) in declarations {
        registry
            .register(name, declaration)
            .expect("Failed to register index");
    }
    registry
        .load_definitions()
        .expect("Failed to load definitions")
}

/// Remote index name for `index`.
pub fn remote(index: &str) -> String {
    format!("{}{}", TEST_PREFIX, index)
}

/// Object ids of every upserted document, in call order.
pub fn upserted_ids(client: &RecordingClient) -> Vec<String> {
    client
        .upserts()
        .into_iter()
        .flat_map(|(_, documents)| documents.into_iter().map(|d| d.object_id))
        .collect()
}
