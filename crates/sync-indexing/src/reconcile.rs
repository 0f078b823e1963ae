//! Reconciliation engine.
//!
//! One pass per index:
//! 1. list published candidates of the index's source types
//! 2. load the index's tracking records
//! 3. keep candidates with no record (new) or an unsynced record (stale)
//! 4. build up to `batch_limit` documents
//! 5. upsert them in one call, then push settings if the index has any
//! 6. mark exactly the dispatched items synced, unless a hook saved or
//!    deleted them after step 2
//!
//! A failed upsert aborts the pass before step 6, so the same items are
//! picked up again next pass.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use sync_remote::SearchIndexClient;
use sync_storage::Storage;
use sync_types::{ContentItem, ContentSource, IndexDefinition, ItemId, Settings, SyncKind};

use crate::builder::{DocumentHook, ObjectBuilder};
use crate::error::IndexingError;
use crate::registry::IndexDefinitions;

/// Configuration shared by the reconcile and purge engines.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Max documents dispatched per index per pass
    pub batch_limit: usize,
    /// Prepended to every index name to form the remote name
    pub index_prefix: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_limit: sync_types::config::DEFAULT_BATCH_LIMIT,
            index_prefix: String::new(),
        }
    }
}

impl SyncConfig {
    /// Set the batch limit. Zero is treated as one.
    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit.max(1);
        self
    }

    pub fn with_index_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.index_prefix = prefix.into();
        self
    }

    /// Build from settings; fails when remote credentials or prefix are missing.
    pub fn from_settings(settings: &Settings) -> Result<Self, IndexingError> {
        settings.remote.validate()?;
        Ok(Self::default()
            .with_batch_limit(settings.batch_limit)
            .with_index_prefix(settings.remote.index_prefix()?))
    }
}

/// A candidate that needs syncing, and why.
#[derive(Debug, Clone)]
pub struct SyncCandidate {
    pub item: ContentItem,
    pub kind: SyncKind,
}

/// Output of steps 1-3 of a pass.
#[derive(Debug, Clone)]
pub struct SyncPlan {
    pub index: String,
    /// Published items of the index's source types
    pub candidates: usize,
    /// Candidates that are new or stale, in listing order
    pub to_sync: Vec<SyncCandidate>,
    /// Taken before the tracking records were read
    pub planned_at: DateTime<Utc>,
}

/// Outcome of one reconciliation pass over one index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassResult {
    pub index: String,
    pub candidates: usize,
    pub eligible: usize,
    pub dispatched: usize,
    /// Items dropped by a hook or failing extraction
    pub skipped: usize,
    pub settings_pushed: bool,
}

/// Outcome of a pass over every index.
#[derive(Debug, Default)]
pub struct ReindexSummary {
    pub results: Vec<PassResult>,
    pub errors: Vec<(String, IndexingError)>,
}

impl ReindexSummary {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn total_dispatched(&self) -> usize {
        self.results.iter().map(|r| r.dispatched).sum()
    }
}

/// Reconciles content against tracking state and dispatches upserts.
pub struct ReconcileEngine {
    definitions: IndexDefinitions,
    storage: Arc<Storage>,
    content: Arc<dyn ContentSource>,
    client: Arc<dyn SearchIndexClient>,
    builder: ObjectBuilder,
    config: SyncConfig,
}

impl ReconcileEngine {
    pub fn new(
        definitions: IndexDefinitions,
        storage: Arc<Storage>,
        content: Arc<dyn ContentSource>,
        client: Arc<dyn SearchIndexClient>,
        config: SyncConfig,
    ) -> Self {
        let builder = ObjectBuilder::new(content.clone());
        Self {
            definitions,
            storage,
            content,
            client,
            builder,
            config,
        }
    }

    /// Register a document hook.
    pub fn with_hook(mut self, hook: Arc<dyn DocumentHook>) -> Self {
        self.builder.add_hook(hook);
        self
    }

    pub fn definitions(&self) -> &IndexDefinitions {
        &self.definitions
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Classify the candidates of one index against its tracking records.
    pub fn plan(&self, definition: &IndexDefinition) -> Result<SyncPlan, IndexingError> {
        let planned_at = Utc::now();
        let candidates = self
            .content
            .list_content_items(&definition.source_type_list(), &definition.statuses)?;
        let states = self.storage.tracking_states(&definition.name)?;

        let total = candidates.len();
        let to_sync: Vec<SyncCandidate> = candidates
            .into_iter()
            .filter(|item| item.id != 0)
            .filter_map(|item| match states.get(&item.id) {
                None => Some(SyncCandidate {
                    item,
                    kind: SyncKind::New,
                }),
                Some(false) => Some(SyncCandidate {
                    item,
                    kind: SyncKind::Stale,
                }),
                Some(true) => None,
            })
            .collect();

        debug!(
            index = %definition.name,
            candidates = total,
            eligible = to_sync.len(),
            "Planned reconciliation"
        );

        Ok(SyncPlan {
            index: definition.name.clone(),
            candidates: total,
            to_sync,
            planned_at,
        })
    }

    /// Run one pass over the index registered as `name`.
    pub async fn reindex_one(&self, name: &str) -> Result<PassResult, IndexingError> {
        let definition = self.definitions.require(name)?;
        self.reindex_definition(definition).await
    }

    async fn reindex_definition(
        &self,
        definition: &IndexDefinition,
    ) -> Result<PassResult, IndexingError> {
        let plan = self.plan(definition)?;
        let mut result = PassResult {
            index: definition.name.clone(),
            candidates: plan.candidates,
            eligible: plan.to_sync.len(),
            ..Default::default()
        };

        let mut documents = Vec::new();
        let mut dispatched: Vec<(ItemId, SyncKind)> = Vec::new();

        for candidate in &plan.to_sync {
            if documents.len() >= self.config.batch_limit {
                break;
            }
            match self.builder.build(&candidate.item, definition) {
                Ok(Some(document)) => {
                    documents.push(document);
                    dispatched.push((candidate.item.id, candidate.kind));
                }
                Ok(None) => result.skipped += 1,
                Err(e) => {
                    warn!(
                        index = %definition.name,
                        item_id = candidate.item.id,
                        error = %e,
                        "Skipping item"
                    );
                    result.skipped += 1;
                }
            }
        }

        let remote_name = definition.remote_name(&self.config.index_prefix);

        if !documents.is_empty() {
            self.client
                .upsert_documents(&remote_name, &documents)
                .await?;
            self.storage
                .mark_synced(&definition.name, &dispatched, plan.planned_at)?;
            result.dispatched = documents.len();
        }

        if definition.has_remote_settings() {
            self.client
                .set_index_settings(&remote_name, &definition.remote_settings)
                .await?;
            result.settings_pushed = true;
        }

        info!(
            index = %definition.name,
            remote = %remote_name,
            candidates = result.candidates,
            eligible = result.eligible,
            dispatched = result.dispatched,
            skipped = result.skipped,
            "Reindex pass complete"
        );
        Ok(result)
    }

    /// Run one pass over every index. One index failing does not stop the rest.
    pub async fn reindex_all(&self) -> ReindexSummary {
        let mut summary = ReindexSummary::default();
        for definition in self.definitions.iter() {
            match self.reindex_definition(definition).await {
                Ok(result) => summary.results.push(result),
                Err(e) => {
                    warn!(index = %definition.name, error = %e, "Reindex pass failed");
                    summary.errors.push((definition.name.clone(), e));
                }
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sync_remote::{RecordingClient, RemoteOperation};
    use sync_types::{IndexDeclaration, InMemoryContentSource};
    use tempfile::TempDir;

    use crate::registry::IndexRegistry;

    struct Fixture {
        content: Arc<InMemoryContentSource>,
        storage: Arc<Storage>,
        client: Arc<RecordingClient>,
        engine: ReconcileEngine,
        _temp_dir: TempDir,
    }

    fn fixture(registry: IndexRegistry, batch_limit: usize) -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(temp_dir.path()).unwrap());
        let content = Arc::new(InMemoryContentSource::new());
        let client = Arc::new(RecordingClient::new());
        let engine = ReconcileEngine::new(
            registry.load_definitions().unwrap(),
            storage.clone(),
            content.clone(),
            client.clone(),
            SyncConfig::default()
                .with_batch_limit(batch_limit)
                .with_index_prefix("test_"),
        );
        Fixture {
            content,
            storage,
            client,
            engine,
            _temp_dir: temp_dir,
        }
    }

    fn posts_registry() -> IndexRegistry {
        let mut registry = IndexRegistry::new();
        registry
            .register("posts", IndexDeclaration::new().direct("title"))
            .unwrap();
        registry
    }

    fn publish(content: &InMemoryContentSource, id: ItemId) {
        content.put_item(ContentItem::new(id, "post", format!("Post {id}"), "publish"));
    }

    #[test]
    fn test_plan_classifies_candidates() {
        let f = fixture(posts_registry(), 100);
        for id in 1..=3 {
            publish(&f.content, id);
        }
        f.storage.insert_tracking("posts", 1, true).unwrap();
        f.storage.insert_tracking("posts", 2, false).unwrap();

        let def = f.engine.definitions().require("posts").unwrap();
        let plan = f.engine.plan(def).unwrap();

        assert_eq!(plan.candidates, 3);
        let kinds: Vec<_> = plan.to_sync.iter().map(|c| (c.item.id, c.kind)).collect();
        assert_eq!(kinds, vec![(2, SyncKind::Stale), (3, SyncKind::New)]);
    }

    #[tokio::test]
    async fn test_new_item_synced() {
        let f = fixture(posts_registry(), 100);
        publish(&f.content, 7);

        let result = f.engine.reindex_one("posts").await.unwrap();

        assert_eq!(result.dispatched, 1);
        let upserts = f.client.upserts();
        assert_eq!(upserts.len(), 1);
        assert_eq!(upserts[0].0, "test_posts");
        assert_eq!(upserts[0].1[0].get("title"), Some(&json!("Post 7")));
        assert!(f.storage.get_tracking("posts", 7).unwrap().unwrap().synced);
    }

    #[tokio::test]
    async fn test_second_pass_is_idle() {
        let f = fixture(posts_registry(), 100);
        publish(&f.content, 1);
        publish(&f.content, 2);

        f.engine.reindex_one("posts").await.unwrap();
        let second = f.engine.reindex_one("posts").await.unwrap();

        assert_eq!(second.dispatched, 0);
        assert_eq!(f.client.upserts().len(), 1);
    }

    #[tokio::test]
    async fn test_batch_limit_leaves_rest_eligible() {
        let f = fixture(posts_registry(), 2);
        for id in 1..=5 {
            publish(&f.content, id);
        }

        let result = f.engine.reindex_one("posts").await.unwrap();
        assert_eq!(result.eligible, 5);
        assert_eq!(result.dispatched, 2);

        let states = f.storage.tracking_states("posts").unwrap();
        assert_eq!(states.len(), 2);

        let def = f.engine.definitions().require("posts").unwrap();
        assert_eq!(f.engine.plan(def).unwrap().to_sync.len(), 3);
    }

    #[tokio::test]
    async fn test_failed_upsert_marks_nothing() {
        let f = fixture(posts_registry(), 100);
        publish(&f.content, 1);
        f.storage.insert_tracking("posts", 2, false).unwrap();
        publish(&f.content, 2);
        f.client.fail(RemoteOperation::Upsert);

        let err = f.engine.reindex_one("posts").await.unwrap_err();
        assert!(matches!(err, IndexingError::Remote(_)));
        assert!(f.storage.get_tracking("posts", 1).unwrap().is_none());
        assert!(!f.storage.get_tracking("posts", 2).unwrap().unwrap().synced);

        f.client.recover(RemoteOperation::Upsert);
        let result = f.engine.reindex_one("posts").await.unwrap();
        assert_eq!(result.dispatched, 2);
    }

    #[tokio::test]
    async fn test_settings_pushed_without_documents() {
        let mut registry = IndexRegistry::new();
        registry
            .register(
                "posts",
                IndexDeclaration::new().settings(json!({"searchableAttributes": ["title"]})),
            )
            .unwrap();
        let f = fixture(registry, 100);

        let result = f.engine.reindex_one("posts").await.unwrap();
        assert_eq!(result.dispatched, 0);
        assert!(result.settings_pushed);

        let pushes = f.client.settings_pushes();
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0].0, "test_posts");
        assert_eq!(pushes[0].1.get("searchableAttributes"), Some(&json!(["title"])));
    }

    #[tokio::test]
    async fn test_extraction_failure_skips_item() {
        let mut registry = IndexRegistry::new();
        registry
            .register(
                "posts",
                IndexDeclaration::new().callback("score", |id, _| {
                    if id == 2 {
                        Err("no score".into())
                    } else {
                        Ok(json!(id * 10))
                    }
                }),
            )
            .unwrap();
        let f = fixture(registry, 100);
        for id in 1..=3 {
            publish(&f.content, id);
        }

        let result = f.engine.reindex_one("posts").await.unwrap();
        assert_eq!(result.dispatched, 2);
        assert_eq!(result.skipped, 1);
        assert!(f.storage.get_tracking("posts", 2).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reindex_all_isolates_failures() {
        let mut registry = IndexRegistry::new();
        registry
            .register(
                "pages",
                IndexDeclaration::new()
                    .source_type("page")
                    .settings(json!({"hitsPerPage": 5})),
            )
            .unwrap()
            .register("posts", IndexDeclaration::new())
            .unwrap();
        let f = fixture(registry, 100);
        publish(&f.content, 1);
        f.content
            .put_item(ContentItem::new(2, "page", "About", "publish"));
        f.client.fail(RemoteOperation::Settings);

        let summary = f.engine.reindex_all().await;

        assert!(summary.has_errors());
        assert_eq!(summary.errors[0].0, "pages");
        assert_eq!(summary.results.len(), 1);
        assert_eq!(summary.results[0].index, "posts");
        // The page upsert was accepted before the settings push failed
        assert!(f.storage.get_tracking("pages", 2).unwrap().unwrap().synced);
        assert_eq!(summary.total_dispatched(), 1);
    }

    #[tokio::test]
    async fn test_unknown_index() {
        let f = fixture(posts_registry(), 100);
        assert!(matches!(
            f.engine.reindex_one("nope").await,
            Err(IndexingError::UnknownIndex(_))
        ));
    }

    #[test]
    fn test_sync_config_from_settings() {
        let mut settings = Settings::default();
        assert!(matches!(
            SyncConfig::from_settings(&settings),
            Err(IndexingError::Config(_))
        ));

        settings.batch_limit = 10;
        settings.remote.app_id = Some("APP".into());
        settings.remote.api_key_admin = Some("key".into());
        settings.remote.db_prefix = Some("prod_".into());
        let config = SyncConfig::from_settings(&settings).unwrap();
        assert_eq!(config.batch_limit, 10);
        assert_eq!(config.index_prefix, "prod_");
    }
}
