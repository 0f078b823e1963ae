//! Periodic reindex job.
//!
//! Each run reconciles every registered index against the content source.
//! An index failing is logged and reported as a job failure, but does not
//! stop the other indexes in the same run.

use std::sync::Arc;

use tracing::{info, warn};

use sync_indexing::{ReconcileEngine, ReindexSummary};

use crate::jobs::{acquire_engine, EngineSource, SyncJobConfig};
use crate::{JitterConfig, OverlapPolicy, SchedulerError, SchedulerService, TimeoutConfig};

/// Job name in the registry
pub const REINDEX_JOB_NAME: &str = "reindex_all";

/// Register the reindex job with the scheduler.
///
/// Uses OverlapPolicy::Skip so a slow pass is never run twice at once.
/// The engine is acquired from `source` at the start of every run and
/// dropped when the run ends.
pub async fn create_reindex_job<S>(
    scheduler: &SchedulerService,
    source: S,
    config: &SyncJobConfig,
) -> Result<(), SchedulerError>
where
    S: EngineSource<ReconcileEngine>,
{
    let source = Arc::new(source);
    scheduler
        .register_job(
            REINDEX_JOB_NAME,
            &config.reindex_cron,
            Some(&config.timezone),
            OverlapPolicy::Skip,
            JitterConfig::new(config.jitter_secs),
            TimeoutConfig::new(config.timeout_secs),
            move || {
                let source = source.clone();
                async move {
                    let engine: Arc<ReconcileEngine> = acquire_engine(source).await?;
                    run_reindex(&engine).await
                }
            },
        )
        .await?;

    info!(cron = %config.reindex_cron, "Registered reindex job");
    Ok(())
}

async fn run_reindex(engine: &ReconcileEngine) -> Result<(), String> {
    let summary = engine.reindex_all().await;
    report(&summary)
}

fn report(summary: &ReindexSummary) -> Result<(), String> {
    info!(
        indexes = summary.results.len(),
        dispatched = summary.total_dispatched(),
        failed = summary.errors.len(),
        "Reindex run complete"
    );

    if !summary.has_errors() {
        return Ok(());
    }
    for (index, e) in &summary.errors {
        warn!(index = %index, error = %e, "Index failed to reindex");
    }
    Err(summary
        .errors
        .iter()
        .map(|(index, e)| format!("{index}: {e}"))
        .collect::<Vec<_>>()
        .join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_indexing::{IndexRegistry, IndexingError, PassResult, SyncConfig};
    use sync_remote::RecordingClient;
    use sync_storage::Storage;
    use sync_types::{ContentItem, IndexDeclaration, InMemoryContentSource};
    use tempfile::TempDir;

    use crate::SchedulerConfig;

    fn engine() -> (Arc<ReconcileEngine>, Arc<RecordingClient>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(temp_dir.path()).unwrap());
        let content = Arc::new(InMemoryContentSource::new());
        content.put_item(ContentItem::new(1, "post", "Hello", "publish"));
        let client = Arc::new(RecordingClient::new());

        let mut registry = IndexRegistry::new();
        registry.register("posts", IndexDeclaration::new()).unwrap();

        let engine = ReconcileEngine::new(
            registry.load_definitions().unwrap(),
            storage,
            content,
            client.clone(),
            SyncConfig::default(),
        );
        (Arc::new(engine), client, temp_dir)
    }

    #[tokio::test]
    async fn test_run_reindex_dispatches() {
        let (engine, client, _temp) = engine();
        assert!(run_reindex(&engine).await.is_ok());
        assert_eq!(client.upserts().len(), 1);
    }

    #[test]
    fn test_report_joins_errors() {
        let summary = ReindexSummary {
            results: vec![PassResult {
                index: "posts".to_string(),
                ..Default::default()
            }],
            errors: vec![(
                "pages".to_string(),
                IndexingError::Content("db locked".to_string()),
            )],
        };

        let err = report(&summary).unwrap_err();
        assert!(err.starts_with("pages: "));
        assert!(err.contains("db locked"));
    }

    /// Opens the tracking store for every run.
    struct StoreOnDemand {
        path: std::path::PathBuf,
        content: Arc<InMemoryContentSource>,
        client: Arc<RecordingClient>,
    }

    impl EngineSource<ReconcileEngine> for StoreOnDemand {
        fn acquire(&self) -> Result<Arc<ReconcileEngine>, String> {
            let storage = Storage::open(&self.path).map_err(|e| e.to_string())?;
            let mut registry = IndexRegistry::new();
            registry.register("posts", IndexDeclaration::new()).unwrap();
            Ok(Arc::new(ReconcileEngine::new(
                registry.load_definitions().unwrap(),
                Arc::new(storage),
                self.content.clone(),
                self.client.clone(),
                SyncConfig::default(),
            )))
        }
    }

    #[tokio::test]
    async fn test_store_released_between_runs() {
        let temp_dir = TempDir::new().unwrap();
        let content = Arc::new(InMemoryContentSource::new());
        content.put_item(ContentItem::new(1, "post", "Hello", "publish"));
        let client = Arc::new(RecordingClient::new());
        let source = Arc::new(StoreOnDemand {
            path: temp_dir.path().to_path_buf(),
            content,
            client: client.clone(),
        });

        let engine: Arc<ReconcileEngine> = acquire_engine(source.clone()).await.unwrap();
        run_reindex(&engine).await.unwrap();
        drop(engine);

        // Another process can use the store once the run is over
        {
            let storage = Storage::open(temp_dir.path()).unwrap();
            assert!(storage.get_tracking("posts", 1).unwrap().unwrap().synced);

            let err = acquire_engine::<ReconcileEngine, _>(source.clone())
                .await
                .err()
                .unwrap();
            assert!(err.contains("locked"), "unexpected error: {err}");
        }

        let engine: Arc<ReconcileEngine> = acquire_engine(source).await.unwrap();
        run_reindex(&engine).await.unwrap();
        assert_eq!(client.upserts().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_reindex_job_registers() {
        let (engine, _client, _temp) = engine();
        let scheduler = SchedulerService::new(SchedulerConfig::default())
            .await
            .unwrap();

        create_reindex_job(&scheduler, engine, &SyncJobConfig::default())
            .await
            .unwrap();

        let status = scheduler.registry().get_status(REINDEX_JOB_NAME).unwrap();
        assert_eq!(status.cron_expr, "0 */5 * * * *");
    }
}
