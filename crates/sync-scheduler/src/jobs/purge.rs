//! Periodic purge job: sends logged deletions to the remote service.

use std::sync::Arc;

use tracing::{info, warn};

use sync_indexing::PurgeEngine;

use crate::jobs::{acquire_engine, EngineSource, SyncJobConfig};
use crate::{JitterConfig, OverlapPolicy, SchedulerError, SchedulerService, TimeoutConfig};

/// Job name in the registry
pub const PURGE_JOB_NAME: &str = "purge_all";

/// Register the purge job with the scheduler.
pub async fn create_purge_job<S>(
    scheduler: &SchedulerService,
    source: S,
    config: &SyncJobConfig,
) -> Result<(), SchedulerError>
where
    S: EngineSource<PurgeEngine>,
{
    let source = Arc::new(source);
    scheduler
        .register_job(
            PURGE_JOB_NAME,
            &config.purge_cron,
            Some(&config.timezone),
            OverlapPolicy::Skip,
            JitterConfig::new(config.jitter_secs),
            TimeoutConfig::new(config.timeout_secs),
            move || {
                let source = source.clone();
                async move {
                    let engine: Arc<PurgeEngine> = acquire_engine(source).await?;
                    run_purge(&engine).await
                }
            },
        )
        .await?;

    info!(cron = %config.purge_cron, "Registered purge job");
    Ok(())
}

async fn run_purge(engine: &PurgeEngine) -> Result<(), String> {
    let summary = engine.purge_all().await;
    info!(
        indexes = summary.results.len(),
        purged = summary.total_purged(),
        failed = summary.errors.len(),
        "Purge run complete"
    );

    if !summary.has_errors() {
        return Ok(());
    }
    for (index, e) in &summary.errors {
        warn!(index = %index, error = %e, "Index failed to purge");
    }
    Err(format!("{} index(es) failed to purge", summary.errors.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_indexing::{IndexRegistry, SyncConfig};
    use sync_remote::{RecordingClient, RemoteOperation};
    use sync_storage::Storage;
    use sync_types::IndexDeclaration;
    use tempfile::TempDir;

    fn engine() -> (Arc<PurgeEngine>, Arc<Storage>, Arc<RecordingClient>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(temp_dir.path()).unwrap());
        let client = Arc::new(RecordingClient::new());

        let mut registry = IndexRegistry::new();
        registry.register("posts", IndexDeclaration::new()).unwrap();

        let engine = PurgeEngine::new(
            registry.load_definitions().unwrap(),
            storage.clone(),
            client.clone(),
            SyncConfig::default(),
        );
        (Arc::new(engine), storage, client, temp_dir)
    }

    #[tokio::test]
    async fn test_run_purge() {
        let (engine, storage, client, _temp) = engine();
        storage.record_deletion("posts", 12).unwrap();

        assert!(run_purge(&engine).await.is_ok());
        assert_eq!(client.deletes(), vec![("posts".to_string(), vec![12])]);
    }

    #[tokio::test]
    async fn test_run_purge_reports_failure() {
        let (engine, storage, client, _temp) = engine();
        storage.record_deletion("posts", 12).unwrap();
        client.fail(RemoteOperation::Delete);

        let err = run_purge(&engine).await.unwrap_err();
        assert!(err.contains("1 index"));
        assert_eq!(storage.pending_deletions("posts").unwrap(), vec![12]);
    }
}
