//! Scheduled passes driving the engines.

use std::sync::Arc;
use std::time::Duration;

use e2e_tests::{define, TestHarness};
use sync_scheduler::{
    create_purge_job, create_reindex_job, SchedulerConfig, SchedulerService, SyncJobConfig,
};
use sync_types::IndexDeclaration;

#[tokio::test(flavor = "multi_thread")]
async fn test_scheduled_reindex_and_purge() {
    let harness = TestHarness::new();
    harness.publish_many(1, 3, "post");
    harness.storage.record_deletion("posts", 99).unwrap();
    let definitions = define(vec![("posts", IndexDeclaration::new())]);

    let reconcile = Arc::new(harness.reconcile_engine(&definitions, 100));
    let purge = Arc::new(harness.purge_engine(&definitions));

    let jobs = SyncJobConfig {
        reindex_cron: "* * * * * *".to_string(),
        purge_cron: "* * * * * *".to_string(),
        timeout_secs: 10,
        ..Default::default()
    };

    let mut scheduler = SchedulerService::new(SchedulerConfig::default().with_shutdown_timeout(5))
        .await
        .unwrap();
    create_reindex_job(&scheduler, reconcile, &jobs).await.unwrap();
    create_purge_job(&scheduler, purge, &jobs).await.unwrap();
    assert_eq!(scheduler.registry().job_count(), 2);

    scheduler.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    scheduler.shutdown().await.unwrap();

    for id in 1..=3 {
        assert!(harness.storage.get_tracking("posts", id).unwrap().unwrap().synced);
    }
    assert!(harness.storage.pending_deletions("posts").unwrap().is_empty());

    let registry = scheduler.registry();
    for status in registry.get_all_status() {
        assert!(status.run_count >= 1, "{} never ran", status.job_name);
        assert_eq!(status.error_count, 0);
    }
}
