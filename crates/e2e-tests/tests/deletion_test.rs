//! Mutation hook and purge E2E tests.

use pretty_assertions::assert_eq;

use e2e_tests::{define, remote, TestHarness};
use sync_remote::RemoteOperation;
use sync_types::IndexDeclaration;

#[tokio::test]
async fn test_delete_then_purge() {
    let harness = TestHarness::new();
    harness.publish(4, "post", "Doomed");
    let definitions = define(vec![("posts", IndexDeclaration::new())]);
    harness
        .reconcile_engine(&definitions, 100)
        .reindex_one("posts")
        .await
        .unwrap();
    assert!(harness.storage.get_tracking("posts", 4).unwrap().is_some());

    harness.hooks(&definitions).on_delete(4, Some("post")).unwrap();
    assert!(harness.storage.get_tracking("posts", 4).unwrap().is_none());
    assert_eq!(harness.storage.pending_deletions("posts").unwrap(), vec![4]);

    let result = harness.purge_engine(&definitions).purge_one("posts").await.unwrap();

    assert_eq!(result.purged, 1);
    assert_eq!(harness.client.deletes(), vec![(remote("posts"), vec![4])]);
    assert!(harness.storage.pending_deletions("posts").unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_hook_resolves_type() {
    let harness = TestHarness::new();
    harness.publish(9, "page", "About");
    let definitions = define(vec![
        ("pages", IndexDeclaration::new().source_type("page")),
        ("posts", IndexDeclaration::new()),
    ]);

    let affected = harness.hooks(&definitions).on_delete(9, None).unwrap();

    assert_eq!(affected, vec!["pages".to_string()]);
    assert_eq!(harness.storage.pending_deletions("pages").unwrap(), vec![9]);
    assert!(harness.storage.pending_deletions("posts").unwrap().is_empty());
}

#[tokio::test]
async fn test_unindexed_type_leaves_no_trace() {
    let harness = TestHarness::new();
    harness.publish(5, "attachment", "photo.jpg");
    let definitions = define(vec![
        ("posts", IndexDeclaration::new()),
        ("pages", IndexDeclaration::new().source_type("page")),
    ]);
    let hooks = harness.hooks(&definitions);

    assert!(hooks.on_save(5, "attachment", false).unwrap().is_empty());
    harness
        .reconcile_engine(&definitions, 100)
        .reindex_all()
        .await;
    assert!(hooks.on_delete(5, None).unwrap().is_empty());
    harness.purge_engine(&definitions).purge_all().await;

    assert!(harness.storage.stats().unwrap().indexes.is_empty());
    assert!(harness.client.calls().is_empty());
}

#[tokio::test]
async fn test_failed_purge_keeps_log() {
    let harness = TestHarness::new();
    let definitions = define(vec![("posts", IndexDeclaration::new())]);
    harness.hooks(&definitions).on_delete(3, Some("post")).unwrap();
    let engine = harness.purge_engine(&definitions);

    harness.client.fail(RemoteOperation::Delete);
    let summary = engine.purge_all().await;
    assert!(summary.has_errors());
    assert_eq!(harness.storage.pending_deletions("posts").unwrap(), vec![3]);

    harness.client.recover(RemoteOperation::Delete);
    let summary = engine.purge_all().await;
    assert_eq!(summary.total_purged(), 1);
    assert!(harness.storage.pending_deletions("posts").unwrap().is_empty());
}

#[tokio::test]
async fn test_purge_removes_only_what_it_read() {
    let harness = TestHarness::new();
    harness.storage.record_deletion("posts", 1).unwrap();
    harness.storage.record_deletion("posts", 2).unwrap();

    let read = harness.storage.pending_deletions("posts").unwrap();
    // A delete lands while the remote call is in flight.
    harness.storage.record_deletion("posts", 3).unwrap();
    harness.storage.remove_deletions("posts", &read).unwrap();

    assert_eq!(harness.storage.pending_deletions("posts").unwrap(), vec![3]);
}

#[tokio::test]
async fn test_save_after_delete_retracks() {
    let harness = TestHarness::new();
    harness.publish(6, "post", "Back again");
    let definitions = define(vec![("posts", IndexDeclaration::new())]);
    let hooks = harness.hooks(&definitions);

    hooks.on_delete(6, Some("post")).unwrap();
    hooks.on_save(6, "post", false).unwrap();

    let record = harness.storage.get_tracking("posts", 6).unwrap().unwrap();
    assert!(!record.synced);
    assert_eq!(harness.storage.pending_deletions("posts").unwrap(), vec![6]);
}
