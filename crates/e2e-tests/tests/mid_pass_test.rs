//! Mutation hooks that land while a reconcile pass is in flight.
//!
//! A document hook fires the save or delete hook during the build step,
//! i.e. after the pass read its tracking records and before bookkeeping.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;

use e2e_tests::{define, remote, upserted_ids, TestHarness};
use sync_indexing::{DocumentHook, HookContext, MutationHooks};
use sync_types::{BoxError, IndexDeclaration, IndexedDocument, ItemId};

#[derive(Clone, Copy)]
enum Mutation {
    Save,
    Delete,
}

struct MutateDuringBuild {
    hooks: MutationHooks,
    target: ItemId,
    mutation: Mutation,
    fired: AtomicBool,
}

impl MutateDuringBuild {
    fn new(hooks: MutationHooks, target: ItemId, mutation: Mutation) -> Arc<Self> {
        Arc::new(Self {
            hooks,
            target,
            mutation,
            fired: AtomicBool::new(false),
        })
    }
}

impl DocumentHook for MutateDuringBuild {
    fn name(&self) -> &str {
        "mutate_during_build"
    }

    fn apply(
        &self,
        document: IndexedDocument,
        ctx: &HookContext<'_>,
    ) -> Result<Option<IndexedDocument>, BoxError> {
        if ctx.item.id == self.target && !self.fired.swap(true, Ordering::SeqCst) {
            match self.mutation {
                Mutation::Save => {
                    self.hooks.on_save(ctx.item.id, &ctx.item.item_type, true)?;
                }
                Mutation::Delete => {
                    self.hooks.on_delete(ctx.item.id, Some(&ctx.item.item_type))?;
                }
            }
        }
        Ok(Some(document))
    }
}

#[tokio::test]
async fn test_save_during_pass_keeps_item_stale() {
    let harness = TestHarness::new();
    harness.publish_many(1, 3, "post");
    let definitions = define(vec![("posts", IndexDeclaration::new())]);
    harness.storage.insert_tracking("posts", 2, false).unwrap();

    let hook = MutateDuringBuild::new(harness.hooks(&definitions), 2, Mutation::Save);
    let engine = harness
        .reconcile_engine(&definitions, 100)
        .with_hook(hook);

    let result = engine.reindex_one("posts").await.unwrap();
    assert_eq!(result.dispatched, 3);

    assert!(harness.storage.get_tracking("posts", 1).unwrap().unwrap().synced);
    assert!(!harness.storage.get_tracking("posts", 2).unwrap().unwrap().synced);
    assert!(harness.storage.get_tracking("posts", 3).unwrap().unwrap().synced);

    // The edit is shipped by the next pass
    harness.client.clear();
    let next = engine.reindex_one("posts").await.unwrap();
    assert_eq!(next.dispatched, 1);
    assert_eq!(upserted_ids(&harness.client), vec!["2".to_string()]);
    assert!(harness.storage.get_tracking("posts", 2).unwrap().unwrap().synced);
}

#[tokio::test]
async fn test_delete_during_pass_leaves_new_item_untracked() {
    let harness = TestHarness::new();
    harness.publish_many(1, 2, "post");
    let definitions = define(vec![("posts", IndexDeclaration::new())]);

    let hook = MutateDuringBuild::new(harness.hooks(&definitions), 2, Mutation::Delete);
    let engine = harness
        .reconcile_engine(&definitions, 100)
        .with_hook(hook);

    let result = engine.reindex_one("posts").await.unwrap();
    assert_eq!(result.dispatched, 2);

    assert!(harness.storage.get_tracking("posts", 1).unwrap().unwrap().synced);
    assert!(harness.storage.get_tracking("posts", 2).unwrap().is_none());
    assert_eq!(harness.storage.pending_deletions("posts").unwrap(), vec![2]);

    // Purge retracts the document that raced the delete
    harness.content.remove_item(2);
    let purge = harness.purge_engine(&definitions);
    let summary = purge.purge_all().await;
    assert!(summary.errors.is_empty());
    assert_eq!(
        harness.client.deletes(),
        vec![(remote("posts"), vec![2])]
    );
    assert!(harness.storage.get_tracking("posts", 2).unwrap().is_none());
    assert!(harness.storage.pending_deletions("posts").unwrap().is_empty());
}
