//! Sync engines for search-sync.
//!
//! This crate decides what to send to the remote search index and keeps
//! the tracking store consistent with what the remote service accepted.
//!
//! ## Key Components
//!
//! - [`IndexRegistry`]: explicit registration of index declarations, normalized
//!   once into immutable [`IndexDefinitions`]
//! - [`ObjectBuilder`]: turns a content item into a document, then runs
//!   [`DocumentHook`]s
//! - [`ReconcileEngine`]: diffs content against tracking state and upserts
//!   new and stale items, at most `batch_limit` per index per pass
//! - [`PurgeEngine`]: drains the deletion log with one delete call per index
//! - [`MutationHooks`]: save/delete entry points for the content layer
//!
//! ## Example
//!
//! ```ignore
//! use sync_indexing::{IndexRegistry, ReconcileEngine, SyncConfig};
//!
//! let mut registry = IndexRegistry::new();
//! registry.register("posts", IndexDeclaration::new().direct("post_title"))?;
//! let definitions = registry.load_definitions()?;
//!
//! let engine = ReconcileEngine::new(definitions, storage, content, client, SyncConfig::default());
//! let summary = engine.reindex_all().await;
//! ```

pub mod builder;
pub mod error;
pub mod hooks;
pub mod purge;
pub mod reconcile;
pub mod registry;

pub use builder::{DocumentHook, HookContext, ObjectBuilder};
pub use error::IndexingError;
pub use hooks::MutationHooks;
pub use purge::{PurgeEngine, PurgeResult, PurgeSummary};
pub use reconcile::{
    PassResult, ReconcileEngine, ReindexSummary, SyncCandidate, SyncConfig, SyncPlan,
};
pub use registry::{normalize, IndexDefinitions, IndexRegistry};
