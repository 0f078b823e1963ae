//! # sync-types
//!
//! Shared domain types for the search index synchronization system.
//!
//! This crate defines the data model every other crate works with:
//! - Content: items read from the content database and the [`ContentSource`] seam
//! - Index declarations and normalized [`IndexDefinition`]s
//! - Documents: the flat JSON objects sent to the remote search index
//! - Tracking: per-index sync state and pending deletions
//! - Settings: layered configuration

pub mod config;
pub mod content;
pub mod document;
pub mod error;
pub mod index;
pub mod tracking;

pub use config::{ContentSettings, RemoteSettings, ScheduleSettings, Settings};
pub use content::{ContentItem, ContentSource, InMemoryContentSource, ItemId};
pub use document::IndexedDocument;
pub use error::SyncError;
pub use index::{
    BoxError, FieldCallback, FieldDeclaration, FieldSpec, IndexDeclaration, IndexDefinition,
    OneOrMany, DEFAULT_SOURCE_TYPE, DEFAULT_STATUS,
};
pub use tracking::{DeletionEntry, SyncKind, TrackingRecord};
