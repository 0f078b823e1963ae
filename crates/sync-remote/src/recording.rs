//! In-memory client that records every call.
//!
//! Used by tests where nothing should leave the process. Failures can be
//! injected per operation.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};

use sync_types::{IndexedDocument, ItemId};

use crate::client::SearchIndexClient;
use crate::error::RemoteError;

/// The three remote operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOperation {
    Upsert,
    Delete,
    Settings,
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    Upsert {
        index: String,
        documents: Vec<IndexedDocument>,
    },
    Delete {
        index: String,
        ids: Vec<ItemId>,
    },
    Settings {
        index: String,
        settings: Map<String, Value>,
    },
}

impl RemoteCall {
    pub fn index(&self) -> &str {
        match self {
            RemoteCall::Upsert { index, .. }
            | RemoteCall::Delete { index, .. }
            | RemoteCall::Settings { index, .. } => index,
        }
    }
}

/// Client recording calls instead of sending them.
///
/// Failed calls are not recorded.
#[derive(Debug, Default)]
pub struct RecordingClient {
    calls: Mutex<Vec<RemoteCall>>,
    failing: Mutex<HashSet<RemoteOperation>>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call of `operation` fail until reset.
    pub fn fail(&self, operation: RemoteOperation) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(operation);
        }
    }

    /// Stop failing `operation`.
    pub fn recover(&self, operation: RemoteOperation) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.remove(&operation);
        }
    }

    /// All recorded calls, oldest first.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Documents of every recorded upsert, in call order.
    pub fn upserts(&self) -> Vec<(String, Vec<IndexedDocument>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RemoteCall::Upsert { index, documents } => Some((index, documents)),
                _ => None,
            })
            .collect()
    }

    /// Ids of every recorded delete, in call order.
    pub fn deletes(&self) -> Vec<(String, Vec<ItemId>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RemoteCall::Delete { index, ids } => Some((index, ids)),
                _ => None,
            })
            .collect()
    }

    /// Payloads of every recorded settings push, in call order.
    pub fn settings_pushes(&self) -> Vec<(String, Map<String, Value>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RemoteCall::Settings { index, settings } => Some((index, settings)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    fn record(&self, operation: RemoteOperation, call: RemoteCall) -> Result<(), RemoteError> {
        let failing = self
            .failing
            .lock()
            .map_err(|e| RemoteError::Injected(e.to_string()))?
            .contains(&operation);
        if failing {
            return Err(RemoteError::Injected(format!(
                "{:?} on {}",
                operation,
                call.index()
            )));
        }
        self.calls
            .lock()
            .map_err(|e| RemoteError::Injected(e.to_string()))?
            .push(call);
        Ok(())
    }
}

#[async_trait]
impl SearchIndexClient for RecordingClient {
    async fn upsert_documents(
        &self,
        index_name: &str,
        documents: &[IndexedDocument],
    ) -> Result<(), RemoteError> {
        self.record(
            RemoteOperation::Upsert,
            RemoteCall::Upsert {
                index: index_name.to_string(),
                documents: documents.to_vec(),
            },
        )
    }

    async fn delete_documents(&self, index_name: &str, ids: &[ItemId]) -> Result<(), RemoteError> {
        self.record(
            RemoteOperation::Delete,
            RemoteCall::Delete {
                index: index_name.to_string(),
                ids: ids.to_vec(),
            },
        )
    }

    async fn set_index_settings(
        &self,
        index_name: &str,
        settings: &Map<String, Value>,
    ) -> Result<(), RemoteError> {
        self.record(
            RemoteOperation::Settings,
            RemoteCall::Settings {
                index: index_name.to_string(),
                settings: settings.clone(),
            },
        )
    }
}
