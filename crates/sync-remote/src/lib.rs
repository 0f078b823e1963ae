//! Remote search index clients.
//!
//! The sync engine talks to the remote service through
//! [`SearchIndexClient`], which has exactly three calls: upsert a batch of
//! documents, delete a batch of ids and replace the index settings.
//!
//! Implementations:
//! - [`AlgoliaClient`]: REST client with retry on transient failures
//! - [`RecordingClient`]: in-memory recorder with failure injection

mod algolia;
mod client;
mod error;
mod recording;

pub use algolia::{AlgoliaClient, AlgoliaConfig};
pub use client::SearchIndexClient;
pub use error::RemoteError;
pub use recording::{RecordingClient, RemoteCall, RemoteOperation};
