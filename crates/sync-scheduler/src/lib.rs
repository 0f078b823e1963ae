//! Scheduling of the periodic sync passes.
//!
//! Wraps `tokio-cron-scheduler` with timezone support, graceful shutdown,
//! overlap prevention, jitter and per-run timeouts, and registers the two
//! periodic entry points: reindex every index and purge every index.
//!
//! # Example
//!
//! ```ignore
//! use sync_scheduler::{SchedulerService, SchedulerConfig, create_reindex_job, SyncJobConfig};
//!
//! let scheduler = SchedulerService::new(SchedulerConfig::default()).await?;
//! let jobs = SyncJobConfig::default();
//! create_reindex_job(&scheduler, reconcile_engine, &jobs).await?;
//! create_purge_job(&scheduler, purge_engine, &jobs).await?;
//! scheduler.start().await?;
//! ```

mod config;
mod error;
mod jitter;
mod overlap;
mod registry;
mod scheduler;
mod timeout;

#[cfg(feature = "jobs")]
pub mod jobs;

pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use jitter::JitterConfig;
pub use overlap::{OverlapGuard, OverlapPolicy, RunGuard};
pub use registry::{JobRegistry, JobResult, JobStatus};
pub use scheduler::{validate_cron_expression, SchedulerService};
pub use timeout::TimeoutConfig;

#[cfg(feature = "jobs")]
pub use jobs::{create_purge_job, create_reindex_job, EngineSource, SyncJobConfig};
