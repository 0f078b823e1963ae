//! Sync jobs registered with the scheduler.
//!
//! - **reindex**: runs a reconcile pass over every registered index
//! - **purge**: drains the deletion log of every registered index
//!
//! Both share [`SyncJobConfig`], built from the `[schedule]` settings.

pub mod purge;
pub mod reindex;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use sync_types::ScheduleSettings;

pub use purge::create_purge_job;
pub use reindex::create_reindex_job;

/// Hands a job run the engine it works with.
///
/// Called once per run on a blocking thread. An implementation may open
/// the tracking store here, in which case the store stays closed between
/// runs and other processes can use it.
pub trait EngineSource<E>: Send + Sync + 'static {
    fn acquire(&self) -> Result<Arc<E>, String>;
}

/// A long-lived engine shared by every run.
impl<E: Send + Sync + 'static> EngineSource<E> for Arc<E> {
    fn acquire(&self) -> Result<Arc<E>, String> {
        Ok(self.clone())
    }
}

/// Acquire an engine without blocking the runtime.
pub(crate) async fn acquire_engine<E, S>(source: Arc<S>) -> Result<Arc<E>, String>
where
    E: Send + Sync + 'static,
    S: EngineSource<E>,
{
    tokio::task::spawn_blocking(move || <S as EngineSource<E>>::acquire(&source))
        .await
        .map_err(|e| format!("engine task failed: {e}"))?
}

/// Schedule of the two sync jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncJobConfig {
    /// Cron expression for reindexing (default: "0 */5 * * * *")
    pub reindex_cron: String,

    /// Cron expression for purging (default: "30 */5 * * * *")
    pub purge_cron: String,

    /// Timezone (default: "UTC")
    pub timezone: String,

    /// Max jitter in seconds (default: 0)
    pub jitter_secs: u64,

    /// Timeout in seconds, 0 disables it (default: 300)
    pub timeout_secs: u64,
}

impl Default for SyncJobConfig {
    fn default() -> Self {
        Self::from_settings(&ScheduleSettings::default())
    }
}

impl SyncJobConfig {
    pub fn from_settings(settings: &ScheduleSettings) -> Self {
        Self {
            reindex_cron: settings.reindex_cron.clone(),
            purge_cron: settings.purge_cron.clone(),
            timezone: settings.timezone.clone(),
            jitter_secs: settings.jitter_secs,
            timeout_secs: settings.timeout_secs,
        }
    }
}
