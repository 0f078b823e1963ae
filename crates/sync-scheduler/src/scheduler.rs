//! Scheduler service wrapper around tokio-cron-scheduler.
//!
//! Provides lifecycle management for the periodic sync passes with
//! graceful shutdown support.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono_tz::Tz;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    JitterConfig, JobRegistry, JobResult, OverlapGuard, OverlapPolicy, SchedulerConfig,
    SchedulerError, TimeoutConfig,
};

/// Validate a 6-field cron expression (seconds first).
///
/// ```
/// use sync_scheduler::validate_cron_expression;
///
/// assert!(validate_cron_expression("0 */5 * * * *").is_ok());
/// assert!(validate_cron_expression("every five minutes").is_err());
/// ```
pub fn validate_cron_expression(expr: &str) -> Result<(), SchedulerError> {
    match Job::new_async(expr, |_uuid, _lock| Box::pin(async {})) {
        Ok(_) => Ok(()),
        Err(e) => Err(SchedulerError::InvalidCron(format!("'{}': {}", expr, e))),
    }
}

/// Run one tick of a job: overlap check, jitter, then the job under
/// timeout and cancellation. Records the outcome in `registry`.
pub(crate) async fn execute_job<F, Fut>(
    name: &str,
    registry: &JobRegistry,
    guard: &OverlapGuard,
    token: &CancellationToken,
    jitter: JitterConfig,
    timeout: TimeoutConfig,
    job_fn: F,
) -> JobResult
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<(), String>>,
{
    let Some(_run) = guard.try_acquire() else {
        info!(job = %name, "Previous run still active, skipping");
        registry.record_skipped(name, "previous run still active");
        return JobResult::Skipped("previous run still active".to_string());
    };

    tokio::select! {
        _ = token.cancelled() => return JobResult::Cancelled,
        _ = jitter.sleep() => {}
    }

    registry.record_start(name);
    info!(job = %name, "Job started");
    let start = Instant::now();

    let run = async {
        match timeout.duration() {
            Some(limit) => match tokio::time::timeout(limit, job_fn()).await {
                Ok(outcome) => outcome.map_or_else(JobResult::Failed, |_| JobResult::Success),
                Err(_) => JobResult::TimedOut,
            },
            None => job_fn()
                .await
                .map_or_else(JobResult::Failed, |_| JobResult::Success),
        }
    };

    let result = tokio::select! {
        _ = token.cancelled() => JobResult::Cancelled,
        result = run => result,
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    match &result {
        JobResult::Success => info!(job = %name, duration_ms, "Job completed"),
        JobResult::Failed(reason) => error!(job = %name, duration_ms, error = %reason, "Job failed"),
        JobResult::TimedOut => warn!(job = %name, duration_ms, "Job timed out"),
        other => debug!(job = %name, duration_ms, result = ?other, "Job ended"),
    }
    registry.record_complete(name, result.clone(), duration_ms);
    result
}

/// Service wrapper around JobScheduler for lifecycle management.
pub struct SchedulerService {
    scheduler: JobScheduler,
    config: SchedulerConfig,
    shutdown_token: CancellationToken,
    registry: Arc<JobRegistry>,
    is_running: AtomicBool,
}

impl SchedulerService {
    /// Create the service. Jobs only run after [`start`](Self::start).
    pub async fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        config.parse_timezone()?;

        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            config,
            shutdown_token: CancellationToken::new(),
            registry: Arc::new(JobRegistry::new()),
            is_running: AtomicBool::new(false),
        })
    }

    pub async fn start(&self) -> Result<(), SchedulerError> {
        if self.is_running.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.scheduler.start().await?;
        info!(jobs = self.registry.job_count(), "Scheduler started");
        Ok(())
    }

    /// Cancel running jobs, wait for them up to the shutdown timeout, then
    /// stop the scheduler.
    pub async fn shutdown(&mut self) -> Result<(), SchedulerError> {
        if !self.is_running.load(Ordering::SeqCst) {
            return Err(SchedulerError::NotRunning);
        }

        info!("Initiating scheduler shutdown");
        self.shutdown_token.cancel();

        let deadline = Instant::now() + Duration::from_secs(self.config.shutdown_timeout_secs);
        while self.registry.any_running() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        if self.registry.any_running() {
            warn!("Jobs still running at shutdown deadline");
        }

        if let Err(e) = self.scheduler.shutdown().await {
            warn!("Error during scheduler shutdown: {}", e);
        }

        self.is_running.store(false, Ordering::SeqCst);
        info!("Scheduler shutdown complete");
        Ok(())
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub fn registry(&self) -> Arc<JobRegistry> {
        self.registry.clone()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Parse an IANA timezone name.
    pub fn parse_timezone(tz_str: &str) -> Result<Tz, SchedulerError> {
        tz_str
            .parse()
            .map_err(|_| SchedulerError::InvalidTimezone(tz_str.to_string()))
    }

    /// Register a cron job.
    ///
    /// Each tick applies `overlap`, sleeps for a random `jitter`, and runs
    /// `job_fn` bounded by `timeout`. Shutdown cancels a run in progress.
    /// `timezone` falls back to the configured default.
    #[allow(clippy::too_many_arguments)]
    pub async fn register_job<F, Fut>(
        &self,
        name: &str,
        cron_expr: &str,
        timezone: Option<&str>,
        overlap: OverlapPolicy,
        jitter: JitterConfig,
        timeout: TimeoutConfig,
        job_fn: F,
    ) -> Result<Uuid, SchedulerError>
    where
        F: Fn() -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        let tz: Tz = match timezone {
            Some(tz_str) => Self::parse_timezone(tz_str)?,
            None => self.config.parse_timezone()?,
        };
        validate_cron_expression(cron_expr)?;

        self.registry.register(name, cron_expr);

        let job_name = name.to_string();
        let registry = self.registry.clone();
        let guard = OverlapGuard::new(overlap);
        let token = self.shutdown_token.clone();

        let job = Job::new_async_tz(cron_expr, tz, move |_uuid, _lock| {
            let name = job_name.clone();
            let registry = registry.clone();
            let guard = guard.clone();
            let token = token.clone();
            let job_fn = job_fn.clone();

            Box::pin(async move {
                execute_job(&name, &registry, &guard, &token, jitter, timeout, job_fn).await;
            })
        })
        .map_err(|e| SchedulerError::InvalidCron(e.to_string()))?;

        let uuid = self.scheduler.add(job).await?;
        info!(
            job = %name,
            uuid = %uuid,
            cron = %cron_expr,
            timezone = %tz.name(),
            overlap = ?overlap,
            jitter_secs = jitter.max_jitter_secs,
            timeout_secs = timeout.timeout_secs,
            "Job registered"
        );
        Ok(uuid)
    }
}
