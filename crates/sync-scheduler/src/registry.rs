//! Job status registry.
//!
//! Records when each job last ran, how long it took and how it ended, so
//! the daemon can report on its jobs at shutdown.

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// How a run ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobResult {
    Success,
    Failed(String),
    /// Not started, e.g. because the previous run was still active
    Skipped(String),
    TimedOut,
    /// Stopped by scheduler shutdown
    Cancelled,
}

/// Status of one registered job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_name: String,
    pub cron_expr: String,
    pub last_run: Option<DateTime<Utc>>,
    pub last_duration_ms: Option<u64>,
    pub last_result: Option<JobResult>,
    pub run_count: u64,
    pub error_count: u64,
    pub skip_count: u64,
    pub is_running: bool,
}

impl JobStatus {
    pub fn new(job_name: impl Into<String>, cron_expr: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            cron_expr: cron_expr.into(),
            last_run: None,
            last_duration_ms: None,
            last_result: None,
            run_count: 0,
            error_count: 0,
            skip_count: 0,
            is_running: false,
        }
    }
}

/// Thread-safe map of job name to status.
///
/// A poisoned lock is logged and the update dropped; status is advisory.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<BTreeMap<String, JobStatus>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, job_name: &str, f: impl FnOnce(&mut JobStatus)) {
        match self.jobs.write() {
            Ok(mut jobs) => {
                if let Some(status) = jobs.get_mut(job_name) {
                    f(status);
                }
            }
            Err(e) => warn!(job = %job_name, error = %e, "Job registry lock poisoned"),
        }
    }

    /// Register a job, replacing any previous status under the same name.
    pub fn register(&self, job_name: &str, cron_expr: &str) {
        match self.jobs.write() {
            Ok(mut jobs) => {
                jobs.insert(job_name.to_string(), JobStatus::new(job_name, cron_expr));
            }
            Err(e) => warn!(job = %job_name, error = %e, "Job registry lock poisoned"),
        }
    }

    pub fn record_start(&self, job_name: &str) {
        self.update(job_name, |status| {
            status.is_running = true;
            status.last_run = Some(Utc::now());
        });
    }

    pub fn record_complete(&self, job_name: &str, result: JobResult, duration_ms: u64) {
        self.update(job_name, |status| {
            status.is_running = false;
            status.last_duration_ms = Some(duration_ms);
            status.run_count += 1;
            if matches!(result, JobResult::Failed(_) | JobResult::TimedOut) {
                status.error_count += 1;
            }
            status.last_result = Some(result);
        });
    }

    pub fn record_skipped(&self, job_name: &str, reason: &str) {
        self.update(job_name, |status| {
            status.skip_count += 1;
            status.last_result = Some(JobResult::Skipped(reason.to_string()));
        });
    }

    pub fn get_status(&self, job_name: &str) -> Option<JobStatus> {
        self.jobs.read().ok()?.get(job_name).cloned()
    }

    /// Every job, in name order.
    pub fn get_all_status(&self) -> Vec<JobStatus> {
        self.jobs
            .read()
            .map(|jobs| jobs.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_running(&self, job_name: &str) -> bool {
        self.get_status(job_name).is_some_and(|s| s.is_running)
    }

    /// Whether any job is mid-run.
    pub fn any_running(&self) -> bool {
        self.get_all_status().iter().any(|s| s.is_running)
    }

    pub fn job_count(&self) -> usize {
        self.jobs.read().map(|jobs| jobs.len()).unwrap_or(0)
    }
}
