//! Overlap policy for scheduled runs.
//!
//! A reindex pass that outlives its cron interval must not be joined by a
//! second pass over the same indexes; with [`OverlapPolicy::Skip`] the later
//! tick is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// What to do when a run is due while the previous one is still active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OverlapPolicy {
    /// Drop the new run
    #[default]
    Skip,
    /// Start it anyway
    Concurrent,
}

/// Tracks whether a job is running.
#[derive(Debug, Clone)]
pub struct OverlapGuard {
    running: Arc<AtomicBool>,
    policy: OverlapPolicy,
}

impl OverlapGuard {
    pub fn new(policy: OverlapPolicy) -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            policy,
        }
    }

    /// `None` when the run must be skipped.
    pub fn try_acquire(&self) -> Option<RunGuard> {
        match self.policy {
            OverlapPolicy::Skip => self
                .running
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .ok()
                .map(|_| RunGuard {
                    flag: Some(self.running.clone()),
                }),
            OverlapPolicy::Concurrent => Some(RunGuard { flag: None }),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn policy(&self) -> OverlapPolicy {
        self.policy
    }
}

/// Clears the running flag on drop, including when the run panics.
pub struct RunGuard {
    flag: Option<Arc<AtomicBool>>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if let Some(flag) = &self.flag {
            flag.store(false, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_blocks_second_run() {
        let guard = OverlapGuard::new(OverlapPolicy::Skip);

        let first = guard.try_acquire();
        assert!(first.is_some());
        assert!(guard.is_running());
        assert!(guard.try_acquire().is_none());

        drop(first);
        assert!(!guard.is_running());
        assert!(guard.try_acquire().is_some());
    }

    #[test]
    fn test_concurrent_always_runs() {
        let guard = OverlapGuard::new(OverlapPolicy::Concurrent);
        let a = guard.try_acquire();
        let b = guard.try_acquire();
        assert!(a.is_some() && b.is_some());
        assert!(!guard.is_running());
    }

    #[test]
    fn test_guard_released_on_panic() {
        let guard = OverlapGuard::new(OverlapPolicy::Skip);
        let cloned = guard.clone();
        let result = std::thread::spawn(move || {
            let _run = cloned.try_acquire();
            panic!("job blew up");
        })
        .join();

        assert!(result.is_err());
        assert!(!guard.is_running());
    }

    #[test]
    fn test_default_policy_is_skip() {
        assert_eq!(OverlapPolicy::default(), OverlapPolicy::Skip);
    }
}
