//! Random start delay for scheduled runs.
//!
//! Several daemons pointed at the same remote index and started from the
//! same config would otherwise hit it on the same second.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Maximum random delay applied before each run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JitterConfig {
    /// Upper bound in seconds (0 = no jitter)
    pub max_jitter_secs: u64,
}

impl JitterConfig {
    pub fn new(max_jitter_secs: u64) -> Self {
        Self { max_jitter_secs }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.max_jitter_secs > 0
    }

    /// A delay in `[0, max_jitter_secs)`, millisecond resolution.
    pub fn generate_jitter(&self) -> Duration {
        if !self.is_enabled() {
            return Duration::ZERO;
        }
        let jitter_ms = rand::rng().random_range(0..self.max_jitter_secs * 1000);
        Duration::from_millis(jitter_ms)
    }

    /// Sleep for a freshly drawn delay.
    pub async fn sleep(&self) {
        let jitter = self.generate_jitter();
        if !jitter.is_zero() {
            tracing::debug!(jitter_ms = jitter.as_millis(), "Applying jitter delay");
            tokio::time::sleep(jitter).await;
        }
    }
}
