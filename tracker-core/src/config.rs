//! Tracker Configuration
//!
//! Tuning knobs for scheduler-triggered flushes. Explicit calls to
//! [`crate::reactive::flush`] ignore them and always run to completion.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Per-thread tracker configuration.
///
/// Installed with [`crate::reactive::configure`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Number of recomputations after which a scheduled flush stops and asks
    /// the scheduler for another pass.
    pub yield_threshold: usize,

    /// Delay hint, in milliseconds, passed to the scheduler when a scheduled
    /// flush yielded with work left over.
    pub retry_delay_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            yield_threshold: 1000,
            retry_delay_ms: 10,
        }
    }
}

impl TrackerConfig {
    /// Parse a configuration from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_yield_threshold(mut self, yield_threshold: usize) -> Self {
        self.yield_threshold = yield_threshold;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
