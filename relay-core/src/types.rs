//! Shared client-side types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy used for service calls and activity retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    /// Multiplier applied per attempt, e.g. 2.0 for exponential backoff.
    pub backoff_coefficient: f64,
    pub maximum_interval: Duration,
    /// Maximum number of attempts; 0 means unlimited.
    pub maximum_attempts: i32,
    /// Total time budget across attempts; zero means unbounded.
    pub expiration_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            backoff_coefficient: 2.0,
            maximum_interval: Duration::from_secs(100),
            maximum_attempts: 0,
            expiration_interval: Duration::from_secs(0),
        }
    }
}
