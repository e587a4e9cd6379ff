//! Per-host retry with exponential backoff
//!
//! Retries apply only to outcomes that may be transient: timeouts,
//! transport failures and non-zero exits. The delay before retry `n`
//! (0-indexed) is `min(initial_delay * multiplier^n, max_delay)`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default delay before the first retry in milliseconds
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 500;

/// Default ceiling for the delay between retries in milliseconds
pub const DEFAULT_MAX_DELAY_MS: u64 = 10_000;

/// Default backoff multiplier (delay doubles each retry)
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Retry behaviour for one host within a dispatch
///
/// Retries are off unless enabled in `[executor.retry]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Whether failed attempts are retried at all
    pub enabled: bool,
    /// Maximum number of retries (0 = single attempt)
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryConfig {
    /// Creates an enabled retry configuration with default backoff
    #[must_use]
    pub fn new() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Single attempt, no retries
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            enabled: false,
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Sets the maximum number of retries
    #[must_use]
    pub const fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the delay before the first retry
    #[must_use]
    pub const fn with_initial_delay_ms(mut self, delay_ms: u64) -> Self {
        self.initial_delay_ms = delay_ms;
        self
    }

    /// Sets the delay ceiling
    #[must_use]
    pub const fn with_max_delay_ms(mut self, delay_ms: u64) -> Self {
        self.max_delay_ms = delay_ms;
        self
    }

    /// Sets the backoff multiplier
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Delay before retry number `retry` (0-indexed)
    ///
    /// Returns `None` if retry is disabled or the retries are exhausted.
    #[must_use]
    pub fn delay_for_retry(&self, retry: u32) -> Option<Duration> {
        if !self.should_retry(retry) {
            return None;
        }
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let delay_ms = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        Some(Duration::from_millis((delay_ms as u64).min(self.max_delay_ms)))
    }

    /// Returns whether retry number `retry` (0-indexed) may be attempted
    #[must_use]
    pub const fn should_retry(&self, retry: u32) -> bool {
        self.enabled && retry < self.max_retries
    }

    /// Total number of attempts (initial + retries)
    #[must_use]
    pub const fn total_attempts(&self) -> u32 {
        if self.enabled {
            self.max_retries + 1
        } else {
            1
        }
    }
}
