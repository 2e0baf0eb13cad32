//! Typed settings for the instance service.

use std::time::Duration;

use chrono::TimeDelta;

/// Backoff for retrying failed decommissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry. Doubles with every further failure.
    pub base_delay: Duration,
    /// Failures tolerated before the instance is abandoned.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following failure number `attempt` (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> TimeDelta {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        to_delta(self.base_delay.saturating_mul(factor))
    }
}

/// Service-wide instance settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceSettings {
    /// How long a completed or expiring instance lingers before deletion.
    pub grace: Duration,
    /// Global cap on live instances. `None` is unlimited.
    pub max_instances: Option<usize>,
    /// Decommission retry policy.
    pub retry: RetryPolicy,
}

impl Default for InstanceSettings {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(30),
            max_instances: None,
            retry: RetryPolicy::default(),
        }
    }
}

/// Converts a std duration, saturating at the largest representable delta.
#[must_use]
pub fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}
