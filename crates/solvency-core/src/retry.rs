//! Bounded retry policy for directory lookups.
//!
//! Lookups are read-only, so retrying is always safe; the policy only decides whether
//! it is worthwhile.

use std::time::Duration;

use crate::directory::{UpstreamFault, UpstreamFaultKind};

/// Backoff strategy between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed { delay: Duration },
    /// `base * factor^retry`, capped at `max`, optionally jittered by +/- 50%.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(50),
            factor: 2.0,
            max: Duration::from_secs(1),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Delay before retry number `retry` (0-based).
    pub fn delay(self, retry: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
                let seconds = (base.as_secs_f64() * factor.powi(exponent)).min(max.as_secs_f64());
                let delay = Duration::from_secs_f64(seconds);
                if !jitter {
                    return delay;
                }

                let spread = delay.as_millis() as u64 / 2;
                let offset = fastrand::u64(0..=spread * 2);
                Duration::from_millis((delay.as_millis() as u64 + offset).saturating_sub(spread))
            }
        }
    }
}

/// Retry policy applied by the upstream client.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub enabled: bool,
    /// Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub backoff: Backoff,
    pub retry_on_timeout: bool,
    pub retry_on_transport: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 2,
            backoff: Backoff::default(),
            retry_on_timeout: true,
            retry_on_transport: true,
        }
    }
}

impl RetryConfig {
    pub fn exponential(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed { delay },
            ..Self::default()
        }
    }

    pub fn no_retry() -> Self {
        Self {
            enabled: false,
            max_retries: 0,
            ..Self::default()
        }
    }

    pub const fn max_attempts(&self) -> u32 {
        if self.enabled {
            self.max_retries.saturating_add(1)
        } else {
            1
        }
    }

    /// Whether `fault`, raised by attempt number `attempt` (1-based), earns another try.
    pub fn should_retry(&self, fault: &UpstreamFault, attempt: u32) -> bool {
        if !self.enabled || attempt >= self.max_attempts() || !fault.retryable() {
            return false;
        }

        match fault.kind() {
            UpstreamFaultKind::Timeout => self.retry_on_timeout,
            UpstreamFaultKind::Transport => self.retry_on_transport,
            UpstreamFaultKind::Remote | UpstreamFaultKind::Status | UpstreamFaultKind::Decode => {
                false
            }
        }
    }

    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        self.backoff.delay(retry)
    }
}
