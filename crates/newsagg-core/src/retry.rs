//! Optional retry around a provider fetch.

use std::time::Duration;

use crate::error::UpstreamCause;

/// Wait between two attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed {
        delay: Duration,
    },
    /// `base * factor^attempt` up to `max`. With `jitter` the wait is drawn
    /// uniformly from half to one and a half times that value.
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
            base: Duration::from_millis(200),
            factor: 2.0,
            max: Duration::from_secs(3),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Wait before retry number `attempt`, counting from zero.
    pub fn delay(self, attempt: u32) -> Duration {
        let (base, factor, max, jitter) = match self {
            Self::Fixed { delay } => return delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => (base, factor, max, jitter),
        };

        let grown = base.as_secs_f64() * factor.powi(i32::try_from(attempt).unwrap_or(i32::MAX));
        let nominal = Duration::from_secs_f64(grown.min(max.as_secs_f64()));
        if jitter {
            jittered(nominal)
        } else {
            nominal
        }
    }
}

fn jittered(nominal: Duration) -> Duration {
    let millis = u64::try_from(nominal.as_millis()).unwrap_or(u64::MAX);
    let low = millis / 2;
    let high = millis.saturating_add(millis / 2);
    Duration::from_millis(fastrand::u64(low..=high))
}

/// How often a failed provider fetch is repeated before it is reported.
///
/// Off by default. Only transient causes are retried, see
/// [`UpstreamCause::retryable`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RetryConfig {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl RetryConfig {
    pub fn exponential(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::default(),
        }
    }

    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed { delay },
        }
    }

    pub const fn enabled(&self) -> bool {
        self.max_retries > 0
    }

    /// Whether attempt number `attempt` (zero-based) that failed with `cause`
    /// gets another try.
    pub const fn should_retry(&self, attempt: u32, cause: &UpstreamCause) -> bool {
        attempt < self.max_retries && cause.retryable()
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}
