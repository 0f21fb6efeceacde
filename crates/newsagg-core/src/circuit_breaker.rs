//! Per-provider circuit breaker.
//!
//! A provider that keeps failing is skipped for a cooldown period instead of
//! spending its full timeout on every aggregation.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Externally visible breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Cooldown before a provider is tried again.
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            open_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Closed { failures: u32 },
    Open { retry_at: Instant },
    Probing,
}

/// Breaker guarding one provider.
///
/// Calls pass while closed. After `failure_threshold` failures in a row it
/// opens; once the cooldown elapses calls pass again and the first recorded
/// outcome either closes it or starts a new cooldown.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    phase: Mutex<Phase>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            phase: Mutex::new(Phase::Closed { failures: 0 }),
        }
    }

    fn with_phase<T>(&self, f: impl FnOnce(&mut Phase) -> T) -> T {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut phase)
    }

    /// Whether a call may go upstream now. Moves an expired open circuit to
    /// half-open.
    pub fn allow_request(&self) -> bool {
        self.with_phase(|phase| match *phase {
            Phase::Closed { .. } | Phase::Probing => true,
            Phase::Open { retry_at } if Instant::now() >= retry_at => {
                *phase = Phase::Probing;
                true
            }
            Phase::Open { .. } => false,
        })
    }

    pub fn record_success(&self) {
        self.with_phase(|phase| *phase = Phase::Closed { failures: 0 });
    }

    pub fn record_failure(&self) {
        let cooldown = self.config.open_timeout;
        let threshold = self.config.failure_threshold;
        self.with_phase(|phase| {
            let failures = match *phase {
                Phase::Closed { failures } => failures.saturating_add(1),
                Phase::Probing | Phase::Open { .. } => threshold,
            };
            *phase = if failures >= threshold {
                Phase::Open {
                    retry_at: Instant::now() + cooldown,
                }
            } else {
                Phase::Closed { failures }
            };
        });
    }

    pub fn state(&self) -> CircuitState {
        self.with_phase(|phase| match *phase {
            Phase::Closed { .. } => CircuitState::Closed,
            Phase::Open { .. } => CircuitState::Open,
            Phase::Probing => CircuitState::HalfOpen,
        })
    }
}
