use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

use crate::provider::RateLimit;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Request budget for a single provider.
///
/// Never queues: when the budget is spent the caller gets the wait time back
/// and reports the provider as rate limited.
pub struct ProviderThrottle {
    limiter: DirectRateLimiter,
    clock: DefaultClock,
}

impl ProviderThrottle {
    /// Returns `None` when `rate` has a zero limit or window.
    pub fn new(rate: RateLimit) -> Option<Self> {
        let quota = quota_from_window(rate.window, rate.limit)?;
        Some(Self {
            limiter: RateLimiter::direct(quota),
            clock: DefaultClock::default(),
        })
    }

    /// Takes one unit of budget, or returns how long until one is available.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        self.limiter
            .check()
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }
}

impl std::fmt::Debug for ProviderThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderThrottle").finish_non_exhaustive()
    }
}

/// Spreads `limit` cells evenly over `window`, allowing a full burst.
fn quota_from_window(window: Duration, limit: u32) -> Option<Quota> {
    let burst = NonZeroU32::new(limit)?;
    if window.is_zero() {
        return None;
    }

    let seconds_per_cell = (window.as_secs_f64() / f64::from(limit)).max(0.001);
    Quota::with_period(Duration::from_secs_f64(seconds_per_cell)).map(|quota| quota.allow_burst(burst))
}
