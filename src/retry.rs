//! Bounded retry-with-backoff primitive.
//!
//! Every busy-poll in the firmware (bridge status flags, device identity at
//! boot, data-ready during a measurement) goes through [`poll_until`], so
//! each loop has an explicit `(interval, max_attempts)` budget and always
//! terminates.
//!
//! ```text
//!  probe ──Some──▶ Ok(v)
//!    │
//!   None ──attempts left──▶ delay(interval) ──▶ probe
//!    │
//!   None ──budget spent───▶ Err(Exhausted)
//!    │
//!   Err(e) ───────────────▶ Err(Aborted(e))
//! ```

use embedded_hal::delay::DelayNs;

/// Poll cadence and attempt bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay between consecutive probes, in milliseconds.
    pub interval_ms: u32,
    /// Total number of probes (a value of 0 still probes once).
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub const fn new(interval_ms: u32, max_attempts: u32) -> Self {
        Self {
            interval_ms,
            max_attempts,
        }
    }

    /// Policy that polls at `interval_ms` for at least `budget_ms` in total.
    pub const fn within(interval_ms: u32, budget_ms: u32) -> Self {
        let interval = if interval_ms == 0 { 1 } else { interval_ms };
        Self {
            interval_ms: interval,
            max_attempts: budget_ms.div_ceil(interval).saturating_add(1),
        }
    }

    /// Number of probes this policy performs before giving up.
    pub const fn attempts(&self) -> u32 {
        if self.max_attempts == 0 {
            1
        } else {
            self.max_attempts
        }
    }

    /// Total time spent waiting when every probe comes back pending.
    pub const fn budget_ms(&self) -> u32 {
        (self.attempts() - 1).saturating_mul(self.interval_ms)
    }
}

/// Why a poll ended without a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Every attempt came back pending.
    Exhausted,
    /// The probe itself failed; polling stopped at that attempt.
    Aborted(E),
}

/// Repeatedly call `probe` until it yields a value, fails, or the policy's
/// attempts are spent.  No delay follows the final attempt.
pub fn poll_until<T, E>(
    policy: RetryPolicy,
    delay: &mut impl DelayNs,
    mut probe: impl FnMut() -> Result<Option<T>, E>,
) -> Result<T, RetryError<E>> {
    poll_until_with(policy, delay, |d, ms| d.delay_ms(ms), |_| probe())
}

/// [`poll_until`] for probes that need the same mutable resource that
/// provides the delay (a driver that owns its bus and its timer).
pub fn poll_until_with<C: ?Sized, T, E>(
    policy: RetryPolicy,
    ctx: &mut C,
    mut wait_ms: impl FnMut(&mut C, u32),
    mut probe: impl FnMut(&mut C) -> Result<Option<T>, E>,
) -> Result<T, RetryError<E>> {
    let attempts = policy.attempts();
    for attempt in 1..=attempts {
        match probe(ctx) {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(e) => return Err(RetryError::Aborted(e)),
        }
        if attempt < attempts {
            wait_ms(ctx, policy.interval_ms);
        }
    }
    Err(RetryError::Exhausted)
}
