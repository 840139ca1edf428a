// crates/trust-exchange-transport/src/retry.rs
// ============================================================================
// Module: Transport Retry Policy
// Description: Bounded exponential backoff for transient transport faults.
// Purpose: Absorb connection failures and retryable HTTP statuses before they
//          reach the exchange runtime.
// Dependencies: rand, tracing, trust-exchange-core
// ============================================================================

//! ## Overview
//! [`RetryPolicy`] decides how many attempts an operation gets and how long
//! to wait between them. Delays grow geometrically from `initial_delay` by
//! `backoff_multiplier`, are capped at `max_delay`, and are shortened by a
//! random jitter fraction so concurrent exchanges do not retry in lockstep.
//!
//! Only errors for which [`TransportError::is_retryable`] holds are retried;
//! rejections and decode failures return on the first attempt. Sleeps go
//! through the injected [`Clock`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::debug;
use trust_exchange_core::Clock;
use trust_exchange_core::TransportError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default number of attempts, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default delay before the first retry.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(200);
/// Default cap on any single delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(5);
/// Default growth factor between consecutive delays.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
/// Default jitter fraction.
pub const DEFAULT_JITTER_FACTOR: f64 = 0.1;

// ============================================================================
// SECTION: Retry Policy
// ============================================================================

/// Retry configuration for one transport.
///
/// # Invariants
/// - `max_attempts` is at least 1.
/// - `backoff_multiplier` is finite and at least 1.0.
/// - `jitter_factor` lies in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Attempts per operation, including the first.
    max_attempts: u32,
    /// Delay before the first retry.
    initial_delay: Duration,
    /// Cap on any single delay.
    max_delay: Duration,
    /// Growth factor between consecutive delays.
    backoff_multiplier: f64,
    /// Fraction of each delay that may be removed at random.
    jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS,
            DEFAULT_INITIAL_DELAY,
            DEFAULT_MAX_DELAY,
            DEFAULT_BACKOFF_MULTIPLIER,
        )
    }
}

impl RetryPolicy {
    /// Creates a policy, clamping out-of-range values into their invariants.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        let backoff_multiplier =
            if backoff_multiplier.is_finite() { backoff_multiplier.max(1.0) } else { 1.0 };
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay: max_delay.max(initial_delay),
            backoff_multiplier,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }

    /// Creates a policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO, 1.0)
    }

    /// Returns the policy with a different jitter fraction, clamped to `[0, 1]`.
    #[must_use]
    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor =
            if jitter_factor.is_finite() { jitter_factor.clamp(0.0, 1.0) } else { 0.0 };
        self
    }

    /// Returns the number of attempts per operation.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the un-jittered delay before retry number `retry` (0-indexed).
    #[must_use]
    pub fn base_delay(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let factor = self.backoff_multiplier.powi(exponent);
        Duration::try_from_secs_f64(self.initial_delay.as_secs_f64() * factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Returns the delay before retry number `retry` with jitter applied.
    #[must_use]
    pub fn delay(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry);
        if self.jitter_factor <= 0.0 || base.is_zero() {
            return base;
        }
        let roll: f64 = rand::thread_rng().gen_range(0.0..=1.0);
        let keep = 1.0 - self.jitter_factor * roll;
        Duration::try_from_secs_f64(base.as_secs_f64() * keep).unwrap_or(base)
    }
}

// ============================================================================
// SECTION: Execution
// ============================================================================

/// Runs `operation` until it succeeds, fails permanently, or exhausts the
/// policy.
///
/// # Errors
///
/// Returns the last [`TransportError`] observed.
pub async fn execute_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    clock: &dyn Clock,
    operation: &str,
    mut attempt_fn: F,
) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let mut attempt: u32 = 1;
    loop {
        match attempt_fn().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.delay(attempt - 1);
                debug!(
                    operation,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "retrying transport call"
                );
                clock.sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        reason = "Test-only assertions use unwrap/expect for clarity."
    )]

    use std::sync::atomic::AtomicU32;
    use std::sync::atomic::Ordering;

    use trust_exchange_core::ManualClock;
    use trust_exchange_core::Timestamp;

    use super::*;

    fn clock() -> ManualClock {
        ManualClock::new(Timestamp::from_unix_millis(0).unwrap())
    }

    #[test]
    fn base_delay_grows_and_caps() {
        let policy = RetryPolicy::new(
            5,
            Duration::from_millis(100),
            Duration::from_millis(350),
            2.0,
        );
        assert_eq!(policy.base_delay(0), Duration::from_millis(100));
        assert_eq!(policy.base_delay(1), Duration::from_millis(200));
        assert_eq!(policy.base_delay(2), Duration::from_millis(350));
        assert_eq!(policy.base_delay(60), Duration::from_millis(350));
    }

    #[test]
    fn jitter_only_shortens_delays() {
        let policy =
            RetryPolicy::new(3, Duration::from_millis(1_000), Duration::from_secs(10), 2.0)
                .with_jitter(0.5);
        for _ in 0..64 {
            let delay = policy.delay(0);
            assert!(delay <= Duration::from_millis(1_000));
            assert!(delay >= Duration::from_millis(500));
        }
    }

    #[test]
    fn constructor_clamps_invalid_values() {
        let policy = RetryPolicy::new(0, Duration::from_millis(10), Duration::ZERO, f64::NAN);
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.base_delay(3), Duration::from_millis(10));
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let policy =
            RetryPolicy::new(4, Duration::from_millis(10), Duration::from_secs(1), 2.0)
                .with_jitter(0.0);
        let clock = clock();
        let calls = AtomicU32::new(0);
        let result = execute_with_retry(&policy, &clock, "op", || {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if call < 2 {
                    Err(TransportError::Transient("503".to_string()))
                } else {
                    Ok(call)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(10), Duration::from_millis(20)]);
    }

    #[tokio::test]
    async fn rejections_are_not_retried() {
        let policy = RetryPolicy::default();
        let clock = clock();
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = execute_with_retry(&policy, &clock, "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(TransportError::Rejected {
                    status: Some(400),
                    message: "bad".to_string(),
                })
            }
        })
        .await;
        assert!(matches!(result, Err(TransportError::Rejected { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let policy =
            RetryPolicy::new(3, Duration::from_millis(5), Duration::from_secs(1), 1.0)
                .with_jitter(0.0);
        let clock = clock();
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = execute_with_retry(&policy, &clock, "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TransportError::Timeout("slow".to_string())) }
        })
        .await;
        assert!(matches!(result, Err(TransportError::Timeout(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(clock.sleeps().len(), 2);
    }
}
