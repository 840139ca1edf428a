// crates/trust-exchange-core/src/runtime/clock.rs
// ============================================================================
// Module: Trust Exchange Clocks
// Description: Wall-clock and manually advanced clock implementations.
// Purpose: Supply time to the runtime through the Clock interface.
// Dependencies: async-trait, time, tokio
// ============================================================================

//! ## Overview
//! [`SystemClock`] reads UTC wall-clock time and sleeps on the tokio timer.
//! [`ManualClock`] never blocks: sleeping advances its time by the requested
//! duration, which makes polling and deadline behavior deterministic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::core::time::Timestamp;
use crate::interfaces::Clock;

// ============================================================================
// SECTION: System Clock
// ============================================================================

/// Wall-clock time and tokio sleeps.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_datetime(OffsetDateTime::now_utc())
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

// ============================================================================
// SECTION: Manual Clock
// ============================================================================

/// Clock whose time only moves when advanced or slept on.
///
/// # Invariants
/// - Time never moves backwards.
#[derive(Debug)]
pub struct ManualClock {
    /// Current time.
    now: Mutex<Timestamp>,
    /// Durations passed to [`Clock::sleep`], in call order.
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    /// Creates a clock starting at `start`.
    #[must_use]
    pub const fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Advances the clock by `duration`, saturating at the maximum timestamp.
    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(next) = now.checked_add(duration) {
            *now = next;
        }
    }

    /// Returns every duration slept so far.
    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap_or_else(PoisonError::into_inner).push(duration);
        self.advance(duration);
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
