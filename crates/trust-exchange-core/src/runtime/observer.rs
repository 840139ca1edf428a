// crates/trust-exchange-core/src/runtime/observer.rs
// ============================================================================
// Module: Exchange Observer
// Description: Telemetry hook receiving one event per exchange step.
// Purpose: Let hosts attach metrics without coupling the runtime to a backend.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! The orchestrator reports every step it attempts to an [`ExchangeObserver`].
//! Events carry identifiers, outcome, and latency only; payloads and
//! signatures never reach the observer.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use crate::core::error::ErrorKind;
use crate::core::error::ExchangeStep;
use crate::core::identifiers::RequestId;

// ============================================================================
// SECTION: Events
// ============================================================================

/// Outcome of a single exchange step.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Step completed.
    Ok,
    /// Step failed with the given kind.
    Error(ErrorKind),
}

impl StepOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error(_) => "error",
        }
    }
}

/// Step event payload.
///
/// # Invariants
/// - `request_id` is `None` until the Broker has assigned one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeStepEvent {
    /// Request identifier, once assigned.
    pub request_id: Option<RequestId>,
    /// Step that ran.
    pub step: ExchangeStep,
    /// Step outcome.
    pub outcome: StepOutcome,
    /// Time spent in the step as measured by the engine clock.
    pub latency: Duration,
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Sink for exchange step events.
pub trait ExchangeObserver: Send + Sync {
    /// Records a completed or failed step.
    fn record_step(&self, event: ExchangeStepEvent);
}

/// Observer that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ExchangeObserver for NoopObserver {
    fn record_step(&self, _event: ExchangeStepEvent) {}
}
