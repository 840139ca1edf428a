// crates/trust-exchange-core/src/runtime/mod.rs
// ============================================================================
// Module: Trust Exchange Runtime
// Description: Identity, signing, lifecycle, and orchestration services.
// Purpose: Drive data exchanges over injected transports and clocks.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Runtime services are layered leaves first: [`IdentityContext`] ->
//! [`SignatureService`] -> [`RequestLifecycleManager`] ->
//! [`ExchangeEngine`]. None of them reads wall-clock time or opens sockets
//! directly.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod clock;
pub mod identity;
pub mod lifecycle;
pub mod observer;
pub mod orchestrator;
pub mod signing;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use clock::ManualClock;
pub use clock::SystemClock;
pub use identity::IdentityContext;
pub use lifecycle::RequestLifecycleManager;
pub use observer::ExchangeObserver;
pub use observer::ExchangeStepEvent;
pub use observer::NoopObserver;
pub use observer::StepOutcome;
pub use orchestrator::DEFAULT_APPROVAL_TIMEOUT;
pub use orchestrator::DEFAULT_POLL_INTERVAL;
pub use orchestrator::ExchangeEngine;
pub use orchestrator::ExchangeOrchestrator;
pub use orchestrator::ExchangeOutcome;
pub use orchestrator::ExchangeParams;
pub use orchestrator::ExchangeSettings;
pub use orchestrator::authorization_fields;
pub use orchestrator::verification_fields;
pub use signing::SignatureService;
