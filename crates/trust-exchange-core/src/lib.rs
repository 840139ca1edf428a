// crates/trust-exchange-core/src/lib.rs
// ============================================================================
// Module: Trust Exchange Core Library
// Description: Client engine for Broker-mediated data exchanges.
// Purpose: Request, authorize, retrieve, and countersign data between a
//          Requester and a Provider under Broker supervision.
// Dependencies: async-trait, ed25519-dalek, serde, serde_jcs, time, tokio
// ============================================================================

//! ## Overview
//! Trust Exchange Core implements the requester side of a three-party
//! protocol. A Requester asks the Broker for authorization to fetch data a
//! Provider holds for a Data Owner, waits for approval, presents the Broker's
//! signature to the Provider, verifies the Provider's signed response, and
//! countersigns it back to the Broker.
//!
//! Network access and time are injected through [`interfaces`]; HTTP
//! implementations live in `trust-exchange-transport`.
//!
//! Invariants:
//! - Signed bytes are the RFC 8785 canonical form of a field mapping.
//! - Request status is only ever copied from the Broker.
//! - A Provider response that fails verification is never countersigned.
//!
//! Security posture: every counterparty response is untrusted input.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;
pub use interfaces::BrokerTransport;
pub use interfaces::Clock;
pub use interfaces::ProviderTransport;
pub use interfaces::TransportError;
pub use runtime::DEFAULT_APPROVAL_TIMEOUT;
pub use runtime::DEFAULT_POLL_INTERVAL;
pub use runtime::ExchangeEngine;
pub use runtime::ExchangeObserver;
pub use runtime::ExchangeOrchestrator;
pub use runtime::ExchangeOutcome;
pub use runtime::ExchangeParams;
pub use runtime::ExchangeSettings;
pub use runtime::ExchangeStepEvent;
pub use runtime::IdentityContext;
pub use runtime::ManualClock;
pub use runtime::NoopObserver;
pub use runtime::RequestLifecycleManager;
pub use runtime::SignatureService;
pub use runtime::StepOutcome;
pub use runtime::SystemClock;
pub use runtime::authorization_fields;
pub use runtime::verification_fields;
