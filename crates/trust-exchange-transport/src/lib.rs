// crates/trust-exchange-transport/src/lib.rs
// ============================================================================
// Module: Trust Exchange Transport Library
// Description: HTTP implementations of the Broker and Provider transports.
// Purpose: Connect the exchange runtime to real counterparties over HTTPS.
// Dependencies: reqwest, rand, url, trust-exchange-core
// ============================================================================

//! ## Overview
//! This crate supplies [`HttpBrokerTransport`] and [`HttpProviderTransport`],
//! the reqwest-backed implementations of the core transport traits. Both
//! share one response policy: bodies are size-capped, statuses are mapped to
//! [`trust_exchange_core::TransportError`] classes, and transient faults are
//! retried under a [`RetryPolicy`].
//!
//! Security posture: responses are untrusted; redirects are not followed and
//! Provider endpoints must be `https` unless explicitly relaxed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod broker;
pub mod http;
pub mod provider;
pub mod retry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use broker::HttpBrokerConfig;
pub use broker::HttpBrokerTransport;
pub use http::DEFAULT_CONNECT_TIMEOUT;
pub use http::DEFAULT_MAX_RESPONSE_BYTES;
pub use http::DEFAULT_REQUEST_TIMEOUT;
pub use http::TransportBuildError;
pub use provider::HttpProviderPolicy;
pub use provider::HttpProviderTransport;
pub use retry::RetryPolicy;
pub use retry::execute_with_retry;
