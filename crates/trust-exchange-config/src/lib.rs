// crates/trust-exchange-config/src/lib.rs
// ============================================================================
// Module: Trust Exchange Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for trust-exchange.toml semantics.
// Dependencies: serde, toml, url, trust-exchange-core
// ============================================================================

//! ## Overview
//! `trust-exchange-config` defines the configuration model for the
//! trust-exchange client: requester identity, Broker connection, Provider
//! limits, retry backoff, and approval polling. Validation is strict and
//! fail-closed.
//!
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
