// crates/trust-exchange-cli/src/lib.rs
// ============================================================================
// Module: Trust Exchange CLI Library
// Description: Reusable pieces behind the trust-exchange binary.
// Purpose: Expose engine wiring and key commands for the binary and tests.
// Dependencies: trust-exchange-config, trust-exchange-core,
//               trust-exchange-transport
// ============================================================================

//! ## Overview
//! The `trust-exchange` binary runs one exchange per invocation. This
//! library holds everything except argument parsing and output: turning
//! configuration into an engine, computing exchange parameters, and managing
//! signing key files.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod error;
pub mod keys;
pub mod wiring;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use error::CliError;
pub use error::CliResult;
pub use keys::generate_key_file;
pub use keys::public_key_of;
pub use wiring::ExchangeTarget;
pub use wiring::build_engine;
pub use wiring::exchange_params;
