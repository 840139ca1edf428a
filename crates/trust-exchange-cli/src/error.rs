// crates/trust-exchange-cli/src/error.rs
// ============================================================================
// Module: CLI Errors
// Description: Error type for trust-exchange commands.
// Purpose: Carry each layer's failure to a single exit path.
// Dependencies: thiserror, trust-exchange-config, trust-exchange-core,
//               trust-exchange-transport
// ============================================================================

//! Error type shared by all commands.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::process::ExitCode;

use thiserror::Error;
use trust_exchange_config::ConfigError;
use trust_exchange_core::ExchangeFailure;
use trust_exchange_core::KeyError;
use trust_exchange_transport::TransportBuildError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Exit status for a failed exchange.
const EXCHANGE_FAILURE_CODE: u8 = 2;

/// Command failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Key material could not be read or written.
    #[error("key error: {0}")]
    Key(#[from] KeyError),
    /// A transport could not be constructed.
    #[error("transport setup failed: {0}")]
    Transport(#[from] TransportBuildError),
    /// The exchange ran and failed.
    #[error(transparent)]
    Exchange(#[from] ExchangeFailure),
    /// Invalid command arguments.
    #[error("invalid arguments: {0}")]
    Usage(String),
    /// Output could not be written.
    #[error("output error: {0}")]
    Output(String),
}

impl CliError {
    /// Returns the process exit code for this failure.
    ///
    /// Exchange failures exit with 2; setup failures exit with 1.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Exchange(_) => ExitCode::from(EXCHANGE_FAILURE_CODE),
            _ => ExitCode::FAILURE,
        }
    }
}

/// CLI result alias for fallible operations.
pub type CliResult<T> = Result<T, CliError>;
