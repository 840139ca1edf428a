// crates/trust-exchange-core/src/core/error.rs
// ============================================================================
// Module: Trust Exchange Errors
// Description: Exchange error taxonomy, step labels, and failure reports.
// Purpose: Give callers a stable error kind and the step that failed.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Every failure carries an [`ErrorKind`]. Transient faults are absorbed by
//! transports; anything that reaches the orchestrator aborts the exchange and
//! is reported as an [`ExchangeFailure`] naming the [`ExchangeStep`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::RequestId;
use crate::core::request::RequestStatus;
use crate::interfaces::TransportError;

// ============================================================================
// SECTION: Error Kind
// ============================================================================

/// Stable classification of exchange errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Remote fault that may succeed on retry.
    Transient,
    /// A party refused the operation.
    Rejected,
    /// A deadline passed.
    Timeout,
    /// A party broke the protocol contract.
    InvariantViolation,
    /// A signature failed to verify.
    UntrustedResponse,
    /// A referenced record does not exist.
    NotFound,
    /// Local failure unrelated to any counterparty.
    Internal,
}

impl ErrorKind {
    /// Returns the stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Rejected => "rejected",
            Self::Timeout => "timeout",
            Self::InvariantViolation => "invariant_violation",
            Self::UntrustedResponse => "untrusted_response",
            Self::NotFound => "not_found",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Party
// ============================================================================

/// Remote party involved in an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    /// Platform Broker.
    Broker,
    /// Data Provider.
    Provider,
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Broker => f.write_str("broker"),
            Self::Provider => f.write_str("provider"),
        }
    }
}

// ============================================================================
// SECTION: Exchange Error
// ============================================================================

/// Errors raised by exchange components.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Messages never include signatures or key material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// Remote fault persisted past transport retries.
    #[error("{party} unavailable: {message}")]
    Transient {
        /// Party that failed.
        party: Party,
        /// Failure detail.
        message: String,
    },
    /// A party refused the operation.
    #[error("{party} rejected the call: {message}")]
    Rejected {
        /// Party that refused.
        party: Party,
        /// HTTP status code, when known.
        status: Option<u16>,
        /// Rejection detail.
        message: String,
    },
    /// The Broker denied the request.
    #[error("request {request_id} was denied with status {status}")]
    RequestDenied {
        /// Denied request.
        request_id: RequestId,
        /// Terminal status observed.
        status: RequestStatus,
    },
    /// A deadline passed before the operation completed.
    #[error("timed out: {0}")]
    Timeout(String),
    /// A party broke the protocol contract.
    #[error("protocol invariant violated: {0}")]
    InvariantViolation(String),
    /// A signature failed to verify.
    #[error("untrusted response: {0}")]
    UntrustedResponse(String),
    /// A referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The Provider endpoint could not be reached.
    #[error("provider unreachable: {0}")]
    ProviderUnreachable(String),
    /// Local failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ExchangeError {
    /// Returns the error classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Transient {
                ..
            }
            | Self::ProviderUnreachable(_) => ErrorKind::Transient,
            Self::Rejected {
                ..
            }
            | Self::RequestDenied {
                ..
            } => ErrorKind::Rejected,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::InvariantViolation(_) => ErrorKind::InvariantViolation,
            Self::UntrustedResponse(_) => ErrorKind::UntrustedResponse,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Maps a Broker transport error into the exchange taxonomy.
    #[must_use]
    pub fn from_broker(err: TransportError) -> Self {
        match err {
            TransportError::Transient(message) => Self::Transient {
                party: Party::Broker,
                message,
            },
            TransportError::Rejected {
                status,
                message,
            } => Self::Rejected {
                party: Party::Broker,
                status,
                message,
            },
            TransportError::Timeout(message) => Self::Timeout(message),
            TransportError::NotFound(message) => Self::NotFound(message),
            TransportError::Protocol(message) => Self::InvariantViolation(message),
        }
    }

    /// Maps a Provider transport error into the exchange taxonomy.
    ///
    /// Unreachable endpoints and timeouts become
    /// [`ExchangeError::ProviderUnreachable`]; an undecodable envelope is
    /// untrusted.
    #[must_use]
    pub fn from_provider(err: TransportError) -> Self {
        match err {
            TransportError::Transient(message) | TransportError::Timeout(message) => {
                Self::ProviderUnreachable(message)
            }
            TransportError::Rejected {
                status,
                message,
            } => Self::Rejected {
                party: Party::Provider,
                status,
                message,
            },
            TransportError::NotFound(message) => Self::Rejected {
                party: Party::Provider,
                status: Some(404),
                message,
            },
            TransportError::Protocol(message) => Self::UntrustedResponse(message),
        }
    }
}

// ============================================================================
// SECTION: Exchange Steps
// ============================================================================

/// Steps of a single exchange, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeStep {
    /// Resolve self institution and the Broker public key.
    ResolveIdentity,
    /// Register the data request.
    CreateRequest,
    /// Poll until approved.
    AwaitApproval,
    /// Sign the authorization payload.
    SignAuthorization,
    /// Fetch data from the Provider.
    FetchFromProvider,
    /// Resolve the Provider public key.
    ResolveProviderKey,
    /// Verify the Provider signature.
    VerifyProviderSignature,
    /// Submit the final requester signature.
    SubmitFinalSignature,
}

impl ExchangeStep {
    /// Returns the stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ResolveIdentity => "resolve_identity",
            Self::CreateRequest => "create_request",
            Self::AwaitApproval => "await_approval",
            Self::SignAuthorization => "sign_authorization",
            Self::FetchFromProvider => "fetch_from_provider",
            Self::ResolveProviderKey => "resolve_provider_key",
            Self::VerifyProviderSignature => "verify_provider_signature",
            Self::SubmitFinalSignature => "submit_final_signature",
        }
    }
}

impl fmt::Display for ExchangeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Exchange Failure
// ============================================================================

/// Terminal exchange failure with the step that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("exchange failed at {step} ({kind}): {error}", kind = .error.kind())]
pub struct ExchangeFailure {
    /// Step that failed.
    pub step: ExchangeStep,
    /// Underlying error.
    #[source]
    pub error: ExchangeError,
}

impl ExchangeFailure {
    /// Creates a failure report.
    #[must_use]
    pub const fn new(step: ExchangeStep, error: ExchangeError) -> Self {
        Self {
            step,
            error,
        }
    }

    /// Returns the error classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
