// crates/trust-exchange-core/src/interfaces/mod.rs
// ============================================================================
// Module: Trust Exchange Interfaces
// Description: Transport and clock contracts used by the exchange runtime.
// Purpose: Keep network and time out of the protocol logic.
// Dependencies: async-trait, thiserror, crate::core
// ============================================================================

//! ## Overview
//! The runtime talks to the Broker and Provider only through
//! [`BrokerTransport`] and [`ProviderTransport`], and reads time only through
//! [`Clock`]. Implementations own retries for transient faults and report
//! whatever remains as a [`TransportError`].
//!
//! Security posture: every response from a transport is untrusted input.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::identifiers::InstitutionId;
use crate::core::identifiers::RequestId;
use crate::core::institution::Institution;
use crate::core::keys::PublicKey;
use crate::core::request::CreatedRequest;
use crate::core::request::FinalStatus;
use crate::core::request::NewDataRequest;
use crate::core::request::ProviderDataEnvelope;
use crate::core::request::ProviderDataRequest;
use crate::core::request::RequesterSignatureSubmission;
use crate::core::request::StatusSnapshot;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Transport Errors
// ============================================================================

/// Errors surfaced by transports after their own retries.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Only [`TransportError::Transient`] and [`TransportError::Timeout`] are
///   retryable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection failure, reset, or retryable HTTP status.
    #[error("transient transport failure: {0}")]
    Transient(String),
    /// Remote refused the call.
    #[error("remote rejected the call: {message}")]
    Rejected {
        /// HTTP status code, when known.
        status: Option<u16>,
        /// Rejection detail.
        message: String,
    },
    /// The call did not complete within its timeout.
    #[error("transport timeout: {0}")]
    Timeout(String),
    /// Remote has no such record.
    #[error("remote record not found: {0}")]
    NotFound(String),
    /// Response could not be decoded.
    #[error("undecodable response: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Returns true when the call may succeed if repeated.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout(_))
    }
}

// ============================================================================
// SECTION: Broker Transport
// ============================================================================

/// Broker operations used by the exchange.
#[async_trait]
pub trait BrokerTransport: Send + Sync {
    /// Returns the institution the configured credentials belong to.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the call fails.
    async fn get_my_institution(&self) -> Result<Institution, TransportError>;

    /// Returns the Broker's own public key.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the call fails.
    async fn get_public_key(&self) -> Result<PublicKey, TransportError>;

    /// Registers a new data request.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Rejected`] when the Broker refuses the request.
    async fn create_data_request(
        &self,
        request: &NewDataRequest,
    ) -> Result<CreatedRequest, TransportError>;

    /// Reads the current status of a request.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the call fails.
    async fn get_request_status(
        &self,
        request_id: &RequestId,
    ) -> Result<StatusSnapshot, TransportError>;

    /// Looks up an institution in the Broker directory.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotFound`] when the Broker has no record.
    async fn get_institution_by_id(
        &self,
        institution_id: &InstitutionId,
    ) -> Result<Institution, TransportError>;

    /// Submits the final requester signature and returns the Broker status.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the call fails.
    async fn submit_requester_signature(
        &self,
        submission: &RequesterSignatureSubmission,
    ) -> Result<FinalStatus, TransportError>;
}

// ============================================================================
// SECTION: Provider Transport
// ============================================================================

/// Provider data retrieval.
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    /// Presents the authorization to `endpoint` and returns the signed data.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the Provider is unreachable, refuses,
    /// or answers with an undecodable envelope.
    async fn request_data(
        &self,
        endpoint: &str,
        request: &ProviderDataRequest,
    ) -> Result<ProviderDataEnvelope, TransportError>;
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Source of current time and delays.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Returns the current UTC time.
    fn now(&self) -> Timestamp;

    /// Waits for `duration`.
    async fn sleep(&self, duration: Duration);
}
