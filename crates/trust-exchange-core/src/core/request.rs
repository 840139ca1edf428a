// crates/trust-exchange-core/src/core/request.rs
// ============================================================================
// Module: Trust Exchange Data Requests
// Description: Data request model, lifecycle status, and wire payloads.
// Purpose: Describe the request as observed from the Broker and the bodies
//          exchanged with the Broker and Provider.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A [`DataRequest`] is the local view of a Broker-owned request. Its status
//! is only ever copied from Broker snapshots; the engine never advances it on
//! its own.
//!
//! Lifecycle: `CREATED -> PENDING -> APPROVED -> COMPLETED`, with `REJECTED`
//! and `EXPIRED` reachable from `PENDING` or `APPROVED`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::DataOwnerId;
use crate::core::identifiers::InstitutionId;
use crate::core::identifiers::RelationshipId;
use crate::core::identifiers::RequestId;
use crate::core::identifiers::SchemaId;
use crate::core::keys::EncodedSignature;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Status
// ============================================================================

/// Broker-reported request status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    /// Registered, not yet routed for approval.
    Created,
    /// Awaiting a Broker decision.
    Pending,
    /// Authorized; the platform signature and provider endpoint are issued.
    Approved,
    /// Refused by the Broker.
    Rejected,
    /// Expired before completion.
    Expired,
    /// Exchange finalized.
    Completed,
}

impl RequestStatus {
    /// Returns the wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Expired => "EXPIRED",
            Self::Completed => "COMPLETED",
        }
    }

    /// Returns the position of the status along the lifecycle.
    ///
    /// Terminal states share the highest rank.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Pending => 1,
            Self::Approved => 2,
            Self::Rejected | Self::Expired | Self::Completed => 3,
        }
    }

    /// Returns true when moving from `self` to `next` goes backwards.
    #[must_use]
    pub const fn is_regression_to(self, next: Self) -> bool {
        next.rank() < self.rank()
    }

    /// Returns true for states that deny the exchange.
    #[must_use]
    pub const fn is_denied(self) -> bool {
        matches!(self, Self::Rejected | Self::Expired)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Data Request
// ============================================================================

/// Local view of a Broker-owned data request.
///
/// # Invariants
/// - `id` is Broker-assigned and never changes.
/// - `status` mirrors the latest Broker snapshot.
/// - When `status` is [`RequestStatus::Approved`], the lifecycle manager has
///   checked that `platform_signature` and `provider_endpoint` are present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRequest {
    /// Broker-assigned request identifier.
    pub id: RequestId,
    /// Institution holding the data.
    pub provider_id: InstitutionId,
    /// Consenting data owner.
    pub data_owner_id: DataOwnerId,
    /// Requested data schema.
    pub schema_id: SchemaId,
    /// Consent relationship authorizing the exchange.
    pub relationship_id: RelationshipId,
    /// Absolute expiry of the request.
    pub expires_at: Timestamp,
    /// Latest observed status.
    pub status: RequestStatus,
    /// Broker authorization signature, issued on approval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_signature: Option<EncodedSignature>,
    /// Provider endpoint, issued on approval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_endpoint: Option<String>,
}

impl DataRequest {
    /// Builds the local view of a freshly created request.
    #[must_use]
    pub fn from_created(new: &NewDataRequest, created: CreatedRequest) -> Self {
        Self {
            id: created.request_id,
            provider_id: new.provider_id.clone(),
            data_owner_id: new.data_owner_id.clone(),
            schema_id: new.schema_id.clone(),
            relationship_id: new.relationship_id.clone(),
            expires_at: new.expires_at,
            status: created.status.unwrap_or(RequestStatus::Pending),
            platform_signature: None,
            provider_endpoint: None,
        }
    }

    /// Returns a copy updated with a Broker snapshot.
    ///
    /// Absent grant fields in the snapshot keep previously observed values.
    #[must_use]
    pub fn with_snapshot(&self, snapshot: StatusSnapshot) -> Self {
        Self {
            status: snapshot.status,
            platform_signature: snapshot.platform_signature.or_else(|| self.platform_signature.clone()),
            provider_endpoint: snapshot.provider_endpoint.or_else(|| self.provider_endpoint.clone()),
            ..self.clone()
        }
    }
}

// ============================================================================
// SECTION: Broker Payloads
// ============================================================================

/// Body of a create-request call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDataRequest {
    /// Institution holding the data.
    pub provider_id: InstitutionId,
    /// Consenting data owner.
    pub data_owner_id: DataOwnerId,
    /// Requested data schema.
    pub schema_id: SchemaId,
    /// Consent relationship authorizing the exchange.
    pub relationship_id: RelationshipId,
    /// Absolute expiry of the request.
    pub expires_at: Timestamp,
}

/// Broker response to a create-request call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedRequest {
    /// Broker-assigned identifier.
    pub request_id: RequestId,
    /// Initial status, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RequestStatus>,
}

/// Broker status snapshot for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Current status.
    pub status: RequestStatus,
    /// Broker authorization signature, once approved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_signature: Option<EncodedSignature>,
    /// Provider endpoint, once approved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_endpoint: Option<String>,
}

/// Final requester signature submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequesterSignatureSubmission {
    /// Request being finalized.
    pub request_id: RequestId,
    /// Provider that served the data.
    pub provider_id: InstitutionId,
    /// Provider signature over the verification payload.
    pub provider_signature: EncodedSignature,
    /// Broker authorization signature, forwarded as issued.
    pub platform_signature: EncodedSignature,
    /// Requester signature over the verification payload.
    pub requester_signature: EncodedSignature,
}

/// Broker response to the final submission, preserved verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalStatus {
    /// Status label exactly as reported.
    pub status: String,
    /// Any other fields in the response.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

// ============================================================================
// SECTION: Provider Payloads
// ============================================================================

/// Body presented to the Provider when fetching data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDataRequest {
    /// Approved request identifier.
    pub request_id: RequestId,
    /// Requesting institution.
    pub requester_id: InstitutionId,
    /// Broker authorization signature.
    pub platform_signature: EncodedSignature,
    /// Requester signature over the authorization payload.
    pub requester_signature: EncodedSignature,
}

/// Provider response carrying the data and its signature.
///
/// # Invariants
/// - `payload` is untrusted until `signature` verifies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDataEnvelope {
    /// Opaque data payload.
    pub payload: Value,
    /// Provider signature.
    pub signature: EncodedSignature,
}

// ============================================================================
// SECTION: Tests
// ============================================================================
