// crates/trust-exchange-core/src/core/mod.rs
// ============================================================================
// Module: Trust Exchange Core Types
// Description: Identifiers, keys, payloads, and errors of the exchange protocol.
// Purpose: Provide the shared data model used by runtime and transports.
// Dependencies: serde, serde_json, ed25519-dalek, time
// ============================================================================

//! ## Overview
//! Core types are pure data plus deterministic helpers. Nothing here performs
//! I/O except [`keys::KeyPair::load`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod canonical;
pub mod error;
pub mod identifiers;
pub mod institution;
pub mod keys;
pub mod request;
pub mod signature;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use canonical::CANONICALIZATION_VERSION;
pub use canonical::CanonicalError;
pub use canonical::FieldMapping;
pub use error::ErrorKind;
pub use error::ExchangeError;
pub use error::ExchangeFailure;
pub use error::ExchangeStep;
pub use error::Party;
pub use identifiers::DataOwnerId;
pub use identifiers::InstitutionId;
pub use identifiers::RelationshipId;
pub use identifiers::RequestId;
pub use identifiers::SchemaId;
pub use institution::Institution;
pub use institution::InstitutionRecord;
pub use keys::EncodedSignature;
pub use keys::KeyError;
pub use keys::KeyPair;
pub use keys::PublicKey;
pub use request::CreatedRequest;
pub use request::DataRequest;
pub use request::FinalStatus;
pub use request::NewDataRequest;
pub use request::ProviderDataEnvelope;
pub use request::ProviderDataRequest;
pub use request::RequestStatus;
pub use request::RequesterSignatureSubmission;
pub use request::StatusSnapshot;
pub use signature::SignedPayload;
pub use self::time::Timestamp;
pub use self::time::TimestampError;
