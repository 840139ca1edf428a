// crates/trust-exchange-core/src/core/signature.rs
// ============================================================================
// Module: Trust Exchange Signed Payloads
// Description: Field mappings paired with a detached signature and signer.
// Purpose: Carry signed protocol payloads between parties.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`SignedPayload`] pairs a [`FieldMapping`] with the signature computed
//! over its canonical bytes. The signer identifier travels alongside but is
//! not part of the signed bytes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::canonical::FieldMapping;
use crate::core::identifiers::InstitutionId;
use crate::core::keys::EncodedSignature;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Field mapping with a detached signature.
///
/// # Invariants
/// - `signature` covers the canonical bytes of `fields` only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPayload {
    /// Signed fields.
    pub fields: FieldMapping,
    /// Detached signature.
    pub signature: EncodedSignature,
    /// Owner of the signing key.
    pub signer: InstitutionId,
}
