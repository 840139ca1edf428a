// crates/trust-exchange-core/src/core/institution.rs
// ============================================================================
// Module: Trust Exchange Institutions
// Description: Institution directory records as published by the Broker.
// Purpose: Bind institution identifiers to their public keys.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Institutions are fetched from the Broker directory and treated as
//! immutable for the lifetime of an engine. Fields beyond the identifier,
//! display name, and public key are preserved as opaque metadata.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::InstitutionId;
use crate::core::keys::PublicKey;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Institution directory entry.
///
/// # Invariants
/// - `public_key` is the key this institution signs with.
/// - Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Institution {
    /// Institution identifier.
    pub id: InstitutionId,
    /// Display name, when published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Published public key.
    pub public_key: PublicKey,
    /// Additional Broker-supplied display metadata.
    #[serde(flatten)]
    pub metadata: BTreeMap<String, Value>,
}

/// Institution record as returned by directory lookups.
///
/// Lookups by identifier may omit the identifier from the body; the caller
/// supplies it when converting.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstitutionRecord {
    /// Institution identifier, when echoed by the Broker.
    #[serde(default)]
    pub id: Option<InstitutionId>,
    /// Display name, when published.
    #[serde(default)]
    pub name: Option<String>,
    /// Published public key.
    pub public_key: PublicKey,
    /// Additional metadata.
    #[serde(flatten)]
    pub metadata: BTreeMap<String, Value>,
}

impl InstitutionRecord {
    /// Converts into an [`Institution`], using `requested` when the record
    /// carries no identifier.
    #[must_use]
    pub fn into_institution(self, requested: &InstitutionId) -> Institution {
        Institution {
            id: self.id.unwrap_or_else(|| requested.clone()),
            name: self.name,
            public_key: self.public_key,
            metadata: self.metadata,
        }
    }
}
