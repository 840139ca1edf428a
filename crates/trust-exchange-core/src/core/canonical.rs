// crates/trust-exchange-core/src/core/canonical.rs
// ============================================================================
// Module: Trust Exchange Canonicalization
// Description: RFC 8785 canonical serialization of signed field mappings.
// Purpose: Produce the exact byte sequence every party signs and verifies.
// Dependencies: serde, serde_jcs, serde_json, sha2
// ============================================================================

//! ## Overview
//! Signed payloads are flat mappings of named fields. The bytes that are
//! signed are the RFC 8785 (JCS) serialization of that mapping as a JSON
//! object: members sorted by UTF-16 code units, no insignificant whitespace,
//! UTF-8 output, and ECMAScript number formatting.
//!
//! The canonical form is part of the protocol contract and is versioned as
//! [`CANONICALIZATION_VERSION`]. Changing any rule here is a wire break.
//!
//! Security posture: a divergence between signer and verifier is
//! indistinguishable from a forgery, so this module has no configuration.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Version label of the canonicalization rules in effect.
pub const CANONICALIZATION_VERSION: &str = "jcs-rfc8785/v1";

// ============================================================================
// SECTION: Field Mapping
// ============================================================================

/// Ordered mapping of named fields that forms a signature payload.
///
/// # Invariants
/// - Keys are unique; inserting an existing key replaces its value.
/// - Iteration order is lexicographic by key, independent of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMapping(BTreeMap<String, Value>);

impl FieldMapping {
    /// Creates an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the mapping with `key` set to `value`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Sets `key` to `value`, returning the previous value when present.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Removes `key`, returning its value when present.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when the mapping has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates fields in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for FieldMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(key, value)| (key.into(), value.into())).collect())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when canonicalizing payloads.
#[derive(Debug, Error)]
pub enum CanonicalError {
    /// JSON canonicalization failed.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
}

// ============================================================================
// SECTION: Canonicalization
// ============================================================================

/// Returns the canonical signing bytes for a field mapping.
///
/// # Errors
///
/// Returns [`CanonicalError::Canonicalization`] when serialization fails.
pub fn canonical_bytes(fields: &FieldMapping) -> Result<Vec<u8>, CanonicalError> {
    canonical_json_bytes(fields)
}

/// Returns RFC 8785 canonical JSON bytes for any serializable value.
///
/// # Errors
///
/// Returns [`CanonicalError::Canonicalization`] when serialization fails,
/// including for non-finite floats.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CanonicalError> {
    serde_jcs::to_vec(value).map_err(|err| CanonicalError::Canonicalization(err.to_string()))
}

/// Returns the lowercase hex SHA-256 digest of the canonical bytes.
///
/// Used to reference payloads in logs without echoing their contents.
///
/// # Errors
///
/// Returns [`CanonicalError::Canonicalization`] when serialization fails.
pub fn payload_digest(fields: &FieldMapping) -> Result<String, CanonicalError> {
    let bytes = canonical_bytes(fields)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex_encode(&hasher.finalize()))
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}
