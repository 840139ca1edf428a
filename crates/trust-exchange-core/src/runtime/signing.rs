// crates/trust-exchange-core/src/runtime/signing.rs
// ============================================================================
// Module: Signature Service
// Description: Canonical signing and verification of field mappings.
// Purpose: Bind protocol payloads to the parties that produced them.
// Dependencies: tracing, crate::core
// ============================================================================

//! ## Overview
//! Signing canonicalizes a [`FieldMapping`] with the versioned JCS rules and
//! signs the bytes with the local key held by [`IdentityContext`].
//! Verification recomputes the same bytes and answers a plain `bool`: a
//! malformed signature, a wrong key, and a tampered payload are all simply
//! "not verified".

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use tracing::debug;

use crate::core::canonical::CANONICALIZATION_VERSION;
use crate::core::canonical::FieldMapping;
use crate::core::canonical::canonical_bytes;
use crate::core::error::ExchangeError;
use crate::core::keys::EncodedSignature;
use crate::core::keys::PublicKey;
use crate::core::signature::SignedPayload;
use crate::runtime::identity::IdentityContext;

// ============================================================================
// SECTION: Signature Service
// ============================================================================

/// Signs and verifies canonical payloads.
#[derive(Debug, Clone)]
pub struct SignatureService {
    /// Identity whose key signs.
    identity: Arc<IdentityContext>,
}

impl SignatureService {
    /// Creates a service signing as `identity`.
    #[must_use]
    pub const fn new(identity: Arc<IdentityContext>) -> Self {
        Self {
            identity,
        }
    }

    /// Returns the identity this service signs as.
    #[must_use]
    pub fn identity(&self) -> &IdentityContext {
        &self.identity
    }

    /// Signs the canonical form of `fields`.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Internal`] when the mapping cannot be
    /// canonicalized.
    pub fn sign(&self, fields: FieldMapping) -> Result<SignedPayload, ExchangeError> {
        let bytes =
            canonical_bytes(&fields).map_err(|err| ExchangeError::Internal(err.to_string()))?;
        let signature = self.identity.sign_bytes(&bytes);
        debug!(
            field_count = fields.len(),
            signed_bytes = bytes.len(),
            canonicalization = CANONICALIZATION_VERSION,
            "signed payload"
        );
        Ok(SignedPayload {
            fields,
            signature,
            signer: self.identity.self_id().clone(),
        })
    }

    /// Returns true when `signature` is valid for `fields` under `signer_key`.
    #[must_use]
    #[allow(clippy::unused_self, reason = "Verification is part of the service surface.")]
    pub fn verify(
        &self,
        fields: &FieldMapping,
        signature: &EncodedSignature,
        signer_key: &PublicKey,
    ) -> bool {
        canonical_bytes(fields).is_ok_and(|bytes| signer_key.verify(&bytes, signature))
    }
}
