// crates/trust-exchange-core/src/runtime/identity.rs
// ============================================================================
// Module: Identity Context
// Description: Local institution identity, signing key, and directory cache.
// Purpose: Own the private key and resolve counterparties' public keys.
// Dependencies: tokio, tracing, crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`IdentityContext`] is the only holder of the local signing key. It also
//! caches Broker directory lookups for the lifetime of the engine, since
//! institutions are immutable once published, and memoizes the Broker's own
//! public key.
//!
//! Security posture: directory responses are untrusted; a record whose
//! identifier differs from the one requested is rejected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tokio::sync::RwLock;
use tracing::debug;

use crate::core::error::ExchangeError;
use crate::core::identifiers::InstitutionId;
use crate::core::institution::Institution;
use crate::core::keys::EncodedSignature;
use crate::core::keys::KeyPair;
use crate::core::keys::PublicKey;
use crate::interfaces::BrokerTransport;

// ============================================================================
// SECTION: Identity Context
// ============================================================================

/// Local identity plus a cache of Broker directory entries.
///
/// # Invariants
/// - The key pair is never exposed; only signatures and the public key leave.
/// - Cached institutions are never replaced once inserted.
pub struct IdentityContext {
    /// Configured identifier of this institution.
    self_id: InstitutionId,
    /// Local signing key.
    key_pair: KeyPair,
    /// Broker used for directory lookups.
    broker: Arc<dyn BrokerTransport>,
    /// Directory cache keyed by institution identifier.
    institutions: RwLock<HashMap<InstitutionId, Institution>>,
    /// Memoized Broker public key.
    platform_key: OnceCell<PublicKey>,
}

impl IdentityContext {
    /// Creates an identity context for `self_id` signing with `key_pair`.
    #[must_use]
    pub fn new(
        self_id: InstitutionId,
        key_pair: KeyPair,
        broker: Arc<dyn BrokerTransport>,
    ) -> Self {
        Self {
            self_id,
            key_pair,
            broker,
            institutions: RwLock::new(HashMap::new()),
            platform_key: OnceCell::new(),
        }
    }

    /// Returns the configured identifier of this institution.
    #[must_use]
    pub const fn self_id(&self) -> &InstitutionId {
        &self.self_id
    }

    /// Returns the local public key.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.key_pair.public_key()
    }

    /// Resolves an institution, consulting the cache before the Broker.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::NotFound`] when the Broker has no record, and
    /// [`ExchangeError::InvariantViolation`] when the Broker answers with a
    /// different institution.
    pub async fn institution(&self, id: &InstitutionId) -> Result<Institution, ExchangeError> {
        if let Some(cached) = self.institutions.read().await.get(id) {
            return Ok(cached.clone());
        }
        let fetched =
            self.broker.get_institution_by_id(id).await.map_err(ExchangeError::from_broker)?;
        if &fetched.id != id {
            return Err(ExchangeError::InvariantViolation(format!(
                "directory lookup for {id} returned institution {}",
                fetched.id
            )));
        }
        debug!(institution_id = %id, "cached institution record");
        Ok(self.remember(fetched).await)
    }

    /// Resolves the institution the Broker associates with our credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::InvariantViolation`] when the Broker names a
    /// different institution than `self_id`; nothing is cached in that case.
    /// Returns other [`ExchangeError`] variants when the Broker call fails.
    pub async fn my_institution(&self) -> Result<Institution, ExchangeError> {
        if let Some(cached) = self.institutions.read().await.get(&self.self_id) {
            return Ok(cached.clone());
        }
        let fetched = self.broker.get_my_institution().await.map_err(ExchangeError::from_broker)?;
        if fetched.id != self.self_id {
            return Err(ExchangeError::InvariantViolation(format!(
                "broker identifies caller as {} but configured requester is {}",
                fetched.id, self.self_id
            )));
        }
        Ok(self.remember(fetched).await)
    }

    /// Returns the Broker's public key, fetching it at most once.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError`] when the Broker call fails; a later call
    /// retries the fetch.
    pub async fn platform_public_key(&self) -> Result<PublicKey, ExchangeError> {
        self.platform_key
            .get_or_try_init(|| async {
                self.broker.get_public_key().await.map_err(ExchangeError::from_broker)
            })
            .await
            .cloned()
    }

    /// Signs raw bytes with the local key.
    pub(crate) fn sign_bytes(&self, bytes: &[u8]) -> EncodedSignature {
        self.key_pair.sign(bytes)
    }

    /// Inserts an institution unless one is already cached, returning the
    /// cached entry.
    async fn remember(&self, institution: Institution) -> Institution {
        let mut cache = self.institutions.write().await;
        cache.entry(institution.id.clone()).or_insert(institution).clone()
    }
}

impl fmt::Debug for IdentityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityContext")
            .field("self_id", &self.self_id)
            .field("key_pair", &self.key_pair)
            .finish_non_exhaustive()
    }
}
