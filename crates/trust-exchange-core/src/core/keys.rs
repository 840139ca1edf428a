// crates/trust-exchange-core/src/core/keys.rs
// ============================================================================
// Module: Trust Exchange Key Material
// Description: Ed25519 key pairs, public keys, and encoded signatures.
// Purpose: Keep private keys sealed while exposing wire-safe public forms.
// Dependencies: base64, ed25519-dalek, rand, serde
// ============================================================================

//! ## Overview
//! A [`KeyPair`] owns the local ed25519 signing key. The private half never
//! leaves this module except through [`KeyPair::to_secret_base64`], which
//! exists solely for key provisioning. Public keys and signatures travel as
//! standard base64 strings.
//!
//! Security posture: key files are untrusted input and are size-capped before
//! decoding; `Debug` output never includes secret bytes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::fs;
use std::io::Read;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ed25519_dalek::Signature;
use ed25519_dalek::Signer;
use ed25519_dalek::SigningKey;
use ed25519_dalek::VerifyingKey;
use rand::rngs::OsRng;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde::de;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted size of a signing key file in bytes.
pub const MAX_SIGNING_KEY_BYTES: usize = 4 * 1024;
/// Length of an ed25519 secret or public key in bytes.
const KEY_LENGTH: usize = 32;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when loading or decoding key material.
///
/// # Invariants
/// - Messages never include secret key bytes.
#[derive(Debug, Error)]
pub enum KeyError {
    /// Key file could not be read.
    #[error("key io error: {0}")]
    Io(String),
    /// Key file exceeded [`MAX_SIGNING_KEY_BYTES`].
    #[error("key file exceeds size limit ({size} > {limit})")]
    TooLarge {
        /// Observed size in bytes.
        size: usize,
        /// Maximum size in bytes.
        limit: usize,
    },
    /// Key bytes or encoding were invalid.
    #[error("invalid key material: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Key Pair
// ============================================================================

/// Local ed25519 signing key and its public half.
///
/// # Invariants
/// - The signing key is read-only after construction.
pub struct KeyPair {
    /// Private signing key.
    signing_key: SigningKey,
}

impl KeyPair {
    /// Creates a key pair from 32 secret bytes.
    #[must_use]
    pub fn from_secret_bytes(secret: &[u8; KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    /// Generates a fresh key pair from the operating system RNG.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Decodes key material holding either 32 raw bytes or base64 text.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Invalid`] when the bytes are not a valid key encoding.
    pub fn from_encoded(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() == KEY_LENGTH {
            let secret = to_key_array(bytes)?;
            return Ok(Self::from_secret_bytes(&secret));
        }
        let text = std::str::from_utf8(bytes)
            .map_err(|_| KeyError::Invalid("signing key must be raw bytes or base64".to_string()))?;
        let decoded = BASE64
            .decode(text.trim().as_bytes())
            .map_err(|_| KeyError::Invalid("signing key is not valid base64".to_string()))?;
        let secret = to_key_array(&decoded)?;
        Ok(Self::from_secret_bytes(&secret))
    }

    /// Loads a signing key from disk, enforcing [`MAX_SIGNING_KEY_BYTES`].
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] when the file is unreadable, too large, or invalid.
    pub fn load(path: &Path) -> Result<Self, KeyError> {
        let file = fs::File::open(path)
            .map_err(|err| KeyError::Io(format!("{}: {err}", path.display())))?;
        let limit = u64::try_from(MAX_SIGNING_KEY_BYTES).unwrap_or(u64::MAX).saturating_add(1);
        let mut bytes = Vec::new();
        file.take(limit)
            .read_to_end(&mut bytes)
            .map_err(|err| KeyError::Io(format!("{}: {err}", path.display())))?;
        if bytes.len() > MAX_SIGNING_KEY_BYTES {
            return Err(KeyError::TooLarge {
                size: bytes.len(),
                limit: MAX_SIGNING_KEY_BYTES,
            });
        }
        Self::from_encoded(&bytes)
    }

    /// Returns the public half of the key pair.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key())
    }

    /// Exports the secret key as base64 for provisioning a key file.
    #[must_use]
    pub fn to_secret_base64(&self) -> String {
        BASE64.encode(self.signing_key.to_bytes())
    }

    /// Signs raw message bytes.
    pub(crate) fn sign(&self, message: &[u8]) -> EncodedSignature {
        EncodedSignature::from_signature(&self.signing_key.sign(message))
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

/// Converts a byte slice into a fixed-size key array.
fn to_key_array(bytes: &[u8]) -> Result<[u8; KEY_LENGTH], KeyError> {
    bytes
        .try_into()
        .map_err(|_| KeyError::Invalid(format!("expected {KEY_LENGTH} key bytes, got {}", bytes.len())))
}

// ============================================================================
// SECTION: Public Key
// ============================================================================

/// Ed25519 public key with a base64 wire form.
///
/// # Invariants
/// - Always a valid curve point; construction fails otherwise.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Decodes a base64 public key.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Invalid`] when decoding fails or the point is invalid.
    pub fn from_base64(text: &str) -> Result<Self, KeyError> {
        let decoded = BASE64
            .decode(text.trim().as_bytes())
            .map_err(|_| KeyError::Invalid("public key is not valid base64".to_string()))?;
        let bytes = to_key_array(&decoded)?;
        VerifyingKey::from_bytes(&bytes)
            .map(Self)
            .map_err(|_| KeyError::Invalid("public key is not a valid ed25519 point".to_string()))
    }

    /// Returns the base64 encoding of the key.
    #[must_use]
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0.to_bytes())
    }

    /// Verifies `signature` over `message`, returning false on any failure.
    #[must_use]
    pub fn verify(&self, message: &[u8], signature: &EncodedSignature) -> bool {
        signature.decode().is_some_and(|decoded| self.0.verify_strict(message, &decoded).is_ok())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PublicKey").field(&self.to_base64()).finish()
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_base64(&raw).map_err(de::Error::custom)
    }
}

// ============================================================================
// SECTION: Encoded Signature
// ============================================================================

/// Opaque signature string as carried on the wire.
///
/// # Invariants
/// - Locally produced values are base64 of a 64-byte ed25519 signature.
/// - Values received from counterparties are not validated until verified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedSignature(String);

impl EncodedSignature {
    /// Wraps an encoded signature string received from a counterparty.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Encodes an ed25519 signature.
    #[must_use]
    pub fn from_signature(signature: &Signature) -> Self {
        Self(BASE64.encode(signature.to_bytes()))
    }

    /// Returns the encoded string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decodes into an ed25519 signature, or `None` when malformed.
    #[must_use]
    pub fn decode(&self) -> Option<Signature> {
        let bytes = BASE64.decode(self.0.trim().as_bytes()).ok()?;
        Signature::from_slice(&bytes).ok()
    }
}

impl fmt::Display for EncodedSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for EncodedSignature {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
