// crates/trust-exchange-cli/src/keys.rs
// ============================================================================
// Module: Key Commands
// Description: Signing key generation and public key derivation.
// Purpose: Produce key files the exchange engine can load.
// Dependencies: trust-exchange-core
// ============================================================================

//! Signing key file generation and inspection.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use trust_exchange_core::KeyError;
use trust_exchange_core::KeyPair;
use trust_exchange_core::PublicKey;

use crate::error::CliResult;

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Writes a fresh signing key to `path` as base64 and returns its public key.
///
/// An existing file is never overwritten. On Unix the file is created with
/// mode `0600`.
///
/// # Errors
///
/// Returns [`crate::CliError::Key`] when the file exists or cannot be
/// written.
pub fn generate_key_file(path: &Path) -> CliResult<PublicKey> {
    let key_pair = KeyPair::generate();
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path).map_err(|err| KeyError::Io(format!("{}: {err}", path.display())))?;
    writeln!(file, "{}", key_pair.to_secret_base64())
        .map_err(|err| KeyError::Io(format!("{}: {err}", path.display())))?;
    file.sync_all().map_err(|err| KeyError::Io(format!("{}: {err}", path.display())))?;
    Ok(key_pair.public_key())
}

/// Loads the signing key at `path` and returns its public key.
///
/// # Errors
///
/// Returns [`crate::CliError::Key`] when the key cannot be loaded.
pub fn public_key_of(path: &Path) -> CliResult<PublicKey> {
    Ok(KeyPair::load(path)?.public_key())
}
