//! Command implementations.

pub mod build;
pub mod status;
pub mod verify;

use odaero_crypto::SecretBundle;
use std::path::Path;

/// Loads the secret bundle and warns about unset auxiliary secrets.
///
/// The library only requires the password; an operator running with empty
/// salts/pepper still gets a valid (and reproducible) key, but deserves a
/// nudge.
pub fn load_bundle(secrets_file: Option<&Path>) -> Result<SecretBundle, Box<dyn std::error::Error>> {
    let bundle = SecretBundle::load(secrets_file)?;
    let missing = bundle.missing_optional_keys();
    if !missing.is_empty() {
        tracing::warn!(keys = ?missing, "auxiliary secrets unset, deriving with empty values");
    }
    Ok(bundle)
}
