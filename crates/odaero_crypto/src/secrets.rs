//! Secret configuration loading.
//!
//! Secrets are read from a TOML secrets file when one exists, falling back
//! to process environment variables under the same names. Every value
//! except the password may be stored either as a plain token or as binary
//! material tagged `b64:<base64>`.

use crate::error::{CryptoError, CryptoResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::env;
use std::fs;
use std::path::Path;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Key for the primary password (required, no default).
pub const KEY_PASSWORD: &str = "FILES_PASSWORD";
/// Key for the primary salt.
pub const KEY_SALT_PRIMARY: &str = "CRYPTO_SALT_PRIMARY";
/// Key for the secondary salt.
pub const KEY_SALT_SECONDARY: &str = "CRYPTO_SALT_SECONDARY";
/// Key for the pepper.
pub const KEY_PEPPER: &str = "CRYPTO_PEPPER";
/// Key for the entropy factor (used textually by the KDF).
pub const KEY_ENTROPY_FACTOR: &str = "SYSTEM_ENTROPY_FACTOR";
/// Key for the integrity key.
pub const KEY_INTEGRITY: &str = "INTEGRITY_CHECK_KEY";

/// The optional keys, in declaration order. Absence of any of these is
/// tolerated by the library (derivation stays deterministic with empty
/// values) but is worth surfacing to operators.
pub const OPTIONAL_KEYS: [&str; 5] = [
    KEY_SALT_PRIMARY,
    KEY_SALT_SECONDARY,
    KEY_PEPPER,
    KEY_ENTROPY_FACTOR,
    KEY_INTEGRITY,
];

/// Prefix tagging a value as base64-encoded binary material.
const B64_TAG: &str = "b64:";

/// A secret configuration value kept in both its textual and decoded form.
///
/// The key derivation scheme needs both: the fixed-entropy preamble hashes
/// the *textual* values, while the per-stage salts use the *decoded* bytes.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretValue {
    text: String,
    bytes: Vec<u8>,
}

impl SecretValue {
    /// Parses a stored value.
    ///
    /// A `b64:` prefix marks the remainder as base64; anything else is
    /// taken as UTF-8 bytes of the string itself.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::ConfigDecode`] when a tagged value is not
    /// valid base64. `key` is only used for the error message.
    pub fn parse(key: &str, text: &str) -> CryptoResult<Self> {
        let bytes = match text.strip_prefix(B64_TAG) {
            Some(encoded) => STANDARD
                .decode(encoded)
                .map_err(|e| CryptoError::config_decode(key, e.to_string()))?,
            None => text.as_bytes().to_vec(),
        };
        Ok(Self {
            text: text.to_string(),
            bytes,
        })
    }

    /// The textual form as stored in configuration.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The decoded byte form.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns true if the value was never set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretValue")
            .field("text", &"[REDACTED]")
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// The full set of named secrets feeding key derivation.
///
/// Immutable once loaded. Only the password is required; every other
/// field defaults to the empty value so that derivation stays
/// deterministic across environments that configure no auxiliary secrets.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretBundle {
    password: String,
    salt_primary: SecretValue,
    salt_secondary: SecretValue,
    pepper: SecretValue,
    entropy_factor: String,
    integrity_key: SecretValue,
}

impl SecretBundle {
    /// Loads secrets from the given TOML file (when present) with an
    /// environment-variable fallback per key.
    ///
    /// The loader itself never fails on a missing password; that is
    /// validated by key derivation, which reports the missing key by name.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::ConfigDecode`] when a `b64:`-tagged value
    /// fails to decode.
    pub fn load(secrets_file: Option<&Path>) -> CryptoResult<Self> {
        let table = secrets_file.and_then(read_secrets_file);
        Self::from_lookup(|key| {
            table
                .as_ref()
                .and_then(|t| t.get(key))
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .or_else(|| env::var(key).ok())
        })
    }

    /// Builds a bundle from an arbitrary key lookup.
    ///
    /// Used by [`load`](Self::load) and directly by tests.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::ConfigDecode`] when a tagged value fails to
    /// decode.
    pub fn from_lookup<F>(lookup: F) -> CryptoResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).unwrap_or_default();
        let value = |key: &str| -> CryptoResult<SecretValue> {
            let text = get(key);
            SecretValue::parse(key, &text)
        };

        Ok(Self {
            password: get(KEY_PASSWORD),
            salt_primary: value(KEY_SALT_PRIMARY)?,
            salt_secondary: value(KEY_SALT_SECONDARY)?,
            pepper: value(KEY_PEPPER)?,
            entropy_factor: get(KEY_ENTROPY_FACTOR),
            integrity_key: value(KEY_INTEGRITY)?,
        })
    }

    /// Validates that the required secrets are present.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::MissingSecret`] naming `FILES_PASSWORD` when
    /// the password is empty.
    pub fn validate(&self) -> CryptoResult<()> {
        if self.password.is_empty() {
            return Err(CryptoError::missing_secret(KEY_PASSWORD));
        }
        Ok(())
    }

    /// Lists the optional keys that are unset.
    ///
    /// The library tolerates these; operators generally should not.
    #[must_use]
    pub fn missing_optional_keys(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.salt_primary.is_empty() {
            missing.push(KEY_SALT_PRIMARY);
        }
        if self.salt_secondary.is_empty() {
            missing.push(KEY_SALT_SECONDARY);
        }
        if self.pepper.is_empty() {
            missing.push(KEY_PEPPER);
        }
        if self.entropy_factor.is_empty() {
            missing.push(KEY_ENTROPY_FACTOR);
        }
        if self.integrity_key.is_empty() {
            missing.push(KEY_INTEGRITY);
        }
        missing
    }

    /// The primary password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// The primary salt.
    #[must_use]
    pub fn salt_primary(&self) -> &SecretValue {
        &self.salt_primary
    }

    /// The secondary salt.
    #[must_use]
    pub fn salt_secondary(&self) -> &SecretValue {
        &self.salt_secondary
    }

    /// The pepper.
    #[must_use]
    pub fn pepper(&self) -> &SecretValue {
        &self.pepper
    }

    /// The entropy factor (textual).
    #[must_use]
    pub fn entropy_factor(&self) -> &str {
        &self.entropy_factor
    }

    /// The integrity key.
    #[must_use]
    pub fn integrity_key(&self) -> &SecretValue {
        &self.integrity_key
    }
}

impl std::fmt::Debug for SecretBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretBundle")
            .field("password", &"[REDACTED]")
            .field("missing_optional", &self.missing_optional_keys())
            .finish()
    }
}

/// Reads and parses the secrets file, treating any failure as absence.
///
/// A secrets file that is unreadable or malformed must not take the
/// environment fallback down with it.
fn read_secrets_file(path: &Path) -> Option<toml::Table> {
    if !path.exists() {
        return None;
    }
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "secrets file unreadable, using environment only");
            return None;
        }
    };
    match content.parse::<toml::Table>() {
        Ok(table) => Some(table),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "secrets file is not valid TOML, using environment only");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + '_ {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_string())
        }
    }

    #[test]
    fn plain_value_is_utf8_bytes() {
        let v = SecretValue::parse(KEY_PEPPER, "hunter2").unwrap();
        assert_eq!(v.text(), "hunter2");
        assert_eq!(v.bytes(), b"hunter2");
    }

    #[test]
    fn tagged_value_is_base64_decoded() {
        // "b64:aGVsbG8=" -> b"hello"
        let v = SecretValue::parse(KEY_PEPPER, "b64:aGVsbG8=").unwrap();
        assert_eq!(v.text(), "b64:aGVsbG8=");
        assert_eq!(v.bytes(), b"hello");
    }

    #[test]
    fn bad_base64_is_a_decode_error() {
        let err = SecretValue::parse(KEY_PEPPER, "b64:!!!not-base64!!!").unwrap_err();
        assert!(matches!(err, CryptoError::ConfigDecode { .. }));
        assert!(err.to_string().contains(KEY_PEPPER));
    }

    #[test]
    fn empty_bundle_fails_validation_naming_the_password_key() {
        let bundle = SecretBundle::from_lookup(|_| None).unwrap();
        let err = bundle.validate().unwrap_err();
        assert!(matches!(err, CryptoError::MissingSecret { .. }));
        assert!(err.to_string().contains(KEY_PASSWORD));
    }

    #[test]
    fn optional_keys_default_to_empty() {
        let bundle =
            SecretBundle::from_lookup(lookup_from(&[(KEY_PASSWORD, "teste123")])).unwrap();
        bundle.validate().unwrap();
        assert_eq!(bundle.missing_optional_keys().len(), OPTIONAL_KEYS.len());
        assert!(bundle.salt_primary().bytes().is_empty());
    }

    #[test]
    fn loads_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "FILES_PASSWORD = \"from-file\"").unwrap();
        writeln!(f, "CRYPTO_PEPPER = \"b64:cGVwcGVy\"").unwrap();
        drop(f);

        let bundle = SecretBundle::load(Some(&path)).unwrap();
        assert_eq!(bundle.password(), "from-file");
        assert_eq!(bundle.pepper().bytes(), b"pepper");
    }

    #[test]
    fn malformed_secrets_file_falls_back_silently() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.toml");
        std::fs::write(&path, "this is { not toml").unwrap();

        // Must not error; the bundle is simply built from the environment.
        let bundle = SecretBundle::load(Some(&path)).unwrap();
        let _ = bundle.missing_optional_keys();
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let bundle = SecretBundle::from_lookup(lookup_from(&[
            (KEY_PASSWORD, "super-secret"),
            (KEY_PEPPER, "also-secret"),
        ]))
        .unwrap();
        let rendered = format!("{bundle:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("also-secret"));
    }
}
