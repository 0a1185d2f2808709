//! Error types for the crypto crate.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur while loading secrets, deriving keys or
/// sealing/opening artifacts.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// One or more required secrets are absent from every source.
    #[error("missing required secret(s): {}", keys.join(", "))]
    MissingSecret {
        /// The configuration keys that were not found.
        keys: Vec<String>,
    },

    /// A `b64:`-tagged secret value failed base64 decoding.
    #[error("secret {key} is tagged b64: but is not valid base64: {message}")]
    ConfigDecode {
        /// The configuration key that failed to decode.
        key: String,
        /// Decoder error description.
        message: String,
    },

    /// Authenticated decryption failed: wrong password or tampered data.
    #[error("integrity check failed: {message}")]
    Integrity {
        /// Description of the failure.
        message: String,
    },

    /// A derivation stage rejected its parameters or output length.
    #[error("key derivation failed: {message}")]
    KeyDerivation {
        /// Description of the failure.
        message: String,
    },
}

impl CryptoError {
    /// Creates a missing-secret error for a single key.
    pub fn missing_secret(key: impl Into<String>) -> Self {
        Self::MissingSecret {
            keys: vec![key.into()],
        }
    }

    /// Creates a config decode error.
    pub fn config_decode(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigDecode {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates an integrity error.
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }

    /// Creates a key derivation error.
    pub fn key_derivation(message: impl Into<String>) -> Self {
        Self::KeyDerivation {
            message: message.into(),
        }
    }

    /// Returns true if this error means the operator should check
    /// credentials rather than disk health.
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Integrity { .. })
    }
}
