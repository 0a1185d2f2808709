//! Cryptographic core for the OD air-route data vault.
//!
//! This crate owns everything between the configured secrets and the
//! encrypted database artifact:
//!
//! - [`SecretBundle`]: the named secrets (password, salts, pepper, entropy
//!   factor, integrity key) loaded from a TOML secrets file with an
//!   environment-variable fallback.
//! - [`DerivedKey`]: a deterministic 32-byte key produced by chaining
//!   PBKDF2-HMAC-SHA512, scrypt and HKDF-SHA256 over the secret bundle.
//! - [`ArtifactCipher`]: AES-256-GCM authenticated encryption of the
//!   gzip-compressed artifact bytes.
//!
//! The derivation is intentionally deterministic: the same bundle must
//! reproduce the same key on any host, with no per-install random salt,
//! so the artifact stays decryptable across machines and restarts.
//!
//! ## Usage
//!
//! ```ignore
//! use odaero_crypto::{ArtifactCipher, DerivedKey, SecretBundle};
//!
//! let bundle = SecretBundle::load(None)?;
//! let key = DerivedKey::derive(&bundle)?;
//! let cipher = ArtifactCipher::new(&key);
//!
//! let sealed = cipher.seal(b"database bytes")?;
//! let plain = cipher.open(&sealed)?;
//! ```

mod cipher;
mod error;
mod kdf;
mod secrets;

pub use cipher::{decrypt, encrypt, ArtifactCipher, NONCE_SIZE, TAG_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use kdf::{DerivedKey, KEY_SIZE};
pub use secrets::{
    SecretBundle, SecretValue, KEY_ENTROPY_FACTOR, KEY_INTEGRITY, KEY_PASSWORD, KEY_PEPPER,
    KEY_SALT_PRIMARY, KEY_SALT_SECONDARY, OPTIONAL_KEYS,
};
