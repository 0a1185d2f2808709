//! Error types for the store crate.
//!
//! The taxonomy keeps the operator-facing distinctions sharp: a failed
//! integrity check means "check the credentials", a storage error means
//! "check the disk", and missing source data means "populate the source
//! tree". None of the three should be mistaken for another.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while building, encrypting or serving the
/// artifact.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Key derivation or encryption/decryption failure, including wrong
    /// credentials and tampered artifacts.
    #[error(transparent)]
    Crypto(#[from] odaero_crypto::CryptoError),

    /// Filesystem read/write/permission failure. Surfaced immediately,
    /// never retried: these need operator intervention.
    #[error("storage error at {path}: {source}")]
    Storage {
        /// The path involved in the failing operation.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The embedded database engine reported an error.
    #[error("database error: {0}")]
    Database(#[from] duckdb::Error),

    /// The builder found none of the expected source files.
    #[error("no source data found under {root}: populate the source tree before building")]
    SourceDataUnavailable {
        /// The source root that was scanned.
        root: PathBuf,
    },
}

impl StoreError {
    /// Creates a storage error for a path.
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Creates a source-data-unavailable error.
    pub fn source_data_unavailable(root: impl Into<PathBuf>) -> Self {
        Self::SourceDataUnavailable { root: root.into() }
    }

    /// Returns true when the remediation is to check credentials or
    /// rebuild the artifact, not to inspect the disk.
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Crypto(e) if e.is_auth_failure())
    }
}
