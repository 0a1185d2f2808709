//! Encrypted artifact management for the OD air-route analytical database.
//!
//! The persistent artifact is a single encrypted file holding a complete
//! DuckDB database. This crate covers its whole lifecycle:
//!
//! - [`build_database`] assembles the plaintext database from the CSV and
//!   parquet source tables laid out under the data-preparation tree.
//! - [`ArtifactManager`] builds-and-encrypts the artifact when it is
//!   missing, and at runtime decrypts it once into a private scratch file,
//!   caching an open connection for the rest of the process.
//!
//! ## Usage
//!
//! ```ignore
//! use odaero_store::{ArtifactManager, ManagerConfig};
//!
//! let manager = ArtifactManager::new(ManagerConfig::with_data_root(
//!     bundle,
//!     "Dados".into(),
//!     "Dados".into(),
//! ));
//! let rows: i64 = manager.with_connection(|conn| {
//!     conn.query_row("SELECT count(*) FROM aeroportos", [], |r| r.get(0))
//! })?;
//! ```

mod artifact;
mod builder;
mod error;
mod tables;

pub use artifact::{
    ArtifactManager, ArtifactStatus, ManagerConfig, ARTIFACT_FILE_NAME, DB_FILE_NAME,
};
pub use builder::{build_database, BuildReport};
pub use error::{StoreError, StoreResult};
pub use tables::{SourceFormat, SourceTable, SOURCE_TABLES};
