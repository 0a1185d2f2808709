//! Encrypted artifact lifecycle and the decrypt-once connection cache.

use crate::builder::build_database;
use crate::error::{StoreError, StoreResult};
use duckdb::Connection;
use odaero_crypto::SecretBundle;
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tempfile::TempDir;

/// File name of the encrypted artifact.
pub const ARTIFACT_FILE_NAME: &str = "od_aereo.duckdb.enc";
/// File name of the plaintext database inside temp directories.
pub const DB_FILE_NAME: &str = "od_aereo.duckdb";
/// Suffix for the in-flight artifact write.
const ARTIFACT_TEMP_SUFFIX: &str = "tmp";

/// Configuration for an [`ArtifactManager`].
#[derive(Debug)]
pub struct ManagerConfig {
    /// The secrets feeding key derivation.
    pub bundle: SecretBundle,
    /// Root of the source tree (`Entrada/` and `Resultados/`).
    pub source_root: PathBuf,
    /// Full path of the encrypted artifact.
    pub artifact_path: PathBuf,
}

impl ManagerConfig {
    /// Convenience constructor placing the artifact under `data_root`
    /// with its canonical file name.
    #[must_use]
    pub fn with_data_root(bundle: SecretBundle, source_root: PathBuf, data_root: &Path) -> Self {
        Self {
            bundle,
            source_root,
            artifact_path: data_root.join(ARTIFACT_FILE_NAME),
        }
    }
}

/// Presence information about the artifact on disk.
#[derive(Debug, Clone)]
pub struct ArtifactStatus {
    /// Path the manager reads/writes.
    pub path: PathBuf,
    /// Size in bytes when the artifact exists.
    pub size_bytes: Option<u64>,
}

impl ArtifactStatus {
    /// Whether the artifact exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.size_bytes.is_some()
    }
}

/// The cached scratch database: the decrypted file and an open handle.
///
/// The temp directory is held for the lifetime of the process; dropping
/// it (process exit) releases the plaintext to normal OS temp cleanup.
/// No secure deletion is performed.
struct CachedDb {
    conn: Connection,
    scratch_path: PathBuf,
    _scratch_dir: TempDir,
}

/// Owns the encrypted artifact and the process-wide decrypted handle.
///
/// Construct one at application startup and share it by reference; this
/// replaces hidden global state while keeping the decrypt-once contract.
/// All methods are safe to call from multiple threads: the build sequence
/// and the connection cache are each guarded by their own lock, so
/// concurrent first callers trigger exactly one build and exactly one
/// decrypt.
pub struct ArtifactManager {
    config: ManagerConfig,
    build_lock: Mutex<()>,
    cache: Mutex<Option<CachedDb>>,
    builds: AtomicUsize,
    decrypts: AtomicUsize,
    /// Test hook: force the next liveness probe to fail.
    #[cfg(test)]
    fail_next_probe: AtomicBool,
}

impl ArtifactManager {
    /// Creates a manager. No I/O happens until the first operation.
    #[must_use]
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            build_lock: Mutex::new(()),
            cache: Mutex::new(None),
            builds: AtomicUsize::new(0),
            decrypts: AtomicUsize::new(0),
            #[cfg(test)]
            fail_next_probe: AtomicBool::new(false),
        }
    }

    /// Ensures the encrypted artifact exists, building it when missing.
    ///
    /// An existing artifact is returned as-is: there is no staleness
    /// detection; rebuilding after a source change requires deleting the
    /// artifact first. A missing artifact triggers: build the plaintext
    /// database into a scoped temp directory, encrypt it, and publish the
    /// ciphertext with a write-to-temp-then-rename so a crash mid-write
    /// never leaves a corrupt artifact at the final path. The temp
    /// directory is removed on success and failure alike.
    ///
    /// # Errors
    ///
    /// - [`StoreError::SourceDataUnavailable`] when no source files found.
    /// - [`StoreError::Crypto`] when secrets are missing/undecodable, or the
    ///   encryption itself failed.
    /// - [`StoreError::Storage`] on disk-full, permissions, rename failure.
    pub fn ensure_artifact(&self) -> StoreResult<&Path> {
        let _guard = self.build_lock.lock();
        let artifact_path = &self.config.artifact_path;

        if artifact_path.exists() {
            return Ok(artifact_path);
        }

        // Fail on misconfigured secrets before spending time on the build.
        self.config.bundle.validate().map_err(StoreError::from)?;

        tracing::info!(path = %artifact_path.display(), "artifact missing, building");

        if let Some(parent) = artifact_path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::storage(parent, e))?;
        }

        // Scoped plaintext: the temp directory is dropped on every exit path.
        let build_dir = TempDir::with_prefix("od_aereo_build_")
            .map_err(|e| StoreError::storage("od_aereo_build_", e))?;
        let plain_db = build_dir.path().join(DB_FILE_NAME);

        let report = build_database(&self.config.source_root, &plain_db)?;
        tracing::info!(
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            "plaintext database built"
        );

        let plaintext = fs::read(&plain_db).map_err(|e| StoreError::storage(&plain_db, e))?;
        let sealed = odaero_crypto::encrypt(&plaintext, &self.config.bundle)?;
        atomic_write(artifact_path, &sealed)?;

        self.builds.fetch_add(1, Ordering::SeqCst);
        tracing::info!(
            path = %artifact_path.display(),
            bytes = sealed.len(),
            "encrypted artifact written"
        );
        Ok(artifact_path)
    }

    /// Runs `f` against the shared database connection.
    ///
    /// The first caller ensures the artifact, decrypts it fully into
    /// memory, materializes the scratch copy in a private temp directory
    /// and opens a read-write connection; everyone after that shares the
    /// cached handle. A `SELECT 1` liveness probe runs before each use:
    /// when it fails (the handle was invalidated by unrelated code), the
    /// manager transparently reopens against the already-decrypted
    /// scratch file, with no re-decryption, no error surfaced to the caller.
    ///
    /// # Errors
    ///
    /// First-call failures propagate from
    /// [`ensure_artifact`](Self::ensure_artifact); a wrong password
    /// surfaces as an authentication failure
    /// ([`StoreError::is_auth_failure`]), distinct from storage errors.
    /// Errors returned by `f` surface as [`StoreError::Database`].
    pub fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> duckdb::Result<T>,
    ) -> StoreResult<T> {
        let mut cache = self.cache.lock();

        let cached = match &mut *cache {
            Some(db) => db,
            slot @ None => slot.insert(self.decrypt_and_open()?),
        };

        if !self.probe(&cached.conn) {
            tracing::warn!("cached connection failed liveness probe, reopening scratch database");
            cached.conn = Connection::open(&cached.scratch_path)?;
        }

        f(&cached.conn).map_err(StoreError::from)
    }

    /// Reports whether the artifact exists and how large it is.
    #[must_use]
    pub fn artifact_status(&self) -> ArtifactStatus {
        ArtifactStatus {
            path: self.config.artifact_path.clone(),
            size_bytes: fs::metadata(&self.config.artifact_path).ok().map(|m| m.len()),
        }
    }

    /// Number of build+encrypt executions performed by this manager.
    #[must_use]
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    /// Number of decrypt executions performed by this manager.
    #[must_use]
    pub fn decrypt_count(&self) -> usize {
        self.decrypts.load(Ordering::SeqCst)
    }

    fn decrypt_and_open(&self) -> StoreResult<CachedDb> {
        let artifact_path = self.ensure_artifact()?;
        let sealed = fs::read(artifact_path).map_err(|e| StoreError::storage(artifact_path, e))?;
        let plaintext = odaero_crypto::decrypt(&sealed, &self.config.bundle)?;

        let scratch_dir = TempDir::with_prefix("od_aereo_db_")
            .map_err(|e| StoreError::storage("od_aereo_db_", e))?;
        let scratch_path = scratch_dir.path().join(DB_FILE_NAME);
        fs::write(&scratch_path, &plaintext).map_err(|e| StoreError::storage(&scratch_path, e))?;

        let conn = Connection::open(&scratch_path)?;
        self.decrypts.fetch_add(1, Ordering::SeqCst);
        tracing::info!(scratch = %scratch_path.display(), "artifact decrypted and opened");

        Ok(CachedDb {
            conn,
            scratch_path,
            _scratch_dir: scratch_dir,
        })
    }

    fn probe(&self, conn: &Connection) -> bool {
        #[cfg(test)]
        if self.fail_next_probe.swap(false, Ordering::SeqCst) {
            return false;
        }
        conn.query_row("SELECT 1", [], |row| row.get::<_, i32>(0))
            .is_ok()
    }
}

impl std::fmt::Debug for ArtifactManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactManager")
            .field("artifact_path", &self.config.artifact_path)
            .field("source_root", &self.config.source_root)
            .field("cached", &self.cache.lock().is_some())
            .finish()
    }
}

/// Writes `data` to `path` atomically.
///
/// Write-then-rename for crash safety:
/// 1. Write to a temporary file in the destination directory
/// 2. Sync the temporary file to disk
/// 3. Rename over the final path
/// 4. Fsync the directory so the rename itself is durable
fn atomic_write(path: &Path, data: &[u8]) -> StoreResult<()> {
    let temp_path = path.with_extension(ARTIFACT_TEMP_SUFFIX);

    let mut file = File::create(&temp_path).map_err(|e| StoreError::storage(&temp_path, e))?;
    file.write_all(data)
        .map_err(|e| StoreError::storage(&temp_path, e))?;
    file.sync_all()
        .map_err(|e| StoreError::storage(&temp_path, e))?;
    drop(file);

    fs::rename(&temp_path, path).map_err(|e| StoreError::storage(path, e))?;

    if let Some(parent) = path.parent() {
        sync_directory(parent)?;
    }
    Ok(())
}

/// Fsyncs a directory so renames within it are durable.
///
/// Windows NTFS journals metadata operations, so the explicit fsync is
/// Unix-only.
#[cfg(unix)]
fn sync_directory(path: &Path) -> StoreResult<()> {
    let dir = File::open(path).map_err(|e| StoreError::storage(path, e))?;
    dir.sync_all().map_err(|e| StoreError::storage(path, e))?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_directory(_path: &Path) -> StoreResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use odaero_crypto::{CryptoError, KEY_PASSWORD};
    use std::fs;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn bundle(password: &str) -> SecretBundle {
        SecretBundle::from_lookup(|key| (key == KEY_PASSWORD).then(|| password.to_string()))
            .unwrap()
    }

    /// Minimal but valid source tree: the two lookup CSVs.
    fn write_sources(root: &Path) {
        let entrada = root.join("Entrada");
        fs::create_dir_all(&entrada).unwrap();
        fs::write(
            entrada.join("mun_UTPs.csv"),
            "codigo_mun,nome_mun,utp\n3550308,Sao Paulo,UTP-01\n",
        )
        .unwrap();
        fs::write(
            entrada.join("centralidades.csv"),
            "codigo_mun,centralidade\n3550308,Metropole\n",
        )
        .unwrap();
    }

    fn manager_in(dir: &Path, password: &str) -> ArtifactManager {
        write_sources(dir);
        ArtifactManager::new(ManagerConfig::with_data_root(
            bundle(password),
            dir.to_path_buf(),
            dir,
        ))
    }

    #[test]
    fn ensure_artifact_builds_once_and_is_idempotent() {
        let dir = tempdir().unwrap();
        let manager = manager_in(dir.path(), "pw");

        let path1 = manager.ensure_artifact().unwrap().to_path_buf();
        assert!(path1.exists());
        assert_eq!(manager.build_count(), 1);
        let bytes_after_first = fs::read(&path1).unwrap();

        let path2 = manager.ensure_artifact().unwrap().to_path_buf();
        assert_eq!(path1, path2);
        assert_eq!(manager.build_count(), 1);
        assert_eq!(fs::read(&path1).unwrap(), bytes_after_first);
    }

    #[test]
    fn artifact_is_ciphertext_not_a_database() {
        let dir = tempdir().unwrap();
        let manager = manager_in(dir.path(), "pw");
        let path = manager.ensure_artifact().unwrap();

        let bytes = fs::read(path).unwrap();
        // DuckDB files carry the "DUCK" magic at offset 8.
        assert!(bytes.len() > 12);
        assert_ne!(&bytes[8..12], b"DUCK");
    }

    #[test]
    fn no_leftover_temp_files_after_build() {
        let dir = tempdir().unwrap();
        let manager = manager_in(dir.path(), "pw");
        manager.ensure_artifact().unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".tmp") || name.starts_with("od_aereo_build_"))
            .collect();
        assert!(leftovers.is_empty(), "leftovers: {leftovers:?}");
    }

    #[test]
    fn empty_source_tree_is_distinguished_from_storage_errors() {
        let dir = tempdir().unwrap();
        let manager = ArtifactManager::new(ManagerConfig::with_data_root(
            bundle("pw"),
            dir.path().join("nothing-here"),
            dir.path(),
        ));
        let err = manager.ensure_artifact().unwrap_err();
        assert!(matches!(err, StoreError::SourceDataUnavailable { .. }));
    }

    #[test]
    fn missing_password_fails_before_building_artifacts() {
        let dir = tempdir().unwrap();
        write_sources(dir.path());
        let manager = ArtifactManager::new(ManagerConfig::with_data_root(
            bundle(""),
            dir.path().to_path_buf(),
            dir.path(),
        ));
        let err = manager.ensure_artifact().unwrap_err();
        assert!(matches!(
            err,
            StoreError::Crypto(CryptoError::MissingSecret { .. })
        ));
        assert!(!manager.artifact_status().exists());
    }

    #[test]
    fn connection_queries_the_built_tables() {
        let dir = tempdir().unwrap();
        let manager = manager_in(dir.path(), "pw");

        let name: String = manager
            .with_connection(|conn| {
                conn.query_row(
                    "SELECT nome_mun FROM mun_utps WHERE codigo_mun = 3550308",
                    [],
                    |r| r.get(0),
                )
            })
            .unwrap();
        assert_eq!(name, "Sao Paulo");
        assert_eq!(manager.decrypt_count(), 1);
    }

    #[test]
    fn repeated_use_decrypts_once() {
        let dir = tempdir().unwrap();
        let manager = manager_in(dir.path(), "pw");

        for _ in 0..5 {
            let one: i32 = manager
                .with_connection(|conn| conn.query_row("SELECT 1", [], |r| r.get(0)))
                .unwrap();
            assert_eq!(one, 1);
        }
        assert_eq!(manager.decrypt_count(), 1);
        assert_eq!(manager.build_count(), 1);
    }

    #[test]
    fn wrong_password_is_an_auth_failure_not_storage() {
        let dir = tempdir().unwrap();
        let manager = manager_in(dir.path(), "pw-right");
        manager.ensure_artifact().unwrap();

        let wrong = ArtifactManager::new(ManagerConfig::with_data_root(
            bundle("pw-wrong"),
            dir.path().to_path_buf(),
            dir.path(),
        ));
        let err = wrong
            .with_connection(|conn| conn.query_row("SELECT 1", [], |r| r.get::<_, i32>(0)))
            .unwrap_err();
        assert!(err.is_auth_failure());
    }

    #[test]
    fn failed_probe_reopens_without_redecrypting() {
        let dir = tempdir().unwrap();
        let manager = manager_in(dir.path(), "pw");

        let _: i32 = manager
            .with_connection(|conn| conn.query_row("SELECT 1", [], |r| r.get(0)))
            .unwrap();
        assert_eq!(manager.decrypt_count(), 1);

        manager.fail_next_probe.store(true, Ordering::SeqCst);
        let name: String = manager
            .with_connection(|conn| {
                conn.query_row("SELECT nome_mun FROM mun_utps LIMIT 1", [], |r| r.get(0))
            })
            .unwrap();
        assert_eq!(name, "Sao Paulo");
        assert_eq!(manager.decrypt_count(), 1, "self-heal must not re-decrypt");
    }

    #[test]
    fn concurrent_first_access_builds_once() {
        let dir = tempdir().unwrap();
        let manager = Arc::new(manager_in(dir.path(), "pw"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = Arc::clone(&manager);
                std::thread::spawn(move || m.ensure_artifact().map(Path::to_path_buf))
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap().is_ok());
        }
        assert_eq!(manager.build_count(), 1);
    }

    #[test]
    fn concurrent_first_access_decrypts_once() {
        let dir = tempdir().unwrap();
        let manager = Arc::new(manager_in(dir.path(), "pw"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = Arc::clone(&manager);
                std::thread::spawn(move || {
                    m.with_connection(|conn| conn.query_row("SELECT 1", [], |r| r.get::<_, i32>(0)))
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap().unwrap(), 1);
        }
        assert_eq!(manager.decrypt_count(), 1);
        assert_eq!(manager.build_count(), 1);
    }

    #[test]
    fn artifact_status_reflects_disk_state() {
        let dir = tempdir().unwrap();
        let manager = manager_in(dir.path(), "pw");

        assert!(!manager.artifact_status().exists());
        manager.ensure_artifact().unwrap();
        let status = manager.artifact_status();
        assert!(status.exists());
        assert!(status.size_bytes.unwrap() > 0);
    }
}
