//! Status command implementation.

use odaero_crypto::DerivedKey;
use odaero_store::{ArtifactManager, ManagerConfig};
use std::path::Path;

/// Runs the status command.
pub fn run(
    secrets_file: Option<&Path>,
    data_root: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let bundle = super::load_bundle(secrets_file)?;

    println!("Secrets:");
    match bundle.validate() {
        Ok(()) => println!("  password: configured"),
        Err(e) => println!("  password: MISSING ({e})"),
    }
    let missing = bundle.missing_optional_keys();
    if missing.is_empty() {
        println!("  auxiliary secrets: all configured");
    } else {
        println!("  auxiliary secrets unset: {}", missing.join(", "));
    }

    if bundle.validate().is_ok() {
        // Fingerprint only; the key itself is never printed.
        let key = DerivedKey::derive(&bundle)?;
        println!("  key fingerprint: {}", key.fingerprint());
    }

    let manager = ArtifactManager::new(ManagerConfig::with_data_root(
        bundle,
        data_root.to_path_buf(),
        data_root,
    ));
    let status = manager.artifact_status();

    println!();
    println!("Artifact:");
    println!("  path: {}", status.path.display());
    match status.size_bytes {
        Some(size) => println!("  present, {size} bytes"),
        None => println!("  absent (run `odaero build`)"),
    }

    Ok(())
}
