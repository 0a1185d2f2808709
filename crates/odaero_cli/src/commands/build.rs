//! Build command implementation.

use odaero_store::{ArtifactManager, ManagerConfig};
use std::fs;
use std::path::Path;

/// Runs the build command.
pub fn run(
    secrets_file: Option<&Path>,
    source_root: &Path,
    data_root: &Path,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let bundle = super::load_bundle(secrets_file)?;

    let config = ManagerConfig::with_data_root(bundle, source_root.to_path_buf(), data_root);
    let artifact_path = config.artifact_path.clone();

    if force && artifact_path.exists() {
        println!("Removing existing artifact {}", artifact_path.display());
        fs::remove_file(&artifact_path)?;
    }

    let manager = ArtifactManager::new(config);
    let existed = manager.artifact_status().exists();
    let path = manager.ensure_artifact()?;

    if existed {
        println!("Artifact already present at {} (use --force to rebuild)", path.display());
    } else {
        let size = manager.artifact_status().size_bytes.unwrap_or(0);
        println!("Encrypted artifact written to {} ({size} bytes)", path.display());
    }

    Ok(())
}
