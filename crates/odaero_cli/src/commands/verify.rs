//! Verify command implementation.
//!
//! Decrypts the artifact through the manager and reports every table with
//! its row count, the quick end-to-end check that the secrets on this
//! host can actually unlock the data.

use odaero_store::{ArtifactManager, ManagerConfig, SOURCE_TABLES};
use std::path::Path;

/// Runs the verify command.
pub fn run(
    secrets_file: Option<&Path>,
    source_root: &Path,
    data_root: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let bundle = super::load_bundle(secrets_file)?;
    let manager = ArtifactManager::new(ManagerConfig::with_data_root(
        bundle,
        source_root.to_path_buf(),
        data_root,
    ));

    let tables: Vec<(String, i64)> = manager.with_connection(|conn| {
        let mut stmt = conn.prepare(
            "SELECT table_name FROM information_schema.tables ORDER BY table_name",
        )?;
        let names: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<_, _>>()?;

        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let rows: i64 =
                conn.query_row(&format!("SELECT count(*) FROM {name}"), [], |r| r.get(0))?;
            out.push((name, rows));
        }
        Ok(out)
    })?;

    println!("Artifact decrypted successfully");
    println!();
    println!("{:<40} {:>12}", "table", "rows");
    for (name, rows) in &tables {
        println!("{name:<40} {rows:>12}");
    }

    let missing: Vec<_> = SOURCE_TABLES
        .iter()
        .map(|t| t.table)
        .filter(|t| !tables.iter().any(|(name, _)| name == t))
        .collect();
    if !missing.is_empty() {
        println!();
        println!("Mapped tables absent from the artifact: {}", missing.join(", "));
    }

    Ok(())
}
