//! Plaintext database assembly from the source tree.

use crate::error::{StoreError, StoreResult};
use crate::tables::{SourceFormat, SOURCE_TABLES};
use duckdb::Connection;
use std::path::Path;

/// Outcome of a database build: which mapped tables were materialized and
/// which source files were absent.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Tables created from an existing source file.
    pub loaded: Vec<&'static str>,
    /// Tables whose source file was missing (tolerated).
    pub skipped: Vec<&'static str>,
}

/// Builds a fresh analytical database at `db_path` from the sources under
/// `source_root`.
///
/// Each entry of the source map whose file exists is bulk-loaded into a
/// table of the mapped name, replacing any previous table of that name.
/// A table is created in a single `CREATE TABLE ... AS SELECT` step, so no
/// partially loaded table can exist. Missing source files are skipped.
///
/// # Errors
///
/// - [`StoreError::SourceDataUnavailable`] when not a single source file
///   exists under `source_root`.
/// - [`StoreError::Database`] when the engine rejects a load.
pub fn build_database(source_root: &Path, db_path: &Path) -> StoreResult<BuildReport> {
    let conn = Connection::open(db_path)?;
    let mut report = BuildReport::default();

    for entry in &SOURCE_TABLES {
        let source = entry.source_path(source_root);
        if !source.exists() {
            tracing::debug!(table = entry.table, source = %source.display(), "source file absent, skipping");
            report.skipped.push(entry.table);
            continue;
        }

        let read_expr = match entry.format {
            SourceFormat::Csv => {
                format!("read_csv_auto('{}', header=true)", sql_literal(&source))
            }
            SourceFormat::Parquet => format!("read_parquet('{}')", sql_literal(&source)),
        };
        conn.execute_batch(&format!(
            "DROP TABLE IF EXISTS {table}; CREATE TABLE {table} AS SELECT * FROM {read_expr};",
            table = entry.table,
        ))?;

        tracing::info!(table = entry.table, source = %source.display(), "table loaded");
        report.loaded.push(entry.table);
    }

    if report.loaded.is_empty() {
        return Err(StoreError::source_data_unavailable(source_root));
    }

    Ok(report)
}

/// Escapes a path for embedding as a single-quoted SQL string literal.
/// Table names come from the static map and need no escaping.
fn sql_literal(path: &Path) -> String {
    path.to_string_lossy().replace('\'', "''")
}
