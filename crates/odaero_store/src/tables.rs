//! The static source-file → destination-table map.
//!
//! The data-preparation pipeline materializes its outputs under a fixed
//! directory layout:
//!
//! ```text
//! <source_root>/
//! ├─ Entrada/                    # lookup tables
//! │  ├─ mun_UTPs.csv
//! │  ├─ centralidades.csv
//! │  └─ aeroportos.parquet
//! └─ Resultados/                 # one folder per analytical grouping
//!    ├─ Pares OD - Por Municipio - Matriz Infra S.A. - 2019/
//!    ├─ Pares OD - Agregação UTP - Matriz Infra S.A. - 2019/
//!    └─ Pares OD - Municipio x Centralidade/
//!       └─ each: Voos Comerciais.parquet, Voos Executivos.parquet,
//!                classificacao_pares.parquet
//! ```
//!
//! Missing source files are tolerated at build time; the resulting
//! database simply lacks those tables and callers must tolerate their
//! absence at query time.

use std::path::{Path, PathBuf};

/// On-disk format of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// CSV with a header row, columns auto-typed on load.
    Csv,
    /// Parquet, loaded as-is.
    Parquet,
}

/// One entry of the source map: a file under the source tree and the
/// database table it becomes.
#[derive(Debug, Clone, Copy)]
pub struct SourceTable {
    /// Folder relative to the source root.
    pub folder: &'static str,
    /// File name within the folder.
    pub file: &'static str,
    /// Destination table name.
    pub table: &'static str,
    /// File format.
    pub format: SourceFormat,
}

impl SourceTable {
    /// The absolute path of this source file under `root`.
    #[must_use]
    pub fn source_path(&self, root: &Path) -> PathBuf {
        root.join(self.folder).join(self.file)
    }
}

const MUNICIPIO_DIR: &str = "Resultados/Pares OD - Por Municipio - Matriz Infra S.A. - 2019";
const UTP_DIR: &str = "Resultados/Pares OD - Agregação UTP - Matriz Infra S.A. - 2019";
const CENTRALIDADE_DIR: &str = "Resultados/Pares OD - Municipio x Centralidade";

/// All source files the builder will look for, lookup tables first.
pub const SOURCE_TABLES: [SourceTable; 12] = [
    SourceTable {
        folder: "Entrada",
        file: "mun_UTPs.csv",
        table: "mun_utps",
        format: SourceFormat::Csv,
    },
    SourceTable {
        folder: "Entrada",
        file: "centralidades.csv",
        table: "centralidades",
        format: SourceFormat::Csv,
    },
    SourceTable {
        folder: "Entrada",
        file: "aeroportos.parquet",
        table: "aeroportos",
        format: SourceFormat::Parquet,
    },
    SourceTable {
        folder: MUNICIPIO_DIR,
        file: "Voos Comerciais.parquet",
        table: "por_municipio_voos_comerciais",
        format: SourceFormat::Parquet,
    },
    SourceTable {
        folder: MUNICIPIO_DIR,
        file: "Voos Executivos.parquet",
        table: "por_municipio_voos_executivos",
        format: SourceFormat::Parquet,
    },
    SourceTable {
        folder: MUNICIPIO_DIR,
        file: "classificacao_pares.parquet",
        table: "por_municipio_classificacao",
        format: SourceFormat::Parquet,
    },
    SourceTable {
        folder: UTP_DIR,
        file: "Voos Comerciais.parquet",
        table: "utp_voos_comerciais",
        format: SourceFormat::Parquet,
    },
    SourceTable {
        folder: UTP_DIR,
        file: "Voos Executivos.parquet",
        table: "utp_voos_executivos",
        format: SourceFormat::Parquet,
    },
    SourceTable {
        folder: UTP_DIR,
        file: "classificacao_pares.parquet",
        table: "utp_classificacao",
        format: SourceFormat::Parquet,
    },
    SourceTable {
        folder: CENTRALIDADE_DIR,
        file: "Voos Comerciais.parquet",
        table: "mun_centralidade_voos_comerciais",
        format: SourceFormat::Parquet,
    },
    SourceTable {
        folder: CENTRALIDADE_DIR,
        file: "Voos Executivos.parquet",
        table: "mun_centralidade_voos_executivos",
        format: SourceFormat::Parquet,
    },
    SourceTable {
        folder: CENTRALIDADE_DIR,
        file: "classificacao_pares.parquet",
        table: "mun_centralidade_classificacao",
        format: SourceFormat::Parquet,
    },
];
