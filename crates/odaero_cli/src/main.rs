//! OD air-route vault CLI
//!
//! Command-line tools for the encrypted analytical-database artifact.
//!
//! # Commands
//!
//! - `build` - Build and encrypt the artifact from the source tree
//! - `verify` - Decrypt the artifact and report its tables
//! - `status` - Show artifact and secrets configuration state
//!
//! Secrets are read from a TOML secrets file (`--secrets-file`) with a
//! fallback to environment variables of the same names.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Encrypted OD air-route database tools.
#[derive(Parser)]
#[command(name = "odaero")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML secrets file
    #[arg(global = true, short, long)]
    secrets_file: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the plaintext database from the source tree and encrypt it
    Build {
        /// Root of the source tree (Entrada/ and Resultados/)
        #[arg(long, default_value = "Dados")]
        source_root: PathBuf,

        /// Directory the encrypted artifact is written to
        #[arg(long, default_value = "Dados")]
        data_root: PathBuf,

        /// Delete an existing artifact and rebuild it
        #[arg(short, long)]
        force: bool,
    },

    /// Decrypt the artifact and report the tables it contains
    Verify {
        /// Root of the source tree (used only if the artifact is missing)
        #[arg(long, default_value = "Dados")]
        source_root: PathBuf,

        /// Directory holding the encrypted artifact
        #[arg(long, default_value = "Dados")]
        data_root: PathBuf,
    },

    /// Show artifact presence and secrets configuration state
    Status {
        /// Directory holding the encrypted artifact
        #[arg(long, default_value = "Dados")]
        data_root: PathBuf,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let secrets_file = cli.secrets_file.as_deref();

    match cli.command {
        Commands::Build {
            source_root,
            data_root,
            force,
        } => {
            commands::build::run(secrets_file, &source_root, &data_root, force)?;
        }
        Commands::Verify {
            source_root,
            data_root,
        } => {
            commands::verify::run(secrets_file, &source_root, &data_root)?;
        }
        Commands::Status { data_root } => {
            commands::status::run(secrets_file, &data_root)?;
        }
        Commands::Version => {
            println!("odaero CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
