//! pdbprof CLI - コマンドラインインターフェース
//!
//! PDBファイルをプロファイルJSONに変換するツール pdbprof のコマンドラインインターフェース

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pdbprof_core::{make_pdb_profile, pe_codeview_data, ProfileOptions};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// pdbprof - PDB to profile converter
#[derive(Parser)]
#[command(name = "pdbprof")]
#[command(version)]
#[command(about = "Convert Microsoft PDB debug information into a JSON profile", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: ProfileCommand,
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// Convert a PDB file into a profile
    ParsePdb {
        /// Path to the PDB file
        pdb: PathBuf,

        /// Local copy of the binary the PDB belongs to (used to read ImageBase)
        #[arg(long)]
        dll_path: Option<PathBuf>,

        /// Original on-disk path of the binary, stored as-is in the profile
        #[arg(long)]
        dll_origin_path: Option<String>,

        /// Identity hash of the binary (computed from --dll-path when omitted)
        #[arg(long)]
        dll_symstore_hash: Option<String>,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the PDB file name and identity hash referenced by a PE binary
    PeCodeviewData {
        /// Path to the PE binary
        binary: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        ProfileCommand::ParsePdb {
            pdb,
            dll_path,
            dll_origin_path,
            dll_symstore_hash,
            output,
        } => {
            let options = ProfileOptions {
                dll_origin_path,
                dll_path,
                dll_symstore_hash,
            };
            let json = make_pdb_profile(&pdb, &options)?.to_json()?;

            match output {
                Some(path) => {
                    fs::write(&path, json)
                        .with_context(|| format!("Failed to write profile to {:?}", path))?;
                    info!("Profile written to {:?}", path);
                }
                None => println!("{}", json),
            }
        }
        ProfileCommand::PeCodeviewData { binary } => {
            let data = pe_codeview_data(&binary)?;
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
    }

    Ok(())
}

/// ログ出力を初期化する
///
/// `RUST_LOG` が設定されていればそれを優先し、なければ `-v` の数でレベルを決めます。
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}
