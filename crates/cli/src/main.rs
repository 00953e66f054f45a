//! simvextool - index and rebuild simulation vector files

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod logging;
mod progress;

use commands::{cmd_index, cmd_info, cmd_rebuild};
use logging::init_cli_logging;

#[derive(Parser)]
#[command(name = "simvextool")]
#[command(about = "Index and rebuild simulation vector files")]
#[command(after_help = "\
EXAMPLES:
  simvextool index results/run0.vec      # write the .vci sidecar
  simvextool info results/run0.vec       # inspect an existing sidecar
  simvextool rebuild results/run0.vec    # rewrite into block-aligned form")]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Generate the sidecar index for a vector file
  Index {
    /// Vector file to index
    file: PathBuf,
    /// Re-index even when the existing sidecar is fresh
    #[arg(long)]
    force: bool,
    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
  },
  /// Rewrite a vector file into clean, block-aligned form
  Rebuild {
    /// Vector file to rebuild
    file: PathBuf,
    /// Block size of the rebuilt file, in bytes
    #[arg(long, default_value_t = 65536)]
    block_size: i64,
  },
  /// Show what an existing sidecar index describes
  Info {
    /// Vector file (or its .vci sidecar directly)
    file: PathBuf,
    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
  },
}

fn main() -> Result<()> {
  init_cli_logging();
  let cli = Cli::parse();
  match cli.command {
    Commands::Index { file, force, json } => cmd_index(&file, force, json),
    Commands::Rebuild { file, block_size } => cmd_rebuild(&file, block_size),
    Commands::Info { file, json } => cmd_info(&file, json),
  }
}
