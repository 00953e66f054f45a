//! Implementations of the simvextool subcommands.

use std::path::Path;

use anyhow::{Context, Result, bail};
use simvex::{
  IndexFileReader, IndexOutcome, RebuildConfig, RebuildOutcome, VectorFileIndex, VectorFileIndexer,
  VectorFileRebuilder, index_file_name, is_index_up_to_date,
};

use crate::progress::ConsoleMonitor;

pub fn cmd_index(file: &Path, force: bool, json: bool) -> Result<()> {
  let sidecar = index_file_name(file);
  let index = if !force && is_index_up_to_date(&sidecar, file) {
    eprintln!("{} is up to date (use --force to re-index)", sidecar.display());
    IndexFileReader::default()
      .read(&sidecar)
      .with_context(|| format!("reading {}", sidecar.display()))?
  } else {
    let mut monitor = ConsoleMonitor::default();
    match VectorFileIndexer::default().generate_index(file, &mut monitor)? {
      IndexOutcome::Completed(index) => index,
      IndexOutcome::Cancelled => bail!("indexing was cancelled"),
    }
  };
  print_summary(&index, json);
  Ok(())
}

pub fn cmd_rebuild(file: &Path, block_size: i64) -> Result<()> {
  let config = RebuildConfig {
    block_size,
    file_header: "generated by simvextool".to_string(),
  };
  let mut monitor = ConsoleMonitor::default();
  match VectorFileRebuilder::new(config).rebuild_vector_file(file, &mut monitor)? {
    RebuildOutcome::Completed => {
      println!("rebuilt {} and {}", file.display(), index_file_name(file).display());
    }
    RebuildOutcome::NoVectors => {
      println!("{}: no vectors found, nothing to rebuild", file.display());
    }
    RebuildOutcome::Cancelled => bail!("rebuild was cancelled"),
  }
  Ok(())
}

pub fn cmd_info(file: &Path, json: bool) -> Result<()> {
  let sidecar = if file.extension().is_some_and(|ext| ext == "vci") {
    file.to_path_buf()
  } else {
    index_file_name(file)
  };
  let index = IndexFileReader::default()
    .read(&sidecar)
    .with_context(|| format!("reading {}", sidecar.display()))?;
  print_summary(&index, json);
  if !json {
    for vector in index.vectors() {
      println!(
        "  vector {:>4}  {} {}  blocks={} samples={}",
        vector.vector_id,
        vector.module_name,
        vector.name,
        vector.blocks.len(),
        vector.sample_count()
      );
    }
  }
  Ok(())
}

fn print_summary(index: &VectorFileIndex, json: bool) {
  let summary = index.summary();
  if json {
    match serde_json::to_string_pretty(&summary) {
      Ok(text) => println!("{text}"),
      Err(e) => eprintln!("cannot serialize summary: {e}"),
    }
    return;
  }
  println!(
    "{}: {} vector(s), {} block(s), {} sample(s)",
    summary.vector_file_name, summary.vectors, summary.blocks, summary.samples
  );
  if summary.unrecognised_lines > 0 {
    eprintln!("warning: {} unrecognised line(s) were skipped", summary.unrecognised_lines);
  }
}
