//! Sidecar index serialisation.
//!
//! The sidecar is a text file in the same token conventions as the vector
//! file itself, committed via write-temp/fsync/rename so a crash never
//! leaves a half-written index at the target path.

use std::io::{self, Write};
use std::path::Path;

use simvex_core::{SimvexError, VectorFileIndex};
use vecfile::quote_if_needed;

use crate::fsutil::write_atomic;

/// Format version of the sidecar schema.
pub const INDEX_FILE_VERSION: i32 = 2;

#[derive(Debug, Default)]
pub struct IndexFileWriter;

impl IndexFileWriter {
  /// Serialises `index` to `target` through the atomic commit protocol.
  pub fn write(&self, index: &VectorFileIndex, target: &Path) -> Result<(), SimvexError> {
    write_atomic(target, |out| write_all(index, out))
  }
}

fn write_all(index: &VectorFileIndex, out: &mut impl Write) -> io::Result<()> {
  writeln!(out, "version {INDEX_FILE_VERSION}")?;
  writeln!(
    out,
    "file {} {}",
    index.fingerprint.file_size, index.fingerprint.mtime_secs
  )?;
  writeln!(out, "vectorfile {}", quote_if_needed(&index.vector_file_name))?;
  writeln!(out, "run {}", quote_if_needed(&index.run.run_name))?;
  for (name, value) in index.run.attributes.iter() {
    writeln!(out, "attr {} {}", quote_if_needed(name), quote_if_needed(value))?;
  }
  for (name, value) in index.run.module_params.iter() {
    writeln!(out, "param {} {}", quote_if_needed(name), quote_if_needed(value))?;
  }
  if index.unrecognised_line_count > 0 {
    writeln!(out, "unrecognised {}", index.unrecognised_line_count)?;
  }
  for vector in index.vectors() {
    writeln!(out)?;
    writeln!(
      out,
      "vector {} {} {} {} {} {}",
      vector.vector_id,
      quote_if_needed(&vector.module_name),
      quote_if_needed(&vector.name),
      quote_if_needed(&vector.columns),
      vector.block_size,
      vector.sample_count(),
    )?;
    for (name, value) in vector.attributes.iter() {
      writeln!(out, "attr {} {}", quote_if_needed(name), quote_if_needed(value))?;
    }
    for block in &vector.blocks {
      writeln!(
        out,
        "block {} {} {} {} {} {} {} {} {} {} {}",
        block.start_offset,
        block.size,
        block.count,
        block.first_event_num,
        block.last_event_num,
        block.first_time,
        block.last_time,
        block.min,
        block.max,
        block.sum,
        block.sum_sqr,
      )?;
    }
  }
  Ok(())
}
