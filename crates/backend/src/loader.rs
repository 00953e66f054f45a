//! Loading the index of a vector file.
//!
//! A fresh sidecar (size and mtime both matching the vector file) is parsed
//! directly; anything else falls back to an in-memory indexing pass. The
//! fallback never writes a sidecar — that is `generate_index`'s job.

use std::path::Path;

use index::{IndexFileReader, IndexOutcome, VectorFileIndexer, index_file_name, is_index_up_to_date};
use simvex_core::{ProgressMonitor, SimvexError};
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct VectorFileLoader {
  indexer: VectorFileIndexer,
}

impl VectorFileLoader {
  pub fn new() -> Self {
    VectorFileLoader::default()
  }

  /// Returns the index describing `path`, from the sidecar when it is
  /// up to date, otherwise by scanning the file. Exactly one `done` is
  /// reported on the monitor either way.
  pub fn load(&self, path: impl AsRef<Path>, monitor: &mut dyn ProgressMonitor) -> Result<IndexOutcome, SimvexError> {
    let path = path.as_ref();
    let sidecar = index_file_name(path);
    if is_index_up_to_date(&sidecar, path) {
      match IndexFileReader::default().read(&sidecar) {
        Ok(index) => {
          debug!(vector_file = %path.display(), sidecar = %sidecar.display(), "loaded index from sidecar");
          monitor.begin_task(&format!("Loading {}", sidecar.display()), 1);
          monitor.worked(1);
          monitor.done();
          return Ok(IndexOutcome::Completed(index));
        }
        Err(e) => {
          warn!(sidecar = %sidecar.display(), error = %e, "unreadable sidecar, re-indexing");
        }
      }
    }
    self.indexer.index_file(path, monitor)
  }
}
