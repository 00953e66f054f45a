//! Rebuilding a vector file into clean, block-aligned form.
//!
//! A reader node streams every vector of the source file into a writer
//! node, which re-emits the samples grouped into fixed-size blocks and
//! produces a matching sidecar. Both outputs land in temp files; on
//! success the index is committed first, then the vector file. Junk lines
//! in the source are dropped along the way.

use std::fs;
use std::path::Path;

use dataflow::{AttrMap, DataflowManager, ExecuteOutcome, standard_registry};
use index::{IndexOutcome, fsutil, index_file_name};
use simvex_core::{NoopMonitor, ProgressMonitor, SemanticError, SimvexError, VectorFileIndex};
use tracing::{debug, error, warn};

#[derive(Debug, Clone)]
pub struct RebuildConfig {
  /// Block size attribute handed to the writer node.
  pub block_size: i64,
  /// Header comment for the rebuilt file, without the `#`.
  pub file_header: String,
}

impl Default for RebuildConfig {
  fn default() -> Self {
    RebuildConfig {
      block_size: dataflow::DEFAULT_BLOCK_SIZE,
      file_header: "generated by simvextool".to_string(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
  Completed,
  /// The file declares no vectors; nothing was touched.
  NoVectors,
  Cancelled,
}

#[derive(Debug, Default)]
pub struct VectorFileRebuilder {
  loader: crate::loader::VectorFileLoader,
  config: RebuildConfig,
}

impl VectorFileRebuilder {
  pub fn new(config: RebuildConfig) -> Self {
    VectorFileRebuilder {
      loader: crate::loader::VectorFileLoader::new(),
      config,
    }
  }

  /// Rebuilds `path` and its sidecar in place. On any failure the source
  /// files keep their pre-call state, except when a rename fails after the
  /// index was already replaced; then the mismatched sidecar is dropped and
  /// the error names what happened.
  pub fn rebuild_vector_file(
    &self,
    path: impl AsRef<Path>,
    monitor: &mut dyn ProgressMonitor,
  ) -> Result<RebuildOutcome, SimvexError> {
    let path = path.as_ref();
    monitor.begin_task(&format!("Rebuilding {}", path.display()), 100);
    let result = self.rebuild_inner(path, monitor);
    monitor.done();
    result
  }

  fn rebuild_inner(&self, path: &Path, monitor: &mut dyn ProgressMonitor) -> Result<RebuildOutcome, SimvexError> {
    let index = match self.loader.load(path, &mut NoopMonitor)? {
      IndexOutcome::Completed(index) => index,
      IndexOutcome::Cancelled => return Ok(RebuildOutcome::Cancelled),
    };
    if monitor.is_canceled() {
      return Ok(RebuildOutcome::Cancelled);
    }
    if index.run.run_entry_count > 1 {
      return Err(SemanticError::MultipleRuns(path.display().to_string()).into());
    }
    if index.num_vectors() == 0 {
      warn!(vector_file = %path.display(), "no vectors found, nothing to rebuild");
      return Ok(RebuildOutcome::NoVectors);
    }
    if index.unrecognised_line_count > 0 {
      warn!(
          vector_file = %path.display(),
          count = index.unrecognised_line_count,
          "rebuilding will drop unrecognised lines"
      );
    }

    let index_target = index_file_name(path);
    let temp_vector = fsutil::temp_path_for(path)?;
    let temp_index = fsutil::temp_path_for(&index_target)?;

    let outcome = self.run_pipeline(path, &index, &temp_vector, &temp_index, monitor);
    match outcome {
      Ok(ExecuteOutcome::Completed) => {}
      Ok(ExecuteOutcome::Cancelled) => {
        remove_temps(&temp_vector, &temp_index);
        return Ok(RebuildOutcome::Cancelled);
      }
      Err(e) => {
        remove_temps(&temp_vector, &temp_index);
        return Err(e);
      }
    }

    // commit order: index first, then the vector file
    if let Err(e) = fsutil::replace_file(&temp_index, &index_target) {
      remove_temps(&temp_vector, &temp_index);
      return Err(e);
    }
    if let Err(e) = fsutil::replace_file(&temp_vector, path) {
      // the new sidecar no longer matches any file on disk; drop it so no
      // reader trusts a mismatched pair
      error!(
          vector_file = %path.display(),
          index_file = %index_target.display(),
          "vector file replacement failed after the index was replaced; removing the new index"
      );
      let _ = fs::remove_file(&index_target);
      let _ = fs::remove_file(&temp_vector);
      return Err(SimvexError::CommitInterrupted {
        vector_file: path.display().to_string(),
        index_file: index_target.display().to_string(),
        source: Box::new(e),
      });
    }

    debug!(vector_file = %path.display(), vectors = index.num_vectors(), "rebuild complete");
    Ok(RebuildOutcome::Completed)
  }

  fn run_pipeline(
    &self,
    source: &Path,
    index: &VectorFileIndex,
    temp_vector: &Path,
    temp_index: &Path,
    monitor: &mut dyn ProgressMonitor,
  ) -> Result<ExecuteOutcome, SimvexError> {
    let registry = standard_registry();
    let mut mgr = DataflowManager::new();

    let mut reader_attrs = AttrMap::new();
    reader_attrs.insert("filename".to_string(), source.display().to_string());
    let reader = registry.create(&mut mgr, "vectorfilereader", &reader_attrs)?;
    if let Some(node) = mgr.reader_mut(reader) {
      // the loaded index is fresh, so block-range reads are safe
      node.set_index(index.clone());
    }

    let mut writer_attrs = AttrMap::new();
    writer_attrs.insert("filename".to_string(), temp_vector.display().to_string());
    writer_attrs.insert("indexfilename".to_string(), temp_index.display().to_string());
    writer_attrs.insert("blocksize".to_string(), self.config.block_size.to_string());
    writer_attrs.insert("fileheader".to_string(), self.config.file_header.clone());
    // the sidecar should name the final file, not the temp it is written to
    writer_attrs.insert("vectorfilename".to_string(), source.display().to_string());
    let writer = registry.create(&mut mgr, "indexedvectorfilewriter", &writer_attrs)?;
    if let Some(node) = mgr.writer_mut(writer) {
      node.set_run(index.run.clone());
    }

    for vector in index.vectors() {
      let from = mgr.port(reader, &vector.vector_id.to_string())?;
      let to = mgr.writer_add_vector(writer, vector)?;
      mgr.connect(&from, &to)?;
    }

    mgr.execute(monitor)
  }
}

fn remove_temps(temp_vector: &Path, temp_index: &Path) {
  let _ = fs::remove_file(temp_vector);
  let _ = fs::remove_file(temp_index);
}
