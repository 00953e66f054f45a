//! High-level operations over simulation vector files: loading an index,
//! generating the sidecar and rebuilding a damaged file through the
//! dataflow pipeline.

mod loader;
mod rebuild;

pub use loader::VectorFileLoader;
pub use rebuild::{RebuildConfig, RebuildOutcome, VectorFileRebuilder};

// the pieces embedders and the CLI work with
pub use index::{
  IndexFileReader, IndexOutcome, IndexerConfig, VectorFileIndexer, index_file_name, is_index_up_to_date,
};
pub use simvex_core::{
  IndexSummary, NoopMonitor, ProgressMonitor, RecordingMonitor, SimvexError, VectorFileIndex,
};
