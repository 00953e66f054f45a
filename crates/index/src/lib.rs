//! Vector-file indexing: the single-pass [`VectorFileIndexer`], the sidecar
//! [`IndexFileWriter`]/[`IndexFileReader`] pair, sidecar path derivation and
//! the crash-safe file replacement helpers.

pub mod fsutil;
mod indexer;
mod paths;
mod reader;
mod writer;

pub use indexer::{IndexOutcome, IndexerConfig, MAX_VECTOR_FILE_VERSION, VectorFileIndexer};
pub use paths::{INDEX_FILE_EXTENSION, VECTOR_FILE_EXTENSION, index_file_name};
pub use reader::{IndexFileReader, is_index_up_to_date};
pub use writer::{INDEX_FILE_VERSION, IndexFileWriter};
