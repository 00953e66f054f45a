//! Single-pass vector-file indexer.
//!
//! One forward scan over the file partitions it into per-vector blocks and
//! folds per-block statistics as it goes. Memory stays bounded: only the
//! currently open block and the growing table of contents are held.
//!
//! The line grammar dispatches on the first token: `run`, `param`, `attr`,
//! `vector` and `version` are declarations; anything else is a data line
//! whose first token must be a previously declared vector id. A data-shaped
//! line whose first token is not an integer is tallied and skipped, never
//! fatal. Any other malformation aborts the scan.

use std::path::Path;

use simvex_core::{
  Block, DEFAULT_COLUMNS, FileFingerprint, FormatError, FormatErrorKind, ProgressMonitor, SimTime, SimvexError,
  VectorFileIndex, VectorInfo,
};
use tracing::{debug, warn};
use vecfile::{FileReader, LineTokenizer, ReaderConfig, TokenizerConfig, parse_double, parse_int, parse_int64,
  parse_simtime};

use crate::paths::index_file_name;
use crate::writer::IndexFileWriter;

/// Highest vector-file format version this indexer understands.
pub const MAX_VECTOR_FILE_VERSION: i32 = 2;

#[derive(Debug, Clone, Default)]
pub struct IndexerConfig {
  pub reader: ReaderConfig,
  pub tokenizer: TokenizerConfig,
}

/// How an indexing run ended. Cancellation is an outcome, not an error:
/// nothing was written and the monitor has been closed out.
#[derive(Debug)]
pub enum IndexOutcome {
  Completed(VectorFileIndex),
  Cancelled,
}

impl IndexOutcome {
  pub fn completed(self) -> Option<VectorFileIndex> {
    match self {
      IndexOutcome::Completed(index) => Some(index),
      IndexOutcome::Cancelled => None,
    }
  }
}

/// The block being accumulated for the vector that samples are currently
/// arriving for. The columns string is cached here so the hot per-line path
/// does not re-look-up the vector.
struct OpenBlock {
  vector_id: i32,
  columns: String,
  block: Block,
}

#[derive(Debug, Default)]
pub struct VectorFileIndexer {
  config: IndexerConfig,
}

impl VectorFileIndexer {
  pub fn new(config: IndexerConfig) -> Self {
    VectorFileIndexer { config }
  }

  /// Scans `path` and returns the in-memory index without writing anything.
  pub fn index_file(
    &self,
    path: impl AsRef<Path>,
    monitor: &mut dyn ProgressMonitor,
  ) -> Result<IndexOutcome, SimvexError> {
    let outcome = self.scan(path.as_ref(), monitor);
    monitor.done();
    outcome
  }

  /// Scans `path` and commits the sidecar index next to it. Work split is
  /// 100 units for the read pass and 10 for the write; `done` is reported
  /// on every exit path.
  pub fn generate_index(
    &self,
    path: impl AsRef<Path>,
    monitor: &mut dyn ProgressMonitor,
  ) -> Result<IndexOutcome, SimvexError> {
    let path = path.as_ref();
    let index = match self.scan(path, monitor) {
      Ok(IndexOutcome::Completed(index)) => index,
      Ok(IndexOutcome::Cancelled) => {
        monitor.done();
        return Ok(IndexOutcome::Cancelled);
      }
      Err(e) => {
        monitor.done();
        return Err(e);
      }
    };
    if monitor.is_canceled() {
      monitor.done();
      return Ok(IndexOutcome::Cancelled);
    }

    let target = index_file_name(path);
    if let Err(e) = IndexFileWriter::default().write(&index, &target) {
      monitor.done();
      return Err(e);
    }
    monitor.worked(10);
    monitor.done();
    debug!(
        vector_file = %path.display(),
        index_file = %target.display(),
        vectors = index.num_vectors(),
        "sidecar index written"
    );
    Ok(IndexOutcome::Completed(index))
  }

  fn scan(&self, path: &Path, monitor: &mut dyn ProgressMonitor) -> Result<IndexOutcome, SimvexError> {
    let mut reader = FileReader::open(path, &self.config.reader)?;
    let tokenizer = LineTokenizer::new(self.config.tokenizer.clone());
    let file_size = reader.file_size();

    let mut index = VectorFileIndex::new(path.display().to_string());
    index.fingerprint = FileFingerprint::of_file(path).map_err(|e| SimvexError::io(path, e))?;

    monitor.begin_task(&format!("Indexing {}", path.display()), 110);
    let one_percent = file_size / 100;
    let mut read_percentage: i64 = 0;

    let mut current: Option<OpenBlock> = None;

    while let Some(view) = reader.next_line()? {
      if monitor.is_canceled() {
        return Ok(IndexOutcome::Cancelled);
      }
      if one_percent > 0 {
        let current_percentage = view.bytes_read / one_percent;
        if current_percentage > read_percentage {
          monitor.worked((current_percentage - read_percentage) as i32);
          read_percentage = current_percentage;
        }
      }

      let line_no = view.number as u64;
      let fail = |kind: FormatErrorKind| FormatError::new(path, line_no, kind);
      let line =
        std::str::from_utf8(view.content).map_err(|_| fail(FormatErrorKind::InvalidUtf8))?;
      let tokens = tokenizer.tokenize(line).map_err(&fail)?;
      if tokens.is_empty() || tokens[0].starts_with('#') {
        continue;
      }

      match tokens[0].as_ref() {
        "run" => {
          if tokens.len() < 2 {
            return Err(fail(FormatErrorKind::BadRunDeclaration).into());
          }
          index.run.run_name = tokens[1].to_string();
          index.run.run_entry_count += 1;
        }
        "param" => {
          if tokens.len() < 3 {
            return Err(fail(FormatErrorKind::BadParam).into());
          }
          index.run.module_params.set(tokens[1].as_ref(), tokens[2].as_ref());
        }
        "attr" => {
          if tokens.len() < 3 {
            return Err(fail(FormatErrorKind::BadAttribute).into());
          }
          // run attribute until the first vector declaration, then an
          // attribute of the most recently declared vector
          match index.last_vector_mut() {
            None => index.run.attributes.set(tokens[1].as_ref(), tokens[2].as_ref()),
            Some(vector) => vector.attributes.set(tokens[1].as_ref(), tokens[2].as_ref()),
          }
        }
        "vector" => {
          if tokens.len() < 4 {
            return Err(fail(FormatErrorKind::BadVectorDeclaration).into());
          }
          let vector_id = parse_int(&tokens[1])
            .ok_or_else(|| fail(FormatErrorKind::MalformedVectorId(tokens[1].to_string())))?;
          let columns = match tokens.get(4) {
            Some(t) if !t.starts_with(|c: char| c.is_ascii_digit()) => t.as_ref(),
            _ => DEFAULT_COLUMNS,
          };
          let vector = VectorInfo::new(vector_id, tokens[2].as_ref(), tokens[3].as_ref(), columns);
          if !index.add_vector(vector) {
            return Err(fail(FormatErrorKind::DuplicateVectorDecl(vector_id)).into());
          }
        }
        "version" => {
          let token = tokens
            .get(1)
            .ok_or_else(|| fail(FormatErrorKind::MissingVersion))?;
          let version = parse_int(token)
            .ok_or_else(|| fail(FormatErrorKind::MalformedVersion(token.to_string())))?;
          if version > MAX_VECTOR_FILE_VERSION {
            return Err(fail(FormatErrorKind::UnsupportedVersion(version)).into());
          }
        }
        first => {
          // data line: first token is a vector id, or the line is junk
          let Some(vector_id) = parse_int(first) else {
            index.unrecognised_line_count += 1;
            continue;
          };

          let switching = current.as_ref().is_none_or(|open| open.vector_id != vector_id);
          if switching {
            if let Some(open) = current.take() {
              close_block(&mut index, open, view.start_offset);
            }
            let vector = index
              .vector_by_id(vector_id)
              .ok_or_else(|| fail(FormatErrorKind::MissingVectorDecl(vector_id)))?;
            current = Some(OpenBlock {
              vector_id,
              columns: vector.columns.clone(),
              block: Block::starting_at(view.start_offset),
            });
          }
          let open = current.as_mut().expect("a block was just opened");

          let mut time = SimTime::ZERO;
          let mut value = 0.0f64;
          let mut event_num = -1i64;
          for (i, column) in open.columns.chars().enumerate() {
            let token = tokens
              .get(i + 1)
              .ok_or_else(|| fail(FormatErrorKind::TruncatedData))?;
            match column {
              'T' => {
                time = parse_simtime(token)
                  .ok_or_else(|| fail(FormatErrorKind::MalformedSimtime(token.to_string())))?;
              }
              'V' => {
                value = parse_double(token)
                  .ok_or_else(|| fail(FormatErrorKind::MalformedValue(token.to_string())))?;
              }
              'E' => {
                event_num = parse_int64(token)
                  .ok_or_else(|| fail(FormatErrorKind::MalformedEventNumber(token.to_string())))?;
              }
              // unknown column letters consume a token without effect
              _ => {}
            }
          }
          open.block.collect(event_num, time, value);
        }
      }
    }

    if let Some(open) = current.take()
      && open.block.count > 0
    {
      close_block(&mut index, open, file_size);
    }

    if index.unrecognised_line_count > 0 {
      warn!(
          vector_file = %path.display(),
          count = index.unrecognised_line_count,
          "skipped unrecognised lines"
      );
    }

    if monitor.is_canceled() {
      return Ok(IndexOutcome::Cancelled);
    }
    if read_percentage < 100 {
      monitor.worked((100 - read_percentage) as i32);
    }
    Ok(IndexOutcome::Completed(index))
  }
}

fn close_block(index: &mut VectorFileIndex, open: OpenBlock, end_offset: i64) {
  let mut block = open.block;
  block.size = end_offset - block.start_offset;
  // the vector was looked up when the block was opened
  if let Some(vector) = index.vector_by_id_mut(open.vector_id) {
    vector.add_block(block);
  }
}
