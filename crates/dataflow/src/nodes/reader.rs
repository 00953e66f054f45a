//! `vectorfilereader`: emits the samples of subscribed vectors.
//!
//! Output ports are created lazily by vector id (`port("3")` subscribes to
//! vector 3). Two read plans exist: a sequential scan of the whole file,
//! used when nothing better is known, and an index-driven plan that seeks
//! straight to the subscribed vectors' blocks when a [`VectorFileIndex`] is
//! available. Either way the node is tolerant: a line it cannot parse is
//! skipped, which is what makes it usable for rebuilding damaged files.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use simvex_core::{DEFAULT_COLUMNS, ProgressMonitor, Sample, SemanticError, SimTime, SimvexError, VectorFileIndex};
use tracing::trace;
use vecfile::{FileReader, LineTokenizer, ReaderConfig, TokenizerConfig, parse_double, parse_int, parse_int64,
  parse_simtime};

use crate::channel::ChannelRef;
use crate::manager::DataflowManager;
use crate::node::{NodeId, NodeKind, PortDirection, PortRef};
use crate::registry::{AttrMap, NodeType, NodeTypeRegistry, required_attr};

/// Lines handed on per `process` call in scan mode; one block is handed on
/// per call in indexed mode.
const LINES_PER_CYCLE: usize = 1024;

enum ReadPlan {
  Scan {
    reader: Option<FileReader>,
    /// columns learned from `vector` declaration lines while scanning
    columns: HashMap<i32, String>,
  },
  Indexed {
    index: Box<VectorFileIndex>,
    file: Option<File>,
    /// flattened (vector position, block position) cursor
    vector_pos: usize,
    block_pos: usize,
  },
}

pub struct VectorFileReaderNode {
  path: PathBuf,
  reader_config: ReaderConfig,
  tokenizer: LineTokenizer,
  plan: ReadPlan,
  ports: HashMap<i32, ChannelRef>,
  finished: bool,
  total_bytes: i64,
  processed_bytes: i64,
  reported_percent: i64,
}

impl VectorFileReaderNode {
  pub fn new(path: impl AsRef<Path>, reader_config: ReaderConfig, tokenizer_config: TokenizerConfig) -> Self {
    VectorFileReaderNode {
      path: path.as_ref().to_path_buf(),
      reader_config,
      tokenizer: LineTokenizer::new(tokenizer_config),
      plan: ReadPlan::Scan {
        reader: None,
        columns: HashMap::new(),
      },
      ports: HashMap::new(),
      finished: false,
      total_bytes: 0,
      processed_bytes: 0,
      reported_percent: 0,
    }
  }

  /// Switches to index-driven reads. Call before execution starts.
  pub fn set_index(&mut self, index: VectorFileIndex) {
    self.plan = ReadPlan::Indexed {
      index: Box::new(index),
      file: None,
      vector_pos: 0,
      block_pos: 0,
    };
  }

  pub fn is_ready(&self) -> bool {
    !self.finished
  }

  pub fn is_finished(&self) -> bool {
    self.finished
  }

  pub fn resolve_port(&mut self, self_id: NodeId, name: &str) -> Result<PortRef, SemanticError> {
    // out ports are named by decimal vector id and created on first lookup
    parse_int(name).ok_or_else(|| SemanticError::PortNotFound(name.to_string()))?;
    Ok(PortRef {
      node: self_id,
      name: name.to_string(),
      direction: PortDirection::Out,
    })
  }

  pub fn bind_port(&mut self, name: &str, direction: PortDirection, ch: ChannelRef) -> Result<(), SemanticError> {
    let vector_id = match (parse_int(name), direction) {
      (Some(id), PortDirection::Out) => id,
      _ => return Err(SemanticError::PortNotFound(name.to_string())),
    };
    if self.ports.insert(vector_id, ch).is_some() {
      return Err(SemanticError::PortAlreadyConnected(name.to_string()));
    }
    Ok(())
  }

  pub fn process(&mut self, monitor: &mut dyn ProgressMonitor) -> Result<(), SimvexError> {
    if matches!(self.plan, ReadPlan::Indexed { .. }) {
      self.process_indexed()?;
    } else {
      self.process_scan()?;
    }
    self.report_progress(monitor);
    if self.finished {
      for ch in self.ports.values() {
        ch.borrow_mut().close();
      }
      trace!(path = %self.path.display(), "reader node finished");
    }
    Ok(())
  }

  fn process_scan(&mut self) -> Result<(), SimvexError> {
    let ReadPlan::Scan { reader, columns } = &mut self.plan else {
      return Ok(());
    };
    if reader.is_none() {
      let opened = FileReader::open(&self.path, &self.reader_config)?;
      self.total_bytes = opened.file_size();
      *reader = Some(opened);
    }

    let mut eof = false;
    if let Some(r) = reader.as_mut() {
      for _ in 0..LINES_PER_CYCLE {
        let Some(view) = r.next_line()? else {
          eof = true;
          break;
        };
        self.processed_bytes = view.bytes_read;
        let Ok(line) = std::str::from_utf8(view.content) else {
          continue;
        };
        let Ok(tokens) = self.tokenizer.tokenize(line) else {
          continue;
        };
        if tokens.is_empty() || tokens[0].starts_with('#') {
          continue;
        }
        if tokens[0] == "vector" && tokens.len() >= 4 {
          if let Some(id) = parse_int(&tokens[1]) {
            let cols = match tokens.get(4) {
              Some(t) if !t.starts_with(|c: char| c.is_ascii_digit()) => t.as_ref(),
              _ => DEFAULT_COLUMNS,
            };
            columns.entry(id).or_insert_with(|| cols.to_string());
          }
          continue;
        }
        let Some(id) = parse_int(&tokens[0]) else {
          continue;
        };
        let Some(ch) = self.ports.get(&id) else {
          continue;
        };
        let cols = columns.get(&id).map(String::as_str).unwrap_or(DEFAULT_COLUMNS);
        if let Some(sample) = parse_sample(&tokens, cols) {
          ch.borrow_mut().push(sample);
        }
      }
    }
    if eof {
      self.processed_bytes = self.total_bytes;
      self.finished = true;
      // release the file handle as soon as the scan is over
      *reader = None;
    }
    Ok(())
  }

  fn process_indexed(&mut self) -> Result<(), SimvexError> {
    let ReadPlan::Indexed {
      index,
      file,
      vector_pos,
      block_pos,
    } = &mut self.plan
    else {
      return Ok(());
    };
    if file.is_none() {
      *file = Some(File::open(&self.path).map_err(|e| SimvexError::io(&self.path, e))?);
      self.total_bytes = index
        .vectors()
        .iter()
        .filter(|v| self.ports.contains_key(&v.vector_id))
        .flat_map(|v| v.blocks.iter().map(|b| b.size))
        .sum();
    }

    // advance to the next block of a subscribed vector
    loop {
      let Some(vector) = index.vectors().get(*vector_pos) else {
        self.finished = true;
        *file = None;
        return Ok(());
      };
      if !self.ports.contains_key(&vector.vector_id) || *block_pos >= vector.blocks.len() {
        *vector_pos += 1;
        *block_pos = 0;
        continue;
      }
      break;
    }

    let vector = &index.vectors()[*vector_pos];
    let block = &vector.blocks[*block_pos];
    *block_pos += 1;

    let Some(f) = file.as_mut() else {
      return Ok(());
    };
    let mut buf = vec![0u8; block.size as usize];
    f.seek(SeekFrom::Start(block.start_offset as u64))
      .map_err(|e| SimvexError::io(&self.path, e))?;
    f.read_exact(&mut buf).map_err(|e| SimvexError::io(&self.path, e))?;
    self.processed_bytes += block.size;

    let ch = &self.ports[&vector.vector_id];
    for raw in buf.split(|&b| b == b'\n') {
      let Ok(line) = std::str::from_utf8(raw) else {
        continue;
      };
      let Ok(tokens) = self.tokenizer.tokenize(line.trim_end_matches('\r')) else {
        continue;
      };
      if tokens.is_empty() || tokens[0].starts_with('#') {
        continue;
      }
      // only this vector's samples live in the block; anything else is junk
      if parse_int(&tokens[0]) != Some(vector.vector_id) {
        continue;
      }
      if let Some(sample) = parse_sample(&tokens, &vector.columns) {
        ch.borrow_mut().push(sample);
      }
    }
    Ok(())
  }

  fn report_progress(&mut self, monitor: &mut dyn ProgressMonitor) {
    if self.total_bytes <= 0 {
      return;
    }
    let percent = self.processed_bytes * 100 / self.total_bytes;
    if percent > self.reported_percent {
      monitor.worked((percent - self.reported_percent) as i32);
      self.reported_percent = percent;
    }
  }
}

/// Parses one data line against a columns string. `None` means the line is
/// not a usable sample; rebuild reads skip those silently.
fn parse_sample(tokens: &[std::borrow::Cow<'_, str>], columns: &str) -> Option<Sample> {
  let mut time = SimTime::ZERO;
  let mut value = 0.0f64;
  let mut event_num = -1i64;
  for (i, column) in columns.chars().enumerate() {
    let token = tokens.get(i + 1)?;
    match column {
      'T' => time = parse_simtime(token)?,
      'V' => value = parse_double(token)?,
      'E' => event_num = parse_int64(token)?,
      _ => {}
    }
  }
  Some(Sample { event_num, time, value })
}

#[derive(Debug, Default)]
pub struct VectorFileReaderNodeType;

impl NodeType for VectorFileReaderNodeType {
  fn name(&self) -> &str {
    "vectorfilereader"
  }

  fn description(&self) -> &str {
    "Reads samples of selected vectors from a vector file"
  }

  fn attributes(&self) -> Vec<(&str, &str)> {
    vec![("filename", "the vector file to read")]
  }

  fn create(
    &self,
    mgr: &mut DataflowManager,
    attrs: &AttrMap,
    _registry: &NodeTypeRegistry,
  ) -> Result<NodeId, SimvexError> {
    let filename = required_attr(self.name(), attrs, "filename")?;
    let node = VectorFileReaderNode::new(filename, ReaderConfig::default(), TokenizerConfig::default());
    Ok(mgr.add_node(NodeKind::Reader(node)))
  }
}
