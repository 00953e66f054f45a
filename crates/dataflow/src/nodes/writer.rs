//! `indexedvectorfilewriter`: writes incoming samples to a vector file,
//! partitioned into fixed-size blocks, and emits the matching sidecar index
//! when all inputs are drained.
//!
//! Input ports are allocated through `add_vector`, one per vector, before
//! execution. Samples are buffered per port; a buffer reaching the
//! configured block size is flushed as one contiguous block and recorded in
//! the index under construction. Run metadata must be supplied via
//! `set_run` before the first sample is processed.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use index::IndexFileWriter;
use simvex_core::{
  Block, DEFAULT_COLUMNS, FileFingerprint, Run, Sample, SemanticError, SimvexError, VectorFileIndex, VectorInfo,
};
use tracing::{debug, trace};
use vecfile::parse_int;

use crate::channel::ChannelRef;
use crate::manager::DataflowManager;
use crate::node::{NodeId, NodeKind, PortDirection, PortRef};
use crate::registry::{AttrMap, NodeType, NodeTypeRegistry, required_attr};

pub const DEFAULT_BLOCK_SIZE: i64 = 65536;

#[derive(Debug, Clone)]
pub struct WriterNodeConfig {
  /// Byte threshold at which a per-vector buffer is flushed as a block.
  pub block_size: i64,
  /// Comment line written at the top of the output file, without the `#`.
  pub file_header: String,
  /// Vector-file name recorded inside the sidecar. Defaults to the output
  /// path; callers writing to a temp file that will be renamed set this to
  /// the final name.
  pub recorded_file_name: Option<String>,
}

impl Default for WriterNodeConfig {
  fn default() -> Self {
    WriterNodeConfig {
      block_size: DEFAULT_BLOCK_SIZE,
      file_header: String::new(),
      recorded_file_name: None,
    }
  }
}

struct PortState {
  /// Vector metadata; blocks and block_size accumulate as flushes happen.
  info: VectorInfo,
  /// Columns actually emitted: the declared ones restricted to `{T,V,E}`.
  columns: String,
  channel: Option<ChannelRef>,
  buffer: String,
  stats: Block,
}

pub struct IndexedVectorFileWriterNode {
  file_name: PathBuf,
  index_file_name: PathBuf,
  config: WriterNodeConfig,
  run: Option<Run>,
  ports: Vec<PortState>,
  out: Option<BufWriter<File>>,
  bytes_written: i64,
  finished: bool,
}

impl IndexedVectorFileWriterNode {
  pub fn new(file_name: impl AsRef<Path>, index_file_name: impl AsRef<Path>, config: WriterNodeConfig) -> Self {
    IndexedVectorFileWriterNode {
      file_name: file_name.as_ref().to_path_buf(),
      index_file_name: index_file_name.as_ref().to_path_buf(),
      config,
      run: None,
      ports: Vec::new(),
      out: None,
      bytes_written: 0,
      finished: false,
    }
  }

  /// Supplies the run stanza for the output files. Must be called before
  /// execution starts.
  pub fn set_run(&mut self, run: Run) {
    self.run = Some(run);
  }

  /// Allocates an input port for one vector and returns its reference.
  /// The port is named by the decimal vector id.
  pub fn add_vector(&mut self, self_id: NodeId, vector: &VectorInfo) -> PortRef {
    let mut info = vector.clone();
    info.blocks.clear();
    info.block_size = 0;
    let mut columns: String = info.columns.chars().filter(|c| "TVE".contains(*c)).collect();
    if columns.is_empty() {
      columns = DEFAULT_COLUMNS.to_string();
    }
    info.columns = columns.clone();
    self.ports.push(PortState {
      info,
      columns,
      channel: None,
      buffer: String::new(),
      stats: Block::default(),
    });
    PortRef {
      node: self_id,
      name: vector.vector_id.to_string(),
      direction: PortDirection::In,
    }
  }

  pub fn is_ready(&self) -> bool {
    if self.finished {
      return false;
    }
    let mut all_drained = true;
    for port in &self.ports {
      match &port.channel {
        Some(ch) => {
          let ch = ch.borrow();
          if !ch.is_empty() {
            return true;
          }
          if !ch.is_drained() {
            all_drained = false;
          }
        }
        None => all_drained = false,
      }
    }
    // nothing queued: ready exactly once more, to finalize
    all_drained
  }

  pub fn is_finished(&self) -> bool {
    self.finished
  }

  pub fn resolve_port(&self, self_id: NodeId, name: &str) -> Result<PortRef, SemanticError> {
    let vector_id = parse_int(name).ok_or_else(|| SemanticError::PortNotFound(name.to_string()))?;
    if !self.ports.iter().any(|p| p.info.vector_id == vector_id) {
      return Err(SemanticError::PortNotFound(name.to_string()));
    }
    Ok(PortRef {
      node: self_id,
      name: name.to_string(),
      direction: PortDirection::In,
    })
  }

  pub fn bind_port(&mut self, name: &str, direction: PortDirection, ch: ChannelRef) -> Result<(), SemanticError> {
    let vector_id = match (parse_int(name), direction) {
      (Some(id), PortDirection::In) => id,
      _ => return Err(SemanticError::PortNotFound(name.to_string())),
    };
    let port = self
      .ports
      .iter_mut()
      .find(|p| p.info.vector_id == vector_id)
      .ok_or_else(|| SemanticError::PortNotFound(name.to_string()))?;
    if port.channel.is_some() {
      return Err(SemanticError::PortAlreadyConnected(name.to_string()));
    }
    port.channel = Some(ch);
    Ok(())
  }

  pub fn process(&mut self) -> Result<(), SimvexError> {
    if self.out.is_none() {
      self.open_and_write_preamble()?;
    }

    for i in 0..self.ports.len() {
      loop {
        let sample = match &self.ports[i].channel {
          Some(ch) => ch.borrow_mut().pop(),
          None => None,
        };
        let Some(sample) = sample else { break };
        self.append_sample(i, &sample);
        if self.ports[i].buffer.len() as i64 >= self.config.block_size {
          self.flush_block(i)?;
        }
      }
    }

    let all_drained = self
      .ports
      .iter()
      .all(|p| p.channel.as_ref().is_some_and(|ch| ch.borrow().is_drained()));
    if all_drained {
      self.finalize()?;
    }
    Ok(())
  }

  fn open_and_write_preamble(&mut self) -> Result<(), SimvexError> {
    let run = self.run.clone().ok_or(SemanticError::RunNotSet)?;
    let file = File::create(&self.file_name).map_err(|e| SimvexError::io(&self.file_name, e))?;
    let mut out = BufWriter::new(file);

    let mut preamble = String::new();
    if !self.config.file_header.is_empty() {
      let _ = writeln!(preamble, "# {}", self.config.file_header);
    }
    let _ = writeln!(preamble, "version 2");
    let _ = writeln!(preamble, "run {}", vecfile::quote_if_needed(&run.run_name));
    for (name, value) in run.attributes.iter() {
      let _ = writeln!(
        preamble,
        "attr {} {}",
        vecfile::quote_if_needed(name),
        vecfile::quote_if_needed(value)
      );
    }
    for (name, value) in run.module_params.iter() {
      let _ = writeln!(
        preamble,
        "param {} {}",
        vecfile::quote_if_needed(name),
        vecfile::quote_if_needed(value)
      );
    }
    for port in &self.ports {
      let _ = writeln!(
        preamble,
        "vector {} {} {} {}",
        port.info.vector_id,
        vecfile::quote_if_needed(&port.info.module_name),
        vecfile::quote_if_needed(&port.info.name),
        port.columns
      );
      for (name, value) in port.info.attributes.iter() {
        let _ = writeln!(
          preamble,
          "attr {} {}",
          vecfile::quote_if_needed(name),
          vecfile::quote_if_needed(value)
        );
      }
    }

    out
      .write_all(preamble.as_bytes())
      .map_err(|e| SimvexError::io(&self.file_name, e))?;
    self.bytes_written = preamble.len() as i64;
    self.out = Some(out);
    trace!(file = %self.file_name.display(), "writer node opened output");
    Ok(())
  }

  fn append_sample(&mut self, port_idx: usize, sample: &Sample) {
    let port = &mut self.ports[port_idx];
    let _ = write!(port.buffer, "{}", port.info.vector_id);
    for column in port.columns.chars() {
      match column {
        'T' => {
          let _ = write!(port.buffer, "\t{}", sample.time);
        }
        'V' => {
          let _ = write!(port.buffer, "\t{}", sample.value);
        }
        'E' => {
          let _ = write!(port.buffer, "\t{}", sample.event_num);
        }
        _ => {}
      }
    }
    port.buffer.push('\n');
    port.stats.collect(sample.event_num, sample.time, sample.value);
  }

  fn flush_block(&mut self, port_idx: usize) -> Result<(), SimvexError> {
    let port = &mut self.ports[port_idx];
    if port.buffer.is_empty() {
      return Ok(());
    }
    let Some(out) = self.out.as_mut() else {
      return Ok(());
    };
    out
      .write_all(port.buffer.as_bytes())
      .map_err(|e| SimvexError::io(&self.file_name, e))?;

    let mut block = std::mem::take(&mut port.stats);
    block.start_offset = self.bytes_written;
    block.size = port.buffer.len() as i64;
    self.bytes_written += block.size;
    port.info.add_block(block);
    port.buffer.clear();
    Ok(())
  }

  fn finalize(&mut self) -> Result<(), SimvexError> {
    for i in 0..self.ports.len() {
      if self.ports[i].stats.count > 0 || !self.ports[i].buffer.is_empty() {
        self.flush_block(i)?;
      }
    }
    if let Some(mut out) = self.out.take() {
      out.flush().map_err(|e| SimvexError::io(&self.file_name, e))?;
      out
        .get_ref()
        .sync_all()
        .map_err(|e| SimvexError::io(&self.file_name, e))?;
    }

    let recorded_name = self
      .config
      .recorded_file_name
      .clone()
      .unwrap_or_else(|| self.file_name.display().to_string());
    let mut index = VectorFileIndex::new(recorded_name);
    index.run = self.run.clone().unwrap_or_default();
    index.fingerprint =
      FileFingerprint::of_file(&self.file_name).map_err(|e| SimvexError::io(&self.file_name, e))?;
    for port in &self.ports {
      index.add_vector(port.info.clone());
    }
    IndexFileWriter::default().write(&index, &self.index_file_name)?;

    self.finished = true;
    debug!(
        file = %self.file_name.display(),
        index_file = %self.index_file_name.display(),
        vectors = self.ports.len(),
        "writer node finalized output and index"
    );
    Ok(())
  }
}

#[derive(Debug, Default)]
pub struct IndexedVectorFileWriterNodeType;

impl NodeType for IndexedVectorFileWriterNodeType {
  fn name(&self) -> &str {
    "indexedvectorfilewriter"
  }

  fn description(&self) -> &str {
    "Writes samples into a block-aligned vector file plus its index"
  }

  fn attributes(&self) -> Vec<(&str, &str)> {
    vec![
      ("filename", "the output vector file"),
      ("indexfilename", "the output index file"),
      ("blocksize", "byte size of the output blocks"),
      ("fileheader", "comment line written at the top of the output"),
      ("vectorfilename", "name recorded in the index, when it differs from filename"),
    ]
  }

  fn create(
    &self,
    mgr: &mut DataflowManager,
    attrs: &AttrMap,
    _registry: &NodeTypeRegistry,
  ) -> Result<NodeId, SimvexError> {
    let filename = required_attr(self.name(), attrs, "filename")?;
    let index_filename = required_attr(self.name(), attrs, "indexfilename")?;
    let block_size = match attrs.get("blocksize") {
      None => DEFAULT_BLOCK_SIZE,
      Some(raw) => raw.parse().map_err(|_| SemanticError::BadNodeAttribute {
        node_type: self.name().to_string(),
        attr: "blocksize".to_string(),
        value: raw.clone(),
      })?,
    };
    let config = WriterNodeConfig {
      block_size,
      file_header: attrs.get("fileheader").cloned().unwrap_or_default(),
      recorded_file_name: attrs.get("vectorfilename").cloned(),
    };
    let node = IndexedVectorFileWriterNode::new(filename, index_filename, config);
    Ok(mgr.add_node(NodeKind::Writer(node)))
  }
}
