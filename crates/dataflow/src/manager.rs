//! The cooperative single-threaded scheduler over the node graph.
//!
//! `execute` loops round-robin over the nodes, giving every ready node one
//! processing slice per pass, until all nodes are finished. A full pass in
//! which nothing is ready and something is unfinished means the graph is
//! mis-wired; that is reported as a deadlock rather than spinning forever.
//! Cancellation is polled once per pass.

use simvex_core::{ProgressMonitor, SemanticError, SimvexError, VectorInfo};
use tracing::{debug, trace};

use crate::channel::channel;
use crate::node::{NodeId, NodeKind, PortDirection, PortRef};
use crate::nodes::reader::VectorFileReaderNode;
use crate::nodes::writer::IndexedVectorFileWriterNode;

/// How a graph execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteOutcome {
  Completed,
  Cancelled,
}

#[derive(Default)]
pub struct DataflowManager {
  nodes: Vec<NodeKind>,
}

impl DataflowManager {
  pub fn new() -> Self {
    DataflowManager::default()
  }

  pub fn add_node(&mut self, node: NodeKind) -> NodeId {
    self.nodes.push(node);
    self.nodes.len() - 1
  }

  pub fn node(&self, id: NodeId) -> &NodeKind {
    &self.nodes[id]
  }

  pub fn node_mut(&mut self, id: NodeId) -> &mut NodeKind {
    &mut self.nodes[id]
  }

  pub fn num_nodes(&self) -> usize {
    self.nodes.len()
  }

  pub fn reader_mut(&mut self, id: NodeId) -> Option<&mut VectorFileReaderNode> {
    match self.nodes.get_mut(id) {
      Some(NodeKind::Reader(n)) => Some(n),
      _ => None,
    }
  }

  pub fn writer_mut(&mut self, id: NodeId) -> Option<&mut IndexedVectorFileWriterNode> {
    match self.nodes.get_mut(id) {
      Some(NodeKind::Writer(n)) => Some(n),
      _ => None,
    }
  }

  /// Allocates a writer input port for `vector`. Shorthand that keeps the
  /// node id plumbing in one place.
  pub fn writer_add_vector(&mut self, id: NodeId, vector: &VectorInfo) -> Result<PortRef, SimvexError> {
    match self.nodes.get_mut(id) {
      Some(NodeKind::Writer(w)) => Ok(w.add_vector(id, vector)),
      _ => Err(SemanticError::UnknownNodeType("indexedvectorfilewriter".to_string()).into()),
    }
  }

  /// Resolves a named port. Compound nodes forward `in` to their first
  /// inner node and `out` to their last.
  pub fn port(&mut self, node: NodeId, name: &str) -> Result<PortRef, SimvexError> {
    let mut node = node;
    loop {
      match &self.nodes[node] {
        NodeKind::Compound(c) => {
          node = match name {
            "in" => c.first,
            "out" => c.last,
            _ => return Err(SemanticError::PortNotFound(name.to_string()).into()),
          };
        }
        _ => break,
      }
    }
    let resolved = match &mut self.nodes[node] {
      NodeKind::Reader(n) => n.resolve_port(node, name)?,
      NodeKind::Writer(n) => n.resolve_port(node, name)?,
      NodeKind::Filter(n) => n.resolve_port(node, name)?,
      NodeKind::Nop(n) => n.resolve_port(node, name)?,
      NodeKind::Compound(_) => unreachable!("compound indirection was followed above"),
    };
    Ok(resolved)
  }

  /// Connects an `out` port to an `in` port with a fresh channel.
  pub fn connect(&mut self, from: &PortRef, to: &PortRef) -> Result<(), SimvexError> {
    if from.direction != PortDirection::Out || to.direction != PortDirection::In {
      return Err(
        SemanticError::InvalidConnection {
          from: from.name.clone(),
          to: to.name.clone(),
        }
        .into(),
      );
    }
    let ch = channel();
    self.nodes[from.node].bind_port(&from.name, PortDirection::Out, ch.clone())?;
    self.nodes[to.node].bind_port(&to.name, PortDirection::In, ch)?;
    trace!(from = %from.name, to = %to.name, "connected ports");
    Ok(())
  }

  /// Runs the graph to completion or cancellation.
  pub fn execute(&mut self, monitor: &mut dyn ProgressMonitor) -> Result<ExecuteOutcome, SimvexError> {
    debug!(nodes = self.nodes.len(), "executing dataflow graph");
    loop {
      if monitor.is_canceled() {
        return Ok(ExecuteOutcome::Cancelled);
      }
      let mut progressed = false;
      let mut finished = 0usize;
      for i in 0..self.nodes.len() {
        if self.nodes[i].is_finished() {
          finished += 1;
          continue;
        }
        if self.nodes[i].is_ready() {
          self.nodes[i].process(monitor)?;
          progressed = true;
        }
      }
      if finished == self.nodes.len() {
        return Ok(ExecuteOutcome::Completed);
      }
      if !progressed {
        return Err(SemanticError::Deadlock(self.nodes.len() - finished).into());
      }
    }
  }
}
