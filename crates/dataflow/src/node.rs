//! The node variants of the graph.
//!
//! Nodes are a closed set, held as a tagged enum rather than boxed trait
//! objects so the manager and the rebuilder can reach concrete node APIs
//! (`add_vector`, `set_run`, `set_index`) without downcasting.

use simvex_core::{ProgressMonitor, SemanticError, SimvexError};

use crate::channel::ChannelRef;
use crate::nodes::compound::CompoundFilterNode;
use crate::nodes::filters::{FilterNode, NopNode};
use crate::nodes::reader::VectorFileReaderNode;
use crate::nodes::writer::IndexedVectorFileWriterNode;

pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
  In,
  Out,
}

/// A named port on a node, resolved but not necessarily connected yet.
#[derive(Debug, Clone)]
pub struct PortRef {
  pub node: NodeId,
  pub name: String,
  pub direction: PortDirection,
}

pub enum NodeKind {
  Reader(VectorFileReaderNode),
  Writer(IndexedVectorFileWriterNode),
  Filter(FilterNode),
  Compound(CompoundFilterNode),
  Nop(NopNode),
}

impl NodeKind {
  /// Whether `process` would make progress right now.
  pub fn is_ready(&self) -> bool {
    match self {
      NodeKind::Reader(n) => n.is_ready(),
      NodeKind::Writer(n) => n.is_ready(),
      NodeKind::Filter(n) => n.is_ready(),
      NodeKind::Compound(n) => n.is_ready(),
      NodeKind::Nop(n) => n.is_ready(),
    }
  }

  pub fn is_finished(&self) -> bool {
    match self {
      NodeKind::Reader(n) => n.is_finished(),
      NodeKind::Writer(n) => n.is_finished(),
      NodeKind::Filter(n) => n.is_finished(),
      NodeKind::Compound(n) => n.is_finished(),
      NodeKind::Nop(n) => n.is_finished(),
    }
  }

  /// Runs one cooperative slice of work.
  pub fn process(&mut self, monitor: &mut dyn ProgressMonitor) -> Result<(), SimvexError> {
    match self {
      NodeKind::Reader(n) => n.process(monitor),
      NodeKind::Writer(n) => n.process(),
      NodeKind::Filter(n) => {
        n.process();
        Ok(())
      }
      NodeKind::Compound(_) => Ok(()),
      NodeKind::Nop(n) => {
        n.process();
        Ok(())
      }
    }
  }

  pub(crate) fn bind_port(
    &mut self,
    name: &str,
    direction: PortDirection,
    ch: ChannelRef,
  ) -> Result<(), SemanticError> {
    match self {
      NodeKind::Reader(n) => n.bind_port(name, direction, ch),
      NodeKind::Writer(n) => n.bind_port(name, direction, ch),
      NodeKind::Filter(n) => n.bind_port(name, direction, ch),
      // compound ports resolve to inner nodes before binding
      NodeKind::Compound(_) => Err(SemanticError::PortNotFound(name.to_string())),
      NodeKind::Nop(n) => n.bind_port(name, direction, ch),
    }
  }
}
