//! A miniature dataflow runtime: nodes connected by typed ports carrying
//! `(time, value, event)` samples, scheduled cooperatively on one thread.
//! Ships the standard node types used by the rebuild pipeline
//! (`vectorfilereader`, `indexedvectorfilewriter`, `nopnode`, the simple
//! value filters) and runtime-assembled compound filter types.

mod channel;
mod manager;
mod node;
mod nodes;
mod registry;

pub use channel::{Channel, ChannelRef, channel};
pub use manager::{DataflowManager, ExecuteOutcome};
pub use node::{NodeId, NodeKind, PortDirection, PortRef};
pub use nodes::compound::{CompoundFilterNode, CompoundFilterType, Subfilter};
pub use nodes::filters::{Adder, AdderNodeType, FilterKind, FilterNode, Multiplier, MultiplierNodeType, NopNode,
  NopNodeType};
pub use nodes::reader::{VectorFileReaderNode, VectorFileReaderNodeType};
pub use nodes::writer::{
  DEFAULT_BLOCK_SIZE, IndexedVectorFileWriterNode, IndexedVectorFileWriterNodeType, WriterNodeConfig,
};
pub use registry::{AttrMap, NodeType, NodeTypeRegistry, required_attr, standard_registry};
