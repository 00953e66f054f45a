//! The node type registry.
//!
//! Node types are looked up by string name. A process-wide registry with
//! the standard types is built once and treated as immutable; code that
//! wants custom types (compound filters, tests) builds its own registry
//! value and passes it around explicitly.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use simvex_core::{SemanticError, SimvexError};

use crate::manager::DataflowManager;
use crate::node::NodeId;
use crate::nodes::filters::{AdderNodeType, MultiplierNodeType, NopNodeType};
use crate::nodes::reader::VectorFileReaderNodeType;
use crate::nodes::writer::IndexedVectorFileWriterNodeType;

/// Attribute assignments handed to `NodeType::create`.
pub type AttrMap = HashMap<String, String>;

pub trait NodeType: Send + Sync {
  fn name(&self) -> &str;

  fn description(&self) -> &str;

  /// The attribute names this type accepts, with descriptions.
  fn attributes(&self) -> Vec<(&str, &str)>;

  /// Instantiates the node (and, for compound types, its inner chain) in
  /// `mgr` and returns its id.
  fn create(
    &self,
    mgr: &mut DataflowManager,
    attrs: &AttrMap,
    registry: &NodeTypeRegistry,
  ) -> Result<NodeId, SimvexError>;
}

#[derive(Default)]
pub struct NodeTypeRegistry {
  types: HashMap<String, Arc<dyn NodeType>>,
}

impl NodeTypeRegistry {
  pub fn new() -> Self {
    NodeTypeRegistry::default()
  }

  /// Registry pre-populated with the standard node types.
  pub fn with_standard_types() -> Self {
    let mut registry = NodeTypeRegistry::new();
    registry.register(Arc::new(VectorFileReaderNodeType));
    registry.register(Arc::new(IndexedVectorFileWriterNodeType));
    registry.register(Arc::new(NopNodeType));
    registry.register(Arc::new(AdderNodeType));
    registry.register(Arc::new(MultiplierNodeType));
    registry
  }

  pub fn register(&mut self, node_type: Arc<dyn NodeType>) {
    self.types.insert(node_type.name().to_string(), node_type);
  }

  pub fn get(&self, name: &str) -> Option<&Arc<dyn NodeType>> {
    self.types.get(name)
  }

  pub fn lookup(&self, name: &str) -> Result<Arc<dyn NodeType>, SemanticError> {
    self
      .types
      .get(name)
      .cloned()
      .ok_or_else(|| SemanticError::UnknownNodeType(name.to_string()))
  }

  /// Looks up `type_name` and instantiates it in `mgr`.
  pub fn create(&self, mgr: &mut DataflowManager, type_name: &str, attrs: &AttrMap) -> Result<NodeId, SimvexError> {
    self.lookup(type_name)?.create(mgr, attrs, self)
  }

  pub fn names(&self) -> Vec<&str> {
    let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
  }
}

static STANDARD_REGISTRY: LazyLock<NodeTypeRegistry> = LazyLock::new(NodeTypeRegistry::with_standard_types);

/// The process-wide registry of standard node types. Populated once, never
/// mutated afterwards.
pub fn standard_registry() -> &'static NodeTypeRegistry {
  &STANDARD_REGISTRY
}

/// Fetches a required attribute or reports which one is missing.
pub fn required_attr<'a>(node_type: &str, attrs: &'a AttrMap, attr: &str) -> Result<&'a str, SemanticError> {
  attrs
    .get(attr)
    .map(String::as_str)
    .ok_or_else(|| SemanticError::MissingNodeAttribute {
      node_type: node_type.to_string(),
      attr: attr.to_string(),
    })
}
