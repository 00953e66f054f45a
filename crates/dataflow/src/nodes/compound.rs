//! Compound filter types: a node type assembled at runtime from a chain of
//! inner filter nodes.
//!
//! Instantiating a compound type creates its inner nodes, wires them
//! `out`→`in` in order, and exposes the chain ends as the compound's own
//! `in` and `out` ports. An inner attribute whose value names one of the
//! outer attributes is substituted with the outer's value at creation; the
//! rewrite is purely textual and happens once.

use simvex_core::{SemanticError, SimvexError};

use crate::manager::DataflowManager;
use crate::node::{NodeId, NodeKind};
use crate::registry::{AttrMap, NodeType, NodeTypeRegistry};

/// One stage of a compound filter: which node type to instantiate and the
/// attribute values to hand it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subfilter {
  pub node_type: String,
  pub comment: String,
  pub attr_assignments: AttrMap,
}

impl Subfilter {
  pub fn new(node_type: impl Into<String>) -> Self {
    Subfilter {
      node_type: node_type.into(),
      ..Subfilter::default()
    }
  }
}

/// The inert container node representing an instantiated compound filter.
/// The inner chain does the work; this node only records the chain ends for
/// port resolution.
#[derive(Debug)]
pub struct CompoundFilterNode {
  pub first: NodeId,
  pub last: NodeId,
}

impl CompoundFilterNode {
  pub fn is_ready(&self) -> bool {
    false
  }

  pub fn is_finished(&self) -> bool {
    true
  }
}

#[derive(Debug, Clone, Default)]
pub struct CompoundFilterType {
  name: String,
  description: String,
  hidden: bool,
  /// (name, description) pairs, insertion-ordered.
  attrs: Vec<(String, String)>,
  defaults: AttrMap,
  subfilters: Vec<Subfilter>,
}

impl CompoundFilterType {
  pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
    CompoundFilterType {
      name: name.into(),
      description: description.into(),
      ..CompoundFilterType::default()
    }
  }

  pub fn set_attr(&mut self, name: &str, description: &str, default: &str) {
    match self.attrs.iter_mut().find(|(n, _)| n == name) {
      Some((_, d)) => *d = description.to_string(),
      None => self.attrs.push((name.to_string(), description.to_string())),
    }
    self.defaults.insert(name.to_string(), default.to_string());
  }

  pub fn remove_attr(&mut self, name: &str) {
    self.attrs.retain(|(n, _)| n != name);
    self.defaults.remove(name);
  }

  pub fn attr_defaults(&self) -> &AttrMap {
    &self.defaults
  }

  pub fn set_hidden(&mut self, hidden: bool) {
    self.hidden = hidden;
  }

  pub fn hidden(&self) -> bool {
    self.hidden
  }

  pub fn num_subfilters(&self) -> usize {
    self.subfilters.len()
  }

  pub fn subfilter(&self, pos: usize) -> Result<&Subfilter, SemanticError> {
    self.subfilters.get(pos).ok_or(SemanticError::InvalidSubfilterIndex {
      filter: self.name.clone(),
      index: pos,
    })
  }

  pub fn subfilter_mut(&mut self, pos: usize) -> Result<&mut Subfilter, SemanticError> {
    if pos >= self.subfilters.len() {
      return Err(SemanticError::InvalidSubfilterIndex {
        filter: self.name.clone(),
        index: pos,
      });
    }
    Ok(&mut self.subfilters[pos])
  }

  pub fn insert_subfilter(&mut self, pos: usize, subfilter: Subfilter) -> Result<(), SemanticError> {
    if pos > self.subfilters.len() {
      return Err(SemanticError::InvalidSubfilterIndex {
        filter: self.name.clone(),
        index: pos,
      });
    }
    self.subfilters.insert(pos, subfilter);
    Ok(())
  }

  pub fn remove_subfilter(&mut self, pos: usize) -> Result<(), SemanticError> {
    if pos >= self.subfilters.len() {
      return Err(SemanticError::InvalidSubfilterIndex {
        filter: self.name.clone(),
        index: pos,
      });
    }
    self.subfilters.remove(pos);
    Ok(())
  }
}

impl NodeType for CompoundFilterType {
  fn name(&self) -> &str {
    &self.name
  }

  fn description(&self) -> &str {
    &self.description
  }

  fn attributes(&self) -> Vec<(&str, &str)> {
    self.attrs.iter().map(|(n, d)| (n.as_str(), d.as_str())).collect()
  }

  fn create(
    &self,
    mgr: &mut DataflowManager,
    attrs: &AttrMap,
    registry: &NodeTypeRegistry,
  ) -> Result<NodeId, SimvexError> {
    let mut first = None;
    let mut prev: Option<NodeId> = None;

    if self.subfilters.is_empty() {
      // a chain needs at least one stage for the outer ports to land on
      let nop = mgr.add_node(NodeKind::Nop(crate::nodes::filters::NopNode::new()));
      first = Some(nop);
      prev = Some(nop);
    }

    for subfilter in &self.subfilters {
      let subtype = registry.lookup(&subfilter.node_type)?;

      // pick the attributes the inner type accepts, then substitute values
      // that name an outer attribute with the outer's value
      let mut subattrs = AttrMap::new();
      for (attr_name, _) in subtype.attributes() {
        let value = subfilter
          .attr_assignments
          .get(attr_name)
          .cloned()
          .unwrap_or_default();
        subattrs.insert(attr_name.to_string(), value);
      }
      for value in subattrs.values_mut() {
        if let Some(outer) = attrs.get(value.as_str()) {
          *value = outer.clone();
        }
      }

      let sub_id = subtype.create(mgr, &subattrs, registry)?;
      if !matches!(
        mgr.node(sub_id),
        NodeKind::Filter(_) | NodeKind::Nop(_) | NodeKind::Compound(_)
      ) {
        return Err(
          SemanticError::SubfilterNotAFilter {
            filter: self.name.clone(),
            node_type: subfilter.node_type.clone(),
          }
          .into(),
        );
      }

      if first.is_none() {
        first = Some(sub_id);
      }
      if let Some(prev_id) = prev {
        let out_port = mgr.port(prev_id, "out")?;
        let in_port = mgr.port(sub_id, "in")?;
        mgr.connect(&out_port, &in_port)?;
      }
      prev = Some(sub_id);
    }

    let (first, last) = match (first, prev) {
      (Some(first), Some(last)) => (first, last),
      // the chain always has at least one stage, the nop fallback included
      _ => unreachable!("compound filter chain is never empty"),
    };
    Ok(mgr.add_node(NodeKind::Compound(CompoundFilterNode { first, last })))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::registry::NodeTypeRegistry;

  #[test]
  fn test_subfilter_index_bounds() {
    let mut compound = CompoundFilterType::new("chain", "test chain");
    assert!(matches!(
      compound.subfilter(0),
      Err(SemanticError::InvalidSubfilterIndex { index: 0, .. })
    ));
    compound.insert_subfilter(0, Subfilter::new("nopnode")).unwrap();
    assert_eq!(compound.num_subfilters(), 1);
    assert!(compound.insert_subfilter(5, Subfilter::new("nopnode")).is_err());
    assert!(compound.remove_subfilter(3).is_err());
    compound.remove_subfilter(0).unwrap();
    assert_eq!(compound.num_subfilters(), 0);
  }

  #[test]
  fn test_attrs_and_defaults() {
    let mut compound = CompoundFilterType::new("chain", "test chain");
    compound.set_attr("offset", "the offset", "0");
    compound.set_attr("offset", "the offset, redescribed", "0");
    assert_eq!(compound.attributes(), vec![("offset", "the offset, redescribed")]);
    assert_eq!(compound.attr_defaults().get("offset").map(String::as_str), Some("0"));
    compound.remove_attr("offset");
    assert!(compound.attributes().is_empty());
  }

  #[test]
  fn test_unknown_inner_type_fails_at_create() {
    let mut compound = CompoundFilterType::new("chain", "test chain");
    compound.insert_subfilter(0, Subfilter::new("no-such-filter")).unwrap();
    let registry = NodeTypeRegistry::with_standard_types();
    let mut mgr = DataflowManager::new();
    match compound.create(&mut mgr, &AttrMap::new(), &registry) {
      Err(SimvexError::Semantic(SemanticError::UnknownNodeType(name))) => {
        assert_eq!(name, "no-such-filter")
      }
      other => panic!("expected UnknownNodeType, got {other:?}"),
    }
  }

  #[test]
  fn test_reader_is_not_a_legal_subfilter() {
    let mut compound = CompoundFilterType::new("chain", "test chain");
    let mut sub = Subfilter::new("vectorfilereader");
    sub
      .attr_assignments
      .insert("filename".to_string(), "whatever.vec".to_string());
    compound.insert_subfilter(0, sub).unwrap();
    let registry = NodeTypeRegistry::with_standard_types();
    let mut mgr = DataflowManager::new();
    match compound.create(&mut mgr, &AttrMap::new(), &registry) {
      Err(SimvexError::Semantic(SemanticError::SubfilterNotAFilter { node_type, .. })) => {
        assert_eq!(node_type, "vectorfilereader")
      }
      other => panic!("expected SubfilterNotAFilter, got {other:?}"),
    }
  }
}
