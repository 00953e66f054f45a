//! Simple single-input single-output filter nodes.
//!
//! A [`FilterNode`] owns a [`FilterKind`] that maps each sample to at most
//! one output sample. [`NopNode`] is the degenerate pass-through used to
//! keep a compound filter with zero inner nodes legal.

use simvex_core::{Sample, SemanticError, SimvexError};

use crate::channel::ChannelRef;
use crate::manager::DataflowManager;
use crate::node::{NodeId, NodeKind, PortDirection, PortRef};
use crate::registry::{AttrMap, NodeType, NodeTypeRegistry};

/// The transform of a simple filter. Returning `None` drops the sample.
pub trait FilterKind: std::fmt::Debug {
  fn transform(&mut self, sample: Sample) -> Option<Sample>;
}

/// Adds a constant to every value.
#[derive(Debug)]
pub struct Adder {
  pub c: f64,
}

impl FilterKind for Adder {
  fn transform(&mut self, sample: Sample) -> Option<Sample> {
    Some(Sample {
      value: sample.value + self.c,
      ..sample
    })
  }
}

/// Multiplies every value by a constant.
#[derive(Debug)]
pub struct Multiplier {
  pub a: f64,
}

impl FilterKind for Multiplier {
  fn transform(&mut self, sample: Sample) -> Option<Sample> {
    Some(Sample {
      value: sample.value * self.a,
      ..sample
    })
  }
}

#[derive(Debug)]
pub struct FilterNode {
  kind: Box<dyn FilterKind>,
  input: Option<ChannelRef>,
  output: Option<ChannelRef>,
  finished: bool,
}

impl FilterNode {
  pub fn new(kind: Box<dyn FilterKind>) -> Self {
    FilterNode {
      kind,
      input: None,
      output: None,
      finished: false,
    }
  }

  pub fn is_ready(&self) -> bool {
    match (&self.input, &self.output) {
      (Some(input), Some(_)) => !self.finished && (!input.borrow().is_empty() || input.borrow().is_closed()),
      _ => false,
    }
  }

  pub fn is_finished(&self) -> bool {
    self.finished
  }

  pub fn process(&mut self) {
    let (Some(input), Some(output)) = (self.input.clone(), self.output.clone()) else {
      return;
    };
    let kind = &mut self.kind;
    if pump(&input, &output, |s| kind.transform(s)) {
      self.finished = true;
    }
  }

  pub fn bind_port(&mut self, name: &str, direction: PortDirection, ch: ChannelRef) -> Result<(), SemanticError> {
    bind_in_out(&mut self.input, &mut self.output, name, direction, ch)
  }

  pub fn resolve_port(&self, self_id: NodeId, name: &str) -> Result<PortRef, SemanticError> {
    resolve_in_out(self_id, name)
  }
}

/// Pass-through node; makes an empty compound filter chain legal.
#[derive(Debug, Default)]
pub struct NopNode {
  input: Option<ChannelRef>,
  output: Option<ChannelRef>,
  finished: bool,
}

impl NopNode {
  pub fn new() -> Self {
    NopNode::default()
  }

  pub fn is_ready(&self) -> bool {
    match (&self.input, &self.output) {
      (Some(input), Some(_)) => !self.finished && (!input.borrow().is_empty() || input.borrow().is_closed()),
      _ => false,
    }
  }

  pub fn is_finished(&self) -> bool {
    self.finished
  }

  pub fn process(&mut self) {
    let (Some(input), Some(output)) = (self.input.clone(), self.output.clone()) else {
      return;
    };
    if pump(&input, &output, Some) {
      self.finished = true;
    }
  }

  pub fn bind_port(&mut self, name: &str, direction: PortDirection, ch: ChannelRef) -> Result<(), SemanticError> {
    bind_in_out(&mut self.input, &mut self.output, name, direction, ch)
  }

  pub fn resolve_port(&self, self_id: NodeId, name: &str) -> Result<PortRef, SemanticError> {
    resolve_in_out(self_id, name)
  }
}

/// Drains `input` through `f` into `output`; returns true once the input is
/// drained for good, after closing the output.
fn pump(input: &ChannelRef, output: &ChannelRef, mut f: impl FnMut(Sample) -> Option<Sample>) -> bool {
  let mut input = input.borrow_mut();
  let mut output = output.borrow_mut();
  while let Some(sample) = input.pop() {
    if let Some(out) = f(sample) {
      output.push(out);
    }
  }
  if input.is_closed() {
    output.close();
    return true;
  }
  false
}

fn bind_in_out(
  input: &mut Option<ChannelRef>,
  output: &mut Option<ChannelRef>,
  name: &str,
  direction: PortDirection,
  ch: ChannelRef,
) -> Result<(), SemanticError> {
  let slot = match (name, direction) {
    ("in", PortDirection::In) => input,
    ("out", PortDirection::Out) => output,
    _ => return Err(SemanticError::PortNotFound(name.to_string())),
  };
  if slot.is_some() {
    return Err(SemanticError::PortAlreadyConnected(name.to_string()));
  }
  *slot = Some(ch);
  Ok(())
}

fn resolve_in_out(self_id: NodeId, name: &str) -> Result<PortRef, SemanticError> {
  let direction = match name {
    "in" => PortDirection::In,
    "out" => PortDirection::Out,
    _ => return Err(SemanticError::PortNotFound(name.to_string())),
  };
  Ok(PortRef {
    node: self_id,
    name: name.to_string(),
    direction,
  })
}

fn filter_attr(node_type: &str, attrs: &AttrMap, attr: &str) -> Result<f64, SemanticError> {
  let value = attrs.get(attr).ok_or_else(|| SemanticError::MissingNodeAttribute {
    node_type: node_type.to_string(),
    attr: attr.to_string(),
  })?;
  value.parse().map_err(|_| SemanticError::BadNodeAttribute {
    node_type: node_type.to_string(),
    attr: attr.to_string(),
    value: value.clone(),
  })
}

#[derive(Debug, Default)]
pub struct AdderNodeType;

impl NodeType for AdderNodeType {
  fn name(&self) -> &str {
    "add"
  }

  fn description(&self) -> &str {
    "Adds a constant to every value"
  }

  fn attributes(&self) -> Vec<(&str, &str)> {
    vec![("c", "the constant to add")]
  }

  fn create(
    &self,
    mgr: &mut DataflowManager,
    attrs: &AttrMap,
    _registry: &NodeTypeRegistry,
  ) -> Result<NodeId, SimvexError> {
    let c = filter_attr("add", attrs, "c")?;
    Ok(mgr.add_node(NodeKind::Filter(FilterNode::new(Box::new(Adder { c })))))
  }
}

#[derive(Debug, Default)]
pub struct MultiplierNodeType;

impl NodeType for MultiplierNodeType {
  fn name(&self) -> &str {
    "multiply"
  }

  fn description(&self) -> &str {
    "Multiplies every value by a constant"
  }

  fn attributes(&self) -> Vec<(&str, &str)> {
    vec![("a", "the multiplier")]
  }

  fn create(
    &self,
    mgr: &mut DataflowManager,
    attrs: &AttrMap,
    _registry: &NodeTypeRegistry,
  ) -> Result<NodeId, SimvexError> {
    let a = filter_attr("multiply", attrs, "a")?;
    Ok(mgr.add_node(NodeKind::Filter(FilterNode::new(Box::new(Multiplier { a })))))
  }
}

#[derive(Debug, Default)]
pub struct NopNodeType;

impl NodeType for NopNodeType {
  fn name(&self) -> &str {
    "nopnode"
  }

  fn description(&self) -> &str {
    "Passes samples through unchanged"
  }

  fn attributes(&self) -> Vec<(&str, &str)> {
    Vec::new()
  }

  fn create(
    &self,
    mgr: &mut DataflowManager,
    _attrs: &AttrMap,
    _registry: &NodeTypeRegistry,
  ) -> Result<NodeId, SimvexError> {
    Ok(mgr.add_node(NodeKind::Nop(NopNode::new())))
  }
}
