// node.rs — The per-node contract and the shared node state
//
// Concrete node types embed a NodeBase (identity, ports, metadata, reverse
// dependency index) and implement `Node`. The trait is open: any crate can
// add node types, and the archive registry maps their type tags back to
// constructors.

use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::Result;
use crate::id::{InputPortRef, NodeId, OutputPortRef};
use crate::model::Model;
use crate::port::{InputPort, OutputPort, PortValue};
use crate::port_elements::PortElements;
use crate::transform::ModelTransformer;

/// Free-form string → JSON property bag attached to nodes, models and maps.
pub type PropertyBag = BTreeMap<String, Value>;

/// Structural role of a node, used by Map pruning and binding checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
    Compute,
    Input,
    Output,
    Sink,
    DebugSink,
}

/// Upcast helper so `&dyn Node` can be downcast to a concrete node type.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A vertex of the computation graph.
pub trait Node: AsAny + 'static {
    fn base(&self) -> &NodeBase;

    fn base_mut(&mut self) -> &mut NodeBase;

    /// Type tag, e.g. `MovingAverageNode<double>`. Also the archive key.
    fn type_name(&self) -> String;

    /// Read upstream caches and overwrite this node's own output caches.
    fn compute(&self, model: &Model) -> Result<()>;

    /// Add an equivalent node to the transformer's model and map every output.
    fn copy(&self, transformer: &mut ModelTransformer) -> Result<()>;

    /// Add a (possibly) simpler equivalent subgraph. Returns true if the node
    /// was expanded rather than copied.
    fn refine(&self, transformer: &mut ModelTransformer) -> Result<bool> {
        self.copy(transformer)?;
        Ok(false)
    }

    /// Whether a backend can emit code for this node directly.
    fn is_compilable(&self) -> bool {
        false
    }

    fn has_state(&self) -> bool {
        false
    }

    /// Clear internal state (delay lines, accumulators).
    fn reset(&self) {}

    fn role(&self) -> NodeRole {
        NodeRole::Compute
    }

    /// Per-type fields written to archives.
    fn archive_fields(&self) -> Result<Value> {
        Ok(Value::Null)
    }

    fn archive_version(&self) -> u32 {
        1
    }

    // Provided accessors.

    fn id(&self) -> NodeId {
        self.base().id()
    }

    fn input_ports(&self) -> &[InputPort] {
        self.base().inputs()
    }

    fn output_ports(&self) -> &[OutputPort] {
        self.base().outputs()
    }

    /// Nodes feeding any input port, deduplicated, in port order.
    fn parent_nodes(&self) -> Vec<NodeId> {
        let mut parents: Vec<NodeId> = Vec::new();
        for input in self.input_ports() {
            for parent in input.parent_nodes() {
                if !parents.contains(&parent) {
                    parents.push(parent);
                }
            }
        }
        parents
    }
}

/// Downcast a graph node to its concrete type.
pub fn downcast<N: Node>(node: &dyn Node) -> Option<&N> {
    node.as_any().downcast_ref::<N>()
}

/// State every node carries.
#[derive(Debug)]
pub struct NodeBase {
    id: NodeId,
    inputs: Vec<InputPort>,
    outputs: Vec<OutputPort>,
    metadata: PropertyBag,
    dependents: RefCell<Vec<NodeId>>,
}

impl Default for NodeBase {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeBase {
    /// Allocate a fresh identity with no ports.
    pub fn new() -> Self {
        NodeBase {
            id: NodeId::fresh(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            metadata: PropertyBag::new(),
            dependents: RefCell::new(Vec::new()),
        }
    }

    pub fn add_input<T: PortValue>(&mut self, name: &str, elements: PortElements) -> InputPortRef {
        let index = self.inputs.len();
        self.inputs
            .push(InputPort::new::<T>(self.id, index, name, elements));
        InputPortRef::new(self.id, index)
    }

    pub fn add_output<T: PortValue>(&mut self, name: &str, size: usize) -> OutputPortRef {
        let index = self.outputs.len();
        self.outputs
            .push(OutputPort::new::<T>(self.id, index, name, size));
        OutputPortRef::new(self.id, index)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn inputs(&self) -> &[InputPort] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OutputPort] {
        &self.outputs
    }

    /// Input port `index`. Node types index only ports they created.
    pub fn input(&self, index: usize) -> &InputPort {
        &self.inputs[index]
    }

    /// Output port `index`. Node types index only ports they created.
    pub fn output(&self, index: usize) -> &OutputPort {
        &self.outputs[index]
    }

    pub(crate) fn input_mut(&mut self, index: usize) -> Option<&mut InputPort> {
        self.inputs.get_mut(index)
    }

    pub fn metadata(&self) -> &PropertyBag {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut PropertyBag {
        &mut self.metadata
    }

    /// Nodes that consume one of this node's outputs, as of the last
    /// dependency registration.
    pub fn dependents(&self) -> Vec<NodeId> {
        self.dependents.borrow().clone()
    }

    pub(crate) fn add_dependent(&self, node: NodeId) {
        let mut dependents = self.dependents.borrow_mut();
        if !dependents.contains(&node) {
            dependents.push(node);
        }
    }

    pub(crate) fn remove_dependent(&self, node: NodeId) {
        self.dependents.borrow_mut().retain(|d| *d != node);
    }
}
