// model.rs — Owning node registry with dependency-ordered traversal
//
// A Model owns every node by id. Nodes enter only through `add_node`, which
// validates the node's inputs against nodes already present and registers
// the reverse dependency index. Nodes are never removed individually: a
// smaller model is built by copying a Submodel through a ModelTransformer.
//
// Preconditions: inputs of an added node reference output ports of nodes
//                already in this model.
// Postconditions: every node reachable through input references is present;
//                 `visit_order` lists every node after all of its parents.
// Failure modes: dangling/mistyped inputs → `InvalidArgument`/`TypeMismatch`;
//                a cycle introduced via `reconnect_input` → `IllegalState`.
// Side effects: `compute_output` overwrites output caches of visited nodes.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use tracing::debug;

use crate::error::{ModelError, Result};
use crate::id::{InputPortRef, NodeId, OutputPortRef};
use crate::node::{downcast, Node, NodeRole, PropertyBag};
use crate::nodes::SpliceNode;
use crate::port::{InputPort, OutputPort, PortType, PortValue};
use crate::port_elements::PortElements;
use crate::submodel::Submodel;

/// Owning map from identity to node.
#[derive(Default)]
pub struct Model {
    nodes: BTreeMap<NodeId, Box<dyn Node>>,
    metadata: PropertyBag,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(metadata: PropertyBag) -> Self {
        Model {
            nodes: BTreeMap::new(),
            metadata,
        }
    }

    // ── Construction ────────────────────────────────────────────────────────

    /// Register a node and return a reference to it inside the model.
    pub fn add_node<N: Node>(&mut self, node: N) -> Result<&N> {
        let id = self.add_boxed(Box::new(node))?;
        self.node_as::<N>(id)
            .ok_or_else(|| ModelError::illegal(format!("node {id} changed type on insertion")))
    }

    /// Register an already boxed node, e.g. one built by an archive factory.
    pub fn add_boxed(&mut self, node: Box<dyn Node>) -> Result<NodeId> {
        let id = node.id();
        if self.nodes.contains_key(&id) {
            return Err(ModelError::illegal(format!("node {id} is already in the model")));
        }
        for input in node.input_ports() {
            self.check_input(input, input.elements())?;
        }
        debug!(node = %id, kind = %node.type_name(), "add node");
        self.nodes.insert(id, node);
        self.register_dependencies(id)?;
        Ok(id)
    }

    fn check_input(&self, input: &InputPort, elements: &PortElements) -> Result<()> {
        if elements.is_empty() {
            return Err(ModelError::invalid(format!(
                "input '{}' of {} references no elements",
                input.name(),
                input.node()
            )));
        }
        for range in elements.ranges() {
            let port = self.output_port(range.port)?;
            if port.port_type() != input.port_type() {
                return Err(ModelError::mismatch(input.port_type(), port.port_type()));
            }
            if range.end() > port.size() {
                return Err(ModelError::invalid(format!(
                    "range {range} exceeds port {} of size {}",
                    range.port,
                    port.size()
                )));
            }
        }
        Ok(())
    }

    /// Append `id` to the dependents of the owners of its current inputs and
    /// mark those ports referenced. Idempotent. Only the node's own parents
    /// are touched, so registering N nodes is linear in total fan-in.
    pub fn register_dependencies(&self, id: NodeId) -> Result<()> {
        let node = self.node(id)?;
        for input in node.input_ports() {
            for range in input.elements().ranges() {
                let parent = self.node(range.port.node)?;
                parent.base().add_dependent(id);
                self.output_port(range.port)?.mark_referenced();
            }
        }
        Ok(())
    }

    /// Re-point an input port and update the dependents index: parents the
    /// node no longer reads from drop it, new parents gain it.
    pub fn reconnect_input(&mut self, input: InputPortRef, elements: PortElements) -> Result<()> {
        let port = self.input_port(input)?;
        if port.size() != elements.size() {
            return Err(ModelError::invalid(format!(
                "input {input} has size {}, new elements have size {}",
                port.size(),
                elements.size()
            )));
        }
        self.check_input(port, &elements)?;
        let old_parents = port.elements().referenced_nodes();
        let node = self
            .nodes
            .get_mut(&input.node)
            .ok_or_else(|| ModelError::invalid(format!("no node {}", input.node)))?;
        let port = node
            .base_mut()
            .input_mut(input.index)
            .ok_or_else(|| ModelError::invalid(format!("no input port {input}")))?;
        port.set_elements(elements);

        let current: HashSet<NodeId> = self
            .node(input.node)?
            .input_ports()
            .iter()
            .flat_map(|p| p.elements().referenced_nodes())
            .collect();
        for parent in old_parents.into_iter().filter(|p| !current.contains(p)) {
            self.node(parent)?.base().remove_dependent(input.node);
        }
        self.register_dependencies(input.node)
    }

    /// Make `elements` available as one whole output port, adding a splice
    /// node when it is not one already.
    pub fn simplify_outputs(&mut self, elements: &PortElements) -> Result<PortElements> {
        if elements.is_empty() {
            return Err(ModelError::invalid("cannot simplify empty elements"));
        }
        let elements = elements.consolidate();
        if elements.is_full_port_output(self) {
            return Ok(elements);
        }
        let splice = match self.elements_type(&elements)? {
            PortType::Boolean => self.add_node(SpliceNode::<bool>::new(elements))?.id(),
            PortType::Integer => self.add_node(SpliceNode::<i32>::new(elements))?.id(),
            PortType::BigInt => self.add_node(SpliceNode::<i64>::new(elements))?.id(),
            PortType::SmallReal => self.add_node(SpliceNode::<f32>::new(elements))?.id(),
            PortType::Real => self.add_node(SpliceNode::<f64>::new(elements))?.id(),
            other => {
                return Err(ModelError::NotImplemented(format!(
                    "splicing ports of type {other}"
                )))
            }
        };
        let port = self.output_port(OutputPortRef::new(splice, 0))?;
        Ok(PortElements::from(port))
    }

    /// Common value type of every range in `elements`.
    pub fn elements_type(&self, elements: &PortElements) -> Result<PortType> {
        let mut found: Option<PortType> = None;
        for range in elements.ranges() {
            let ty = self.output_port(range.port)?.port_type();
            match found {
                Some(expected) if expected != ty => return Err(ModelError::mismatch(expected, ty)),
                _ => found = Some(ty),
            }
        }
        found.ok_or_else(|| ModelError::invalid("elements reference no ports"))
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Result<&dyn Node> {
        self.nodes
            .get(&id)
            .map(|n| &**n)
            .ok_or_else(|| ModelError::invalid(format!("no node {id} in model")))
    }

    pub fn node_as<N: Node>(&self, id: NodeId) -> Option<&N> {
        self.nodes.get(&id).and_then(|n| downcast::<N>(&**n))
    }

    /// All nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &dyn Node> + '_ {
        self.nodes.values().map(|n| &**n)
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    pub fn nodes_by_type<N: Node>(&self) -> Vec<&N> {
        self.nodes.values().filter_map(|n| downcast::<N>(&**n)).collect()
    }

    pub fn nodes_by_role(&self, role: NodeRole) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|n| n.role() == role)
            .map(|n| n.id())
            .collect()
    }

    pub fn output_port(&self, port: OutputPortRef) -> Result<&OutputPort> {
        self.node(port.node)?
            .output_ports()
            .get(port.index)
            .ok_or_else(|| ModelError::invalid(format!("no output port {port}")))
    }

    pub fn input_port(&self, port: InputPortRef) -> Result<&InputPort> {
        self.node(port.node)?
            .input_ports()
            .get(port.index)
            .ok_or_else(|| ModelError::invalid(format!("no input port {port}")))
    }

    pub fn metadata(&self) -> &PropertyBag {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut PropertyBag {
        &mut self.metadata
    }

    // ── Traversal ───────────────────────────────────────────────────────────

    /// Dependency-ordered ids of the nodes needed to compute `outputs`, or
    /// of the whole model when `outputs` is empty.
    pub fn visit_order(&self, outputs: &[NodeId]) -> Result<Vec<NodeId>> {
        self.traverse(outputs, &HashSet::new())
    }

    /// Like `visit_order`, but never descends through the input ports in
    /// `frontier`.
    pub fn traverse(&self, roots: &[NodeId], frontier: &HashSet<InputPortRef>) -> Result<Vec<NodeId>> {
        let roots: Vec<NodeId> = if roots.is_empty() {
            self.node_ids()
        } else {
            roots.to_vec()
        };

        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut in_progress: HashSet<NodeId> = HashSet::new();
        let mut order = Vec::new();
        // (node, expanded): a node is emitted when popped a second time,
        // after every parent pushed above it has been emitted.
        let mut stack: Vec<(NodeId, bool)> = Vec::new();

        for root in roots {
            if visited.contains(&root) {
                continue;
            }
            stack.push((root, false));
            while let Some((id, expanded)) = stack.pop() {
                if expanded {
                    in_progress.remove(&id);
                    if visited.insert(id) {
                        order.push(id);
                    }
                    continue;
                }
                if visited.contains(&id) {
                    continue;
                }
                if !in_progress.insert(id) {
                    return Err(ModelError::illegal(format!("cycle through node {id}")));
                }
                stack.push((id, true));
                let parents = self.parents_outside(id, frontier)?;
                for parent in parents.into_iter().rev() {
                    if !visited.contains(&parent) {
                        stack.push((parent, false));
                    }
                }
            }
        }
        Ok(order)
    }

    fn parents_outside(&self, id: NodeId, frontier: &HashSet<InputPortRef>) -> Result<Vec<NodeId>> {
        let node = self.node(id)?;
        let mut parents: Vec<NodeId> = Vec::new();
        for input in node.input_ports() {
            if frontier.contains(&input.port_ref()) {
                continue;
            }
            for parent in input.parent_nodes() {
                if !parents.contains(&parent) {
                    parents.push(parent);
                }
            }
        }
        Ok(parents)
    }

    /// Call `visitor` on every node needed for `outputs` (all nodes when
    /// empty), parents first.
    pub fn visit<F>(&self, outputs: &[NodeId], mut visitor: F) -> Result<()>
    where
        F: FnMut(&dyn Node) -> Result<()>,
    {
        for id in self.visit_order(outputs)? {
            visitor(self.node(id)?)?;
        }
        Ok(())
    }

    /// `visit` restricted to a validated slice: traversal stops at `inputs`.
    pub fn visit_submodel<F>(&self, inputs: &[InputPortRef], outputs: &[OutputPortRef], visitor: F) -> Result<()>
    where
        F: FnMut(&dyn Node) -> Result<()>,
    {
        Submodel::new(self, inputs.to_vec(), outputs.to_vec())?.visit(visitor)
    }

    // ── Compute ─────────────────────────────────────────────────────────────

    /// Compute each node `elements` depends on exactly once, then gather.
    pub fn compute_output<T: PortValue>(&self, elements: &PortElements) -> Result<Vec<T>> {
        self.visit(&elements.referenced_nodes(), |node| node.compute(self))?;
        self.values::<T>(elements)
    }

    /// `compute_output` over one whole output port.
    pub fn compute_port<T: PortValue>(&self, port: OutputPortRef) -> Result<Vec<T>> {
        let elements = PortElements::full(self.output_port(port)?);
        self.compute_output(&elements)
    }

    /// Current cached values of `elements`, without computing anything.
    pub fn values<T: PortValue>(&self, elements: &PortElements) -> Result<Vec<T>> {
        let mut out = Vec::with_capacity(elements.size());
        for range in elements.ranges() {
            self.output_port(range.port)?
                .read_range::<T>(range.start, range.count, &mut out)?;
        }
        Ok(out)
    }

    pub fn reset(&self) {
        for node in self.nodes.values() {
            node.reset();
        }
    }

    /// Graphviz rendering of the whole model.
    pub fn to_dot(&self) -> Result<String> {
        crate::dot::emit_dot(self)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let order = self.visit_order(&[]).map_err(|_| fmt::Error)?;
        for id in order {
            let node = self.node(id).map_err(|_| fmt::Error)?;
            write!(f, "{id} = {}(", node.type_name())?;
            for (i, input) in node.input_ports().iter().enumerate() {
                if i > 0 {
                    f.write_str("; ")?;
                }
                write!(f, "{}", input.elements())?;
            }
            writeln!(f, ")")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("nodes", &self.nodes.len())
            .field("metadata", &self.metadata)
            .finish()
    }
}
