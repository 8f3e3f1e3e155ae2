// transform.rs — Copy/refine passes and the per-node action policy
//
// A ModelTransformer walks a source model in dependency order and lets each
// node emit its replacement into a fresh model, recording an old → new
// remap for every node and output port. Nothing holding ids into the source
// model is updated automatically: holders re-resolve through the remap
// tables after each pass (the Map does this in `fix_transformed_io`).
//
// Preconditions: the source model is acyclic.
// Postconditions: after a pass, every source node that emitted something has
//                 a node remap entry and every output port it mapped has a
//                 port remap entry; multi-round refinement composes remaps so
//                 they always read original → final.
// Failure modes: unmapped port lookups → `InvalidArgument`; a node that is
//                neither compilable nor refinable → `IllegalState`;
//                `max_iterations == 0` → `InvalidArgument`.
// Side effects: none on the source model.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::error::{ModelError, Result};
use crate::id::{NodeId, OutputPortRef};
use crate::map::Map;
use crate::model::Model;
use crate::node::{Node, NodeRole, PropertyBag};
use crate::nodes::SpliceNode;
use crate::port::{InputPort, OutputPort, PortType};
use crate::port_elements::{PortElements, PortRange};
use crate::submodel::Submodel;

// ── Policy ──────────────────────────────────────────────────────────────────

/// What a refine pass does with one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeAction {
    Abstain,
    Refine,
    Compile,
}

/// Code generation backend as seen by this layer: a compilability oracle
/// plus a lowering hook invoked on a fully refined map.
pub trait CompilerBackend {
    fn name(&self) -> &str;

    fn is_node_compilable(&self, node: &dyn Node) -> bool;

    fn lower(&self, map: &Map) -> Result<()>;
}

pub type NodeActionFunction = Rc<dyn Fn(&dyn Node) -> NodeAction>;

/// Per-node refine/compile policy.
#[derive(Clone, Default)]
pub struct TransformContext {
    action_functions: Vec<NodeActionFunction>,
    backend: Option<Rc<dyn CompilerBackend>>,
}

impl TransformContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(backend: Rc<dyn CompilerBackend>) -> Self {
        TransformContext {
            action_functions: Vec::new(),
            backend: Some(backend),
        }
    }

    pub fn backend(&self) -> Option<&Rc<dyn CompilerBackend>> {
        self.backend.as_ref()
    }

    /// Register a decision function. Later registrations take precedence.
    pub fn add_node_action_function<F>(&mut self, f: F)
    where
        F: Fn(&dyn Node) -> NodeAction + 'static,
    {
        self.action_functions.push(Rc::new(f));
    }

    /// Backend verdict when one is attached, else the node's own.
    pub fn is_node_compilable(&self, node: &dyn Node) -> bool {
        match &self.backend {
            Some(backend) => backend.is_node_compilable(node),
            None => node.is_compilable(),
        }
    }

    /// The newest non-abstaining decision function wins; without one, compile
    /// what is compilable and refine the rest.
    pub fn node_action(&self, node: &dyn Node) -> NodeAction {
        for f in self.action_functions.iter().rev() {
            let action = f(node);
            if action != NodeAction::Abstain {
                return action;
            }
        }
        if self.is_node_compilable(node) {
            NodeAction::Compile
        } else {
            NodeAction::Refine
        }
    }
}

impl fmt::Debug for TransformContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformContext")
            .field("action_functions", &self.action_functions.len())
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_string()))
            .finish()
    }
}

// ── Transformer ─────────────────────────────────────────────────────────────

/// Runs copy/refine/custom passes and owns the resulting remap tables.
#[derive(Debug, Default)]
pub struct ModelTransformer {
    model: Model,
    context: TransformContext,
    port_map: HashMap<OutputPortRef, OutputPortRef>,
    node_map: HashMap<NodeId, NodeId>,
    input_nodes: HashMap<NodeId, NodeId>,
    is_model_compilable: bool,
    source_metadata: PropertyBag,
    last_added: Option<NodeId>,
}

impl ModelTransformer {
    pub fn new(context: TransformContext) -> Self {
        ModelTransformer {
            context,
            ..Self::default()
        }
    }

    pub fn context(&self) -> &TransformContext {
        &self.context
    }

    /// The model being built by the current pass.
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// True when every node of the last refined model is compilable.
    pub fn is_model_compilable(&self) -> bool {
        self.is_model_compilable
    }

    // ── Passes ──────────────────────────────────────────────────────────────

    /// Deep copy of `model`.
    pub fn copy_model(&mut self, model: &Model) -> Result<Model> {
        self.transform_model(model, |node, transformer| node.copy(transformer))
    }

    /// Copy of the nodes a submodel visits. Submodels with declared inputs
    /// need somewhere to attach them; use `copy_submodel_onto`.
    pub fn copy_submodel(&mut self, submodel: &Submodel<'_>) -> Result<Model> {
        let destination = Model::with_metadata(submodel.model().metadata().clone());
        self.copy_submodel_onto(submodel, destination, &[])
    }

    /// Graft a copy of `submodel` onto `destination`, wiring declared input
    /// `i` to `onto[i]`. Each declared input must read one whole port.
    pub fn copy_submodel_onto(
        &mut self,
        submodel: &Submodel<'_>,
        destination: Model,
        onto: &[PortElements],
    ) -> Result<Model> {
        if onto.len() != submodel.inputs().len() {
            return Err(ModelError::invalid(format!(
                "submodel declares {} inputs, {} attachment points given",
                submodel.inputs().len(),
                onto.len()
            )));
        }
        self.start_pass(destination);
        let source = submodel.model();
        for (input, target) in submodel.inputs().iter().zip(onto) {
            let port = source.input_port(*input)?;
            let upstream = port.elements().full_port(source).ok_or_else(|| {
                ModelError::NotImplemented(format!(
                    "submodel input {input} must reference one whole output port"
                ))
            })?;
            if target.size() != port.size() {
                return Err(ModelError::invalid(format!(
                    "input {input} has size {}, attachment has size {}",
                    port.size(),
                    target.size()
                )));
            }
            let target_type = self.model.elements_type(target)?;
            if target_type != port.port_type() {
                return Err(ModelError::mismatch(port.port_type(), target_type));
            }
            let attached = self.model.simplify_outputs(target)?;
            let attached_port = attached
                .full_port(&self.model)
                .ok_or_else(|| ModelError::illegal("simplified attachment is not a whole port"))?;
            self.port_map.insert(upstream, attached_port);
        }
        for id in submodel.visit_order()? {
            let node = source.node(id)?;
            self.begin_node(node);
            node.copy(self)?;
            self.end_node(node);
        }
        debug!(nodes = self.model.size(), "copied submodel");
        Ok(std::mem::take(&mut self.model))
    }

    /// Run refine passes until nothing refines, every node is compilable, or
    /// `max_iterations` passes have run.
    pub fn refine_model(&mut self, model: &Model, max_iterations: usize) -> Result<Model> {
        if max_iterations == 0 {
            return Err(ModelError::invalid("max_iterations must be positive"));
        }
        let (mut current, mut did_refine) = self.refine_pass(model)?;
        let mut iteration = 1;
        while did_refine && !self.is_model_compilable && iteration < max_iterations {
            let port_map = std::mem::take(&mut self.port_map);
            let node_map = std::mem::take(&mut self.node_map);
            let input_nodes = std::mem::take(&mut self.input_nodes);
            let (next, refined) = self.refine_pass(&current)?;
            self.port_map = compose(&port_map, &self.port_map);
            self.node_map = compose(&node_map, &self.node_map);
            self.input_nodes = compose(&input_nodes, &self.input_nodes);
            current = next;
            did_refine = refined;
            iteration += 1;
        }
        if !self.is_model_compilable {
            warn!(
                iterations = iteration,
                "refinement stopped with uncompilable nodes remaining"
            );
        }
        Ok(current)
    }

    fn refine_pass(&mut self, model: &Model) -> Result<(Model, bool)> {
        self.start_pass(Model::with_metadata(model.metadata().clone()));
        let mut did_refine = false;
        for id in model.visit_order(&[])? {
            let node = model.node(id)?;
            self.begin_node(node);
            match self.context.node_action(node) {
                NodeAction::Refine => {
                    let refined = node.refine(self)?;
                    if !refined && !self.context.is_node_compilable(node) {
                        return Err(ModelError::illegal(format!(
                            "node {id} ({}) is neither compilable nor refinable",
                            node.type_name()
                        )));
                    }
                    did_refine |= refined;
                }
                NodeAction::Compile | NodeAction::Abstain => node.copy(self)?,
            }
            self.end_node(node);
        }
        let context = &self.context;
        self.is_model_compilable = self.model.nodes().all(|n| context.is_node_compilable(n));
        debug!(
            nodes = self.model.size(),
            refined = did_refine,
            compilable = self.is_model_compilable,
            "refine pass"
        );
        Ok((std::mem::take(&mut self.model), did_refine))
    }

    /// Run `f` on every node of `model` in dependency order. `f` is
    /// responsible for emitting each node (or its replacement).
    pub fn transform_model<F>(&mut self, model: &Model, mut f: F) -> Result<Model>
    where
        F: FnMut(&dyn Node, &mut ModelTransformer) -> Result<()>,
    {
        self.start_pass(Model::with_metadata(model.metadata().clone()));
        for id in model.visit_order(&[])? {
            let node = model.node(id)?;
            self.begin_node(node);
            f(node, self)?;
            self.end_node(node);
        }
        debug!(nodes = self.model.size(), "transform pass");
        Ok(std::mem::take(&mut self.model))
    }

    fn start_pass(&mut self, destination: Model) {
        self.model = destination;
        self.port_map.clear();
        self.node_map.clear();
        self.input_nodes.clear();
        self.is_model_compilable = false;
    }

    fn begin_node(&mut self, node: &dyn Node) {
        self.source_metadata = node.base().metadata().clone();
        self.last_added = None;
    }

    fn end_node(&mut self, node: &dyn Node) {
        let id = node.id();
        if !self.node_map.contains_key(&id) {
            if let Some(added) = self.last_added {
                self.node_map.insert(id, added);
            }
        }
        if node.role() == NodeRole::Input {
            if let Some(new_id) = self.node_map.get(&id).copied() {
                if matches!(self.model.node(new_id).map(|n| n.role()), Ok(NodeRole::Input)) {
                    self.input_nodes.insert(id, new_id);
                }
            }
        }
        self.source_metadata.clear();
    }

    // ── Node authoring ──────────────────────────────────────────────────────

    /// Add a node to the output model. Metadata of the source node being
    /// processed is copied onto it unless the node already sets the key.
    pub fn add_node<N: Node>(&mut self, mut node: N) -> Result<&N> {
        let metadata = node.base_mut().metadata_mut();
        for (key, value) in &self.source_metadata {
            metadata.entry(key.clone()).or_insert_with(|| value.clone());
        }
        let id = self.model.add_boxed(Box::new(node))?;
        self.last_added = Some(id);
        self.model
            .node_as::<N>(id)
            .ok_or_else(|| ModelError::illegal(format!("node {id} changed type on insertion")))
    }

    /// Record that source port `old` is now produced by `new`. Partial views
    /// are first materialized as a whole port.
    pub fn map_node_output(&mut self, old: &OutputPort, new: &PortElements) -> Result<()> {
        if old.size() != new.size() {
            return Err(ModelError::invalid(format!(
                "port {} has size {}, replacement has size {}",
                old.port_ref(),
                old.size(),
                new.size()
            )));
        }
        let new_type = self.model.elements_type(new)?;
        if new_type != old.port_type() {
            return Err(ModelError::mismatch(old.port_type(), new_type));
        }
        let consolidated = new.consolidate();
        let whole = if consolidated.is_full_port_output(&self.model) {
            consolidated
        } else {
            self.add_splice(consolidated)?
        };
        let target = whole
            .full_port(&self.model)
            .ok_or_else(|| ModelError::illegal("simplified output is not a whole port"))?;
        self.port_map.insert(old.port_ref(), target);
        self.node_map.entry(old.node()).or_insert(target.node);
        Ok(())
    }

    /// Splice `elements` into one port through `add_node`, so the splice
    /// carries the source node's metadata like any other added node.
    fn add_splice(&mut self, elements: PortElements) -> Result<PortElements> {
        let output = match self.model.elements_type(&elements)? {
            PortType::Boolean => PortElements::from(self.add_node(SpliceNode::<bool>::new(elements))?.output()),
            PortType::Integer => PortElements::from(self.add_node(SpliceNode::<i32>::new(elements))?.output()),
            PortType::BigInt => PortElements::from(self.add_node(SpliceNode::<i64>::new(elements))?.output()),
            PortType::SmallReal => PortElements::from(self.add_node(SpliceNode::<f32>::new(elements))?.output()),
            PortType::Real => PortElements::from(self.add_node(SpliceNode::<f64>::new(elements))?.output()),
            other => {
                return Err(ModelError::NotImplemented(format!(
                    "splicing ports of type {other}"
                )))
            }
        };
        Ok(output)
    }

    /// Copy a node whose only job is to carry over verbatim; shorthand for
    /// `node.copy(self)` from inside a custom transform function.
    pub fn copy_node(&mut self, node: &dyn Node) -> Result<()> {
        node.copy(self)
    }

    // ── Remap queries ───────────────────────────────────────────────────────

    pub fn corresponding_output_port(&self, port: OutputPortRef) -> Result<OutputPortRef> {
        self.port_map
            .get(&port)
            .copied()
            .ok_or_else(|| ModelError::invalid(format!("output port {port} has not been transformed")))
    }

    /// Source elements re-expressed over the output model's ports.
    pub fn corresponding_outputs(&self, elements: &PortElements) -> Result<PortElements> {
        let mut ranges = Vec::with_capacity(elements.ranges().len());
        for range in elements.ranges() {
            let port = self.corresponding_output_port(range.port)?;
            ranges.push(PortRange::new(port, range.start, range.count)?);
        }
        Ok(PortElements::from_ranges(ranges)?.consolidate())
    }

    /// What a source input port reads, re-expressed over the output model.
    pub fn corresponding_inputs(&self, input: &InputPort) -> Result<PortElements> {
        self.corresponding_outputs(input.elements())
    }

    pub fn corresponding_node(&self, node: NodeId) -> Result<NodeId> {
        self.node_map
            .get(&node)
            .copied()
            .ok_or_else(|| ModelError::invalid(format!("node {node} has not been transformed")))
    }

    /// The input node a source input node became. Fails if it was refined
    /// into something that is no longer an input node.
    pub fn corresponding_input_node(&self, node: NodeId) -> Result<NodeId> {
        self.input_nodes
            .get(&node)
            .copied()
            .ok_or_else(|| ModelError::invalid(format!("input node {node} has no corresponding input node")))
    }

    /// Source node ids with a remap entry.
    pub fn transformed_nodes(&self) -> HashSet<NodeId> {
        self.node_map.keys().copied().collect()
    }
}

/// `first` then `second`: entries whose intermediate key is absent from
/// `second` are dropped.
fn compose<K, V>(first: &HashMap<K, V>, second: &HashMap<V, V>) -> HashMap<K, V>
where
    K: Copy + Eq + std::hash::Hash,
    V: Copy + Eq + std::hash::Hash,
{
    first
        .iter()
        .filter_map(|(k, mid)| second.get(mid).map(|v| (*k, *v)))
        .collect()
}
