// map.rs — Named-I/O facade over a pruned model
//
// A Map owns a model plus ordered (name, input node) and (name, output
// elements) bindings. Every output is materialized as one whole port when
// it is bound, so consumers never assemble a PortElements view themselves.
// After every pass that rebuilds the model (prune, refine, optimize) the
// bindings are re-resolved through the pass's remap tables.
//
// Preconditions: input bindings name input nodes of the bound model.
// Postconditions: the owned model contains exactly the closure of the
//                 inputs, outputs, sinks, and connected debug sinks.
// Failure modes: unknown names/indices → `InvalidArgument`; typed compute
//                with the wrong value type → `TypeMismatch`; illegal
//                lifecycle transitions → `IllegalState`.
// Side effects: compute overwrites output caches and advances node state.

use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::rc::Rc;

use sha2::{Digest, Sha256};
use tracing::info;

use crate::archive::{
    write_model, MapArchive, ModelArchive, NodeRegistry, ACCEPTED_MAP_VERSIONS, ARCHIVE_NO_METADATA,
    ARCHIVE_WITH_METADATA,
};
use crate::config::MapOptions;
use crate::error::{ModelError, Result};
use crate::id::NodeId;
use crate::lifecycle::{self, MapStage};
use crate::model::Model;
use crate::node::{Node, NodeRole, PropertyBag};
use crate::nodes::InputNode;
use crate::optimizer::ModelOptimizer;
use crate::port::{PortBuffer, PortType, PortValue};
use crate::port_elements::PortElements;
use crate::submodel::Submodel;
use crate::transform::{CompilerBackend, ModelTransformer, TransformContext};

// ── Port selection ──────────────────────────────────────────────────────────

/// Picks a map input or output by position or by name.
pub trait PortSelector {
    fn input_index(&self, map: &Map) -> Result<usize>;
    fn output_index(&self, map: &Map) -> Result<usize>;
}

impl PortSelector for usize {
    fn input_index(&self, map: &Map) -> Result<usize> {
        if *self < map.inputs.len() {
            Ok(*self)
        } else {
            Err(ModelError::invalid(format!(
                "input index {self} out of range ({} inputs)",
                map.inputs.len()
            )))
        }
    }

    fn output_index(&self, map: &Map) -> Result<usize> {
        if *self < map.outputs.len() {
            Ok(*self)
        } else {
            Err(ModelError::invalid(format!(
                "output index {self} out of range ({} outputs)",
                map.outputs.len()
            )))
        }
    }
}

impl PortSelector for &str {
    fn input_index(&self, map: &Map) -> Result<usize> {
        map.input_lookup
            .get(*self)
            .copied()
            .ok_or_else(|| ModelError::invalid(format!("no input named '{self}'")))
    }

    fn output_index(&self, map: &Map) -> Result<usize> {
        map.output_lookup
            .get(*self)
            .copied()
            .ok_or_else(|| ModelError::invalid(format!("no output named '{self}'")))
    }
}

// ── Map ─────────────────────────────────────────────────────────────────────

/// A model with named inputs and outputs, ready to compute or compile.
#[derive(Debug)]
pub struct Map {
    model: Model,
    inputs: Vec<(String, NodeId)>,
    input_lookup: HashMap<String, usize>,
    outputs: Vec<(String, PortElements)>,
    output_lookup: HashMap<String, usize>,
    metadata: PropertyBag,
    stage: MapStage,
    options: MapOptions,
}

impl Map {
    /// Bind names over a deep copy of `model`, then prune.
    pub fn new(model: &Model, inputs: &[(&str, NodeId)], outputs: &[(&str, PortElements)]) -> Result<Self> {
        let mut transformer = ModelTransformer::new(TransformContext::new());
        let copy = transformer.copy_model(model)?;
        let inputs = inputs
            .iter()
            .map(|(name, id)| Ok((name.to_string(), transformer.corresponding_input_node(*id)?)))
            .collect::<Result<Vec<_>>>()?;
        let outputs = outputs
            .iter()
            .map(|(name, elements)| Ok((name.to_string(), transformer.corresponding_outputs(elements)?)))
            .collect::<Result<Vec<_>>>()?;
        Self::assemble(copy, inputs, outputs)
    }

    /// Bind names over `model` itself, then prune.
    pub fn from_model(model: Model, inputs: &[(&str, NodeId)], outputs: &[(&str, PortElements)]) -> Result<Self> {
        let inputs = inputs.iter().map(|(n, id)| (n.to_string(), *id)).collect();
        let outputs = outputs.iter().map(|(n, e)| (n.to_string(), e.clone())).collect();
        Self::assemble(model, inputs, outputs)
    }

    fn unbound(model: Model) -> Self {
        Map {
            model,
            inputs: Vec::new(),
            input_lookup: HashMap::new(),
            outputs: Vec::new(),
            output_lookup: HashMap::new(),
            metadata: PropertyBag::new(),
            stage: MapStage::Constructed,
            options: MapOptions::default(),
        }
    }

    fn assemble(model: Model, inputs: Vec<(String, NodeId)>, outputs: Vec<(String, PortElements)>) -> Result<Self> {
        let mut map = Self::unbound(model);
        for (name, id) in inputs {
            map.add_input(&name, id)?;
        }
        for (name, elements) in outputs {
            map.add_output(&name, &elements)?;
        }
        map.prune()?;
        Ok(map)
    }

    /// Bind `name` to an input node of the owned model.
    pub fn add_input(&mut self, name: &str, node: NodeId) -> Result<()> {
        if self.input_lookup.contains_key(name) {
            return Err(ModelError::invalid(format!("duplicate input name '{name}'")));
        }
        let role = self.model.node(node)?.role();
        if role != NodeRole::Input {
            return Err(ModelError::invalid(format!(
                "input '{name}' is bound to {node}, which is not an input node"
            )));
        }
        self.input_lookup.insert(name.to_string(), self.inputs.len());
        self.inputs.push((name.to_string(), node));
        Ok(())
    }

    /// Bind `name` to `elements`, splicing them into one port if needed.
    pub fn add_output(&mut self, name: &str, elements: &PortElements) -> Result<()> {
        if self.output_lookup.contains_key(name) {
            return Err(ModelError::invalid(format!("duplicate output name '{name}'")));
        }
        let whole = self.model.simplify_outputs(elements)?;
        self.output_lookup.insert(name.to_string(), self.outputs.len());
        self.outputs.push((name.to_string(), whole));
        Ok(())
    }

    // ── Passes ──────────────────────────────────────────────────────────────

    /// Replace the model with the closure of the bound inputs and outputs,
    /// sink nodes, and debug sinks whose observed nodes are in that closure.
    ///
    /// Debug sinks are not kept unconditionally: one observing a dead branch
    /// is dropped along with it. Clearing
    /// `MapOptions::keep_connected_debug_sinks` drops all of them.
    pub fn prune(&mut self) -> Result<()> {
        let before = self.model.size();
        let mut roots: Vec<NodeId> = self.inputs.iter().map(|(_, id)| *id).collect();
        for (_, elements) in &self.outputs {
            roots.extend(elements.referenced_nodes());
        }
        roots.extend(self.model.nodes_by_role(NodeRole::Sink));

        if self.options.keep_connected_debug_sinks && !roots.is_empty() {
            let closure: HashSet<NodeId> = self.model.visit_order(&roots)?.into_iter().collect();
            for id in self.model.nodes_by_role(NodeRole::DebugSink) {
                let parents = self.model.node(id)?.parent_nodes();
                if !parents.is_empty() && parents.iter().all(|p| closure.contains(p)) {
                    roots.push(id);
                }
            }
        }

        let mut transformer = ModelTransformer::new(TransformContext::new());
        let pruned = if roots.is_empty() {
            Model::with_metadata(self.model.metadata().clone())
        } else {
            let submodel = Submodel::from_nodes(&self.model, &roots)?;
            transformer.copy_submodel(&submodel)?
        };
        self.model = pruned;
        self.fix_transformed_io(&transformer)?;
        if self.stage == MapStage::Constructed {
            self.stage = lifecycle::advance(self.stage, MapStage::Pruned)?;
        }
        info!(before, after = self.model.size(), "pruned map");
        Ok(())
    }

    /// Re-resolve every binding through the remap of the pass that produced
    /// the current model.
    pub fn fix_transformed_io(&mut self, transformer: &ModelTransformer) -> Result<()> {
        for (name, id) in &mut self.inputs {
            let new_id = transformer.corresponding_input_node(*id)?;
            if self.model.node(new_id)?.role() != NodeRole::Input {
                return Err(ModelError::illegal(format!(
                    "input '{name}' no longer resolves to an input node"
                )));
            }
            *id = new_id;
        }
        for (_, elements) in &mut self.outputs {
            *elements = transformer.corresponding_outputs(elements)?;
        }
        Ok(())
    }

    /// Refine until compilable (per `context`) or the iteration bound, then
    /// prune.
    pub fn refine(&mut self, context: &TransformContext) -> Result<()> {
        let next = lifecycle::advance(self.stage, MapStage::Refined)?;
        let before = self.model.size();
        let mut transformer = ModelTransformer::new(context.clone());
        self.model = transformer.refine_model(&self.model, self.options.max_refine_iterations)?;
        self.fix_transformed_io(&transformer)?;
        self.stage = next;
        info!(
            before,
            after = self.model.size(),
            compilable = transformer.is_model_compilable(),
            "refined map"
        );
        self.prune()
    }

    /// Run `optimizer`'s passes to a fixed point (bounded), then prune.
    pub fn optimize(&mut self, optimizer: &ModelOptimizer) -> Result<()> {
        let next = lifecycle::advance(self.stage, MapStage::Optimized)?;
        let before = self.model.size();
        for _ in 0..optimizer.max_iterations() {
            let mut changed = false;
            for index in 0..optimizer.num_passes() {
                let (model, transformer, pass_changed) = optimizer.run_pass(index, &self.model)?;
                self.model = model;
                self.fix_transformed_io(&transformer)?;
                changed |= pass_changed;
            }
            if !changed {
                break;
            }
        }
        self.stage = next;
        info!(before, after = self.model.size(), "optimized map");
        self.prune()
    }

    /// Apply a custom per-node transform (see `ModelTransformer::
    /// transform_model`), then prune.
    pub fn transform<F>(&mut self, context: &TransformContext, f: F) -> Result<()>
    where
        F: FnMut(&dyn Node, &mut ModelTransformer) -> Result<()>,
    {
        if self.stage == MapStage::Ready {
            return Err(ModelError::illegal("cannot transform a map that is ready"));
        }
        let mut transformer = ModelTransformer::new(context.clone());
        self.model = transformer.transform_model(&self.model, f)?;
        self.fix_transformed_io(&transformer)?;
        self.prune()
    }

    /// Refine against `backend`'s compilability oracle and hand the result to
    /// its lowering hook.
    pub fn compile(&mut self, backend: Rc<dyn CompilerBackend>) -> Result<()> {
        let context = TransformContext::with_backend(Rc::clone(&backend));
        if !lifecycle::can_advance(self.stage, MapStage::Ready) {
            return Err(ModelError::illegal("map is not in a compilable stage"));
        }
        if !self.model.nodes().all(|n| context.is_node_compilable(n)) {
            self.refine(&context)?;
        }
        if let Some(node) = self.model.nodes().find(|n| !context.is_node_compilable(*n)) {
            return Err(ModelError::illegal(format!(
                "backend '{}' cannot compile node {} ({})",
                backend.name(),
                node.id(),
                node.type_name()
            )));
        }
        backend.lower(self)?;
        self.stage = lifecycle::advance(self.stage, MapStage::Ready)?;
        info!(backend = backend.name(), nodes = self.model.size(), "compiled map");
        Ok(())
    }

    /// Clear node state (delay lines, accumulators).
    pub fn reset(&self) {
        self.model.reset();
    }

    // ── Compute ─────────────────────────────────────────────────────────────

    pub fn set_input_value<T: PortValue>(&mut self, input: impl PortSelector, values: &[T]) -> Result<()> {
        let index = input.input_index(self)?;
        let (name, id) = &self.inputs[index];
        let expected = self.input_port_type(*id)?;
        if expected != T::PORT_TYPE {
            return Err(ModelError::mismatch(expected, T::PORT_TYPE));
        }
        let node = self
            .model
            .node_as::<InputNode<T>>(*id)
            .ok_or_else(|| ModelError::illegal(format!("input '{name}' is not an InputNode<{}>", T::TYPE_NAME)))?;
        node.set_input(values)
    }

    /// Runtime-typed `set_input_value`.
    pub fn set_input_buffer(&mut self, input: impl PortSelector, buffer: &PortBuffer) -> Result<()> {
        match buffer {
            PortBuffer::Boolean(v) => self.set_input_value(input, v.as_slice()),
            PortBuffer::Integer(v) => self.set_input_value(input, v.as_slice()),
            PortBuffer::BigInt(v) => self.set_input_value(input, v.as_slice()),
            PortBuffer::SmallReal(v) => self.set_input_value(input, v.as_slice()),
            PortBuffer::Real(v) => self.set_input_value(input, v.as_slice()),
        }
    }

    pub fn compute_output<T: PortValue>(&mut self, output: impl PortSelector) -> Result<Vec<T>> {
        let index = output.output_index(self)?;
        let elements = &self.outputs[index].1;
        let actual = self.model.elements_type(elements)?;
        if actual != T::PORT_TYPE {
            return Err(ModelError::mismatch(actual, T::PORT_TYPE));
        }
        self.model.compute_output::<T>(elements)
    }

    /// Runtime-typed `compute_output`.
    pub fn compute_output_buffer(&mut self, output: impl PortSelector) -> Result<PortBuffer> {
        let index = output.output_index(self)?;
        match self.output_type(index)? {
            PortType::Boolean => Ok(PortBuffer::Boolean(self.compute_output(index)?)),
            PortType::Integer => Ok(PortBuffer::Integer(self.compute_output(index)?)),
            PortType::BigInt => Ok(PortBuffer::BigInt(self.compute_output(index)?)),
            PortType::SmallReal => Ok(PortBuffer::SmallReal(self.compute_output(index)?)),
            PortType::Real => Ok(PortBuffer::Real(self.compute_output(index)?)),
            other => Err(ModelError::NotImplemented(format!("computing outputs of type {other}"))),
        }
    }

    /// Set the first input and compute the first output.
    pub fn compute<I: PortValue, O: PortValue>(&mut self, input: &[I]) -> Result<Vec<O>> {
        self.set_input_value(0usize, input)?;
        self.compute_output(0usize)
    }

    // ── Introspection ───────────────────────────────────────────────────────

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn stage(&self) -> MapStage {
        self.stage
    }

    pub fn options(&self) -> &MapOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: MapOptions) -> Result<()> {
        options.validate()?;
        self.options = options;
        Ok(())
    }

    pub fn metadata(&self) -> &PropertyBag {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut PropertyBag {
        &mut self.metadata
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    pub fn input_names(&self) -> Vec<&str> {
        self.inputs.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn output_names(&self) -> Vec<&str> {
        self.outputs.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn input_node(&self, input: impl PortSelector) -> Result<NodeId> {
        Ok(self.inputs[input.input_index(self)?].1)
    }

    pub fn output_elements(&self, output: impl PortSelector) -> Result<&PortElements> {
        Ok(&self.outputs[output.output_index(self)?].1)
    }

    fn input_port_type(&self, id: NodeId) -> Result<PortType> {
        let node = self.model.node(id)?;
        node.output_ports()
            .first()
            .map(|p| p.port_type())
            .ok_or_else(|| ModelError::illegal(format!("input node {id} has no output port")))
    }

    pub fn input_type(&self, input: impl PortSelector) -> Result<PortType> {
        self.input_port_type(self.input_node(input)?)
    }

    pub fn input_size(&self, input: impl PortSelector) -> Result<usize> {
        let id = self.input_node(input)?;
        Ok(self.model.node(id)?.output_ports().iter().map(|p| p.size()).sum())
    }

    pub fn output_type(&self, output: impl PortSelector) -> Result<PortType> {
        self.model.elements_type(self.output_elements(output)?)
    }

    pub fn output_size(&self, output: impl PortSelector) -> Result<usize> {
        Ok(self.output_elements(output)?.size())
    }

    pub fn sink_nodes(&self) -> Vec<NodeId> {
        self.model.nodes_by_role(NodeRole::Sink)
    }

    // ── Serialization ───────────────────────────────────────────────────────

    pub fn archive(&self) -> Result<MapArchive> {
        let (model, context) = write_model(&self.model)?;
        let input_ids = self
            .inputs
            .iter()
            .map(|(_, id)| context.id(*id))
            .collect::<Result<Vec<_>>>()?;
        let output_elements = self
            .outputs
            .iter()
            .map(|(_, elements)| context.ranges(elements))
            .collect::<Result<Vec<_>>>()?;
        let version = if model.has_metadata() || !self.metadata.is_empty() {
            ARCHIVE_WITH_METADATA
        } else {
            ARCHIVE_NO_METADATA
        };
        Ok(MapArchive {
            version,
            model,
            input_names: self.inputs.iter().map(|(n, _)| n.clone()).collect(),
            input_ids,
            output_names: self.outputs.iter().map(|(n, _)| n.clone()).collect(),
            output_elements,
            metadata: self.metadata.clone(),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.archive()?)?)
    }

    /// Rebuild a map. Archives older than the metadata version have any
    /// metadata fields ignored.
    pub fn from_archive(archive: &MapArchive, registry: &NodeRegistry) -> Result<Self> {
        if !ACCEPTED_MAP_VERSIONS.contains(&archive.version) {
            return Err(ModelError::UnsupportedVersion {
                entity: "map".to_string(),
                version: archive.version,
            });
        }
        if archive.input_names.len() != archive.input_ids.len()
            || archive.output_names.len() != archive.output_elements.len()
        {
            return Err(ModelError::invalid("map archive has mismatched name and binding lists"));
        }
        let with_metadata = archive.version >= ARCHIVE_WITH_METADATA;
        let model_archive = if with_metadata {
            archive.model.clone()
        } else {
            strip_metadata(&archive.model)
        };

        let (model, context) = registry.read_model(&model_archive)?;
        let mut map = Self::unbound(model);
        if with_metadata {
            map.metadata = archive.metadata.clone();
        }
        for (name, id) in archive.input_names.iter().zip(&archive.input_ids) {
            map.add_input(name, context.node(*id)?)?;
        }
        for (name, ranges) in archive.output_names.iter().zip(&archive.output_elements) {
            map.add_output(name, &context.elements(ranges)?)?;
        }
        map.stage = MapStage::Pruned;
        Ok(map)
    }

    pub fn from_json(json: &str, registry: &NodeRegistry) -> Result<Self> {
        let archive: MapArchive = serde_json::from_str(json)?;
        Self::from_archive(&archive, registry)
    }

    /// SHA-256 of the compact archive JSON, as lowercase hex.
    pub fn fingerprint(&self) -> Result<String> {
        let canonical = serde_json::to_vec(&self.archive()?)?;
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        let hash = hasher.finalize();
        Ok(hash.iter().map(|b| format!("{:02x}", b)).collect())
    }
}

fn strip_metadata(archive: &ModelArchive) -> ModelArchive {
    let mut stripped = archive.clone();
    stripped.metadata.clear();
    for node in &mut stripped.nodes {
        node.metadata.clear();
    }
    stripped
}

/// `Map` already carries the runtime-typed buffer calls.
pub type DynamicMap = Map;

// ── Typed wrapper ───────────────────────────────────────────────────────────

/// A single-input, single-output map with its value types fixed at compile
/// time.
#[derive(Debug)]
pub struct TypedMap<I: PortValue, O: PortValue> {
    map: Map,
    _types: PhantomData<(I, O)>,
}

impl<I: PortValue, O: PortValue> TypedMap<I, O> {
    pub fn new(map: Map) -> Result<Self> {
        if map.num_inputs() != 1 || map.num_outputs() != 1 {
            return Err(ModelError::invalid(format!(
                "typed map needs one input and one output, map has {} and {}",
                map.num_inputs(),
                map.num_outputs()
            )));
        }
        let input = map.input_type(0usize)?;
        if input != I::PORT_TYPE {
            return Err(ModelError::mismatch(input, I::PORT_TYPE));
        }
        let output = map.output_type(0usize)?;
        if output != O::PORT_TYPE {
            return Err(ModelError::mismatch(output, O::PORT_TYPE));
        }
        Ok(TypedMap {
            map,
            _types: PhantomData,
        })
    }

    pub fn compute(&mut self, input: &[I]) -> Result<Vec<O>> {
        self.map.compute(input)
    }

    pub fn map(&self) -> &Map {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut Map {
        &mut self.map
    }

    pub fn into_inner(self) -> Map {
        self.map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{DebugSinkNode, OutputNode, SinkNode};

    fn passthrough() -> (Model, NodeId, PortElements) {
        let mut model = Model::new();
        let input = model.add_node(InputNode::<i64>::new(2)).unwrap();
        let (id, elements) = (input.id(), PortElements::from(input.output()));
        let output = model.add_node(OutputNode::<i64>::new(elements)).unwrap();
        let out = PortElements::from(output.output());
        (model, id, out)
    }

    #[test]
    fn new_copies_and_binds() {
        let (model, input, out) = passthrough();
        let mut map = Map::new(&model, &[("x", input)], &[("y", out)]).unwrap();
        assert_eq!(map.stage(), MapStage::Pruned);
        assert_ne!(map.input_node("x").unwrap(), input);
        map.set_input_value("x", &[4i64, 5]).unwrap();
        assert_eq!(map.compute_output::<i64>("y").unwrap(), vec![4, 5]);
        assert_eq!(map.input_size(0usize).unwrap(), 2);
        assert_eq!(map.output_type("y").unwrap(), PortType::BigInt);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let (model, input, out) = passthrough();
        let err = Map::new(&model, &[("x", input), ("x", input)], &[("y", out)]).unwrap_err();
        assert!(matches!(err, ModelError::InvalidArgument(_)));
    }

    #[test]
    fn unknown_name_and_wrong_type() {
        let (model, input, out) = passthrough();
        let mut map = Map::new(&model, &[("x", input)], &[("y", out)]).unwrap();
        assert!(matches!(
            map.compute_output::<i64>("z"),
            Err(ModelError::InvalidArgument(_))
        ));
        assert!(matches!(
            map.compute_output::<f64>("y"),
            Err(ModelError::TypeMismatch {
                expected: PortType::BigInt,
                found: PortType::Real
            })
        ));
        assert!(matches!(
            map.set_input_value("x", &[1.0f32, 2.0]),
            Err(ModelError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn partial_output_is_spliced_into_one_port() {
        let (model, input, _) = passthrough();
        let elements = PortElements::element(crate::id::OutputPortRef::new(input, 0), 1);
        let mut map = Map::from_model(model, &[("x", input)], &[("second", elements)]).unwrap();
        assert!(map.output_elements("second").unwrap().is_full_port_output(map.model()));
        map.set_input_value("x", &[7i64, 9]).unwrap();
        assert_eq!(map.compute_output::<i64>("second").unwrap(), vec![9]);
    }

    #[test]
    fn prune_keeps_sinks_and_connected_debug_sinks() {
        let mut model = Model::new();
        let input = model.add_node(InputNode::<f64>::new(1)).unwrap();
        let (input_id, elements) = (input.id(), PortElements::from(input.output()));
        let output = model.add_node(OutputNode::<f64>::new(elements.clone())).unwrap();
        let out = PortElements::from(output.output());
        model.add_node(SinkNode::<f64>::new(elements.clone(), "log")).unwrap();
        model.add_node(DebugSinkNode::<f64>::new(elements, "tap")).unwrap();
        let orphan = model.add_node(InputNode::<f64>::new(1)).unwrap();
        let orphan_out = PortElements::from(orphan.output());
        model.add_node(DebugSinkNode::<f64>::new(orphan_out, "orphan")).unwrap();

        let map = Map::from_model(model, &[("x", input_id)], &[("y", out)]).unwrap();
        assert_eq!(map.model().size(), 4);
        assert_eq!(map.sink_nodes().len(), 1);
        assert_eq!(map.model().nodes_by_role(NodeRole::DebugSink).len(), 1);
    }

    #[test]
    fn typed_map_checks_types() {
        let (model, input, out) = passthrough();
        let map = Map::new(&model, &[("x", input)], &[("y", out)]).unwrap();
        assert!(matches!(
            TypedMap::<f64, i64>::new(map),
            Err(ModelError::TypeMismatch { .. })
        ));
        let map = Map::new(&model, &[("x", input)], &[("y", out_of(&model))]).unwrap();
        let mut typed = TypedMap::<i64, i64>::new(map).unwrap();
        assert_eq!(typed.compute(&[1, 2]).unwrap(), vec![1, 2]);
    }

    fn out_of(model: &Model) -> PortElements {
        let output = model.nodes_by_role(NodeRole::Output)[0];
        PortElements::from(&model.node(output).unwrap().output_ports()[0])
    }
}
