// archive.rs — Versioned JSON archive format and the node type registry
//
// Writers assign dense serialized ids in visit order, so two structurally
// identical models produce byte-identical archives regardless of the
// process-wide ids their nodes happen to carry. Readers rebuild nodes
// through a registry keyed by type tag and translate serialized ids to the
// fresh ids of the rebuilt nodes through a per-archive ReadContext.
//
// Preconditions: every node type in an archive is registered on read.
// Postconditions: a read model has the same shape and fields as the written
//                 one, with fresh node ids.
// Failure modes: unknown type tag or dangling serialized id →
//                `InvalidArgument`; version outside the accepted range →
//                `UnsupportedVersion`; malformed JSON → `Archive`.
// Side effects: none.

use std::collections::HashMap;
use std::ops::RangeInclusive;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ModelError, Result};
use crate::id::{NodeId, OutputPortRef};
use crate::model::Model;
use crate::node::{Node, PropertyBag};
use crate::nodes::{
    AccumulatorNode, ArgMaxNode, ArgMinNode, BinaryOperationNode, ConstantNode, DebugSinkNode, DelayNode,
    InputNode, MovingAverageNode, OutputNode, SinkNode, SpliceNode,
};
use crate::port::{Numeric, PortValue};
use crate::port_elements::{PortElements, PortRange};

/// Map archive written when no metadata is present anywhere.
pub const ARCHIVE_NO_METADATA: u32 = 2;
/// Map archive written when the map, model, or any node carries metadata.
pub const ARCHIVE_WITH_METADATA: u32 = 3;

/// Map archive versions this reader accepts.
pub const ACCEPTED_MAP_VERSIONS: RangeInclusive<u32> = ARCHIVE_NO_METADATA..=ARCHIVE_WITH_METADATA;

// ── Archive shapes ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeArchive {
    pub node: u64,
    pub port: usize,
    pub start: usize,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeArchive {
    #[serde(rename = "type")]
    pub type_name: String,
    pub version: u32,
    pub id: u64,
    #[serde(default)]
    pub inputs: Vec<Vec<RangeArchive>>,
    #[serde(default)]
    pub fields: Value,
    #[serde(default, skip_serializing_if = "PropertyBag::is_empty")]
    pub metadata: PropertyBag,
}

impl NodeArchive {
    /// Decode the per-type field dump.
    pub fn fields<F: DeserializeOwned>(&self) -> Result<F> {
        Ok(serde_json::from_value(self.fields.clone())?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArchive {
    pub nodes: Vec<NodeArchive>,
    #[serde(default, skip_serializing_if = "PropertyBag::is_empty")]
    pub metadata: PropertyBag,
}

impl ModelArchive {
    pub fn has_metadata(&self) -> bool {
        !self.metadata.is_empty() || self.nodes.iter().any(|n| !n.metadata.is_empty())
    }
}

/// Top-level map archive. Field order is the write order: model, input
/// names, input ids, output names, output elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapArchive {
    pub version: u32,
    pub model: ModelArchive,
    pub input_names: Vec<String>,
    pub input_ids: Vec<u64>,
    pub output_names: Vec<String>,
    pub output_elements: Vec<Vec<RangeArchive>>,
    #[serde(default, skip_serializing_if = "PropertyBag::is_empty")]
    pub metadata: PropertyBag,
}

// ── Writing ─────────────────────────────────────────────────────────────────

/// Live node id → serialized id.
#[derive(Debug, Default)]
pub struct WriteContext {
    ids: HashMap<NodeId, u64>,
}

impl WriteContext {
    pub fn id(&self, node: NodeId) -> Result<u64> {
        self.ids
            .get(&node)
            .copied()
            .ok_or_else(|| ModelError::invalid(format!("node {node} is not part of the archived model")))
    }

    pub fn ranges(&self, elements: &PortElements) -> Result<Vec<RangeArchive>> {
        elements
            .ranges()
            .iter()
            .map(|r| {
                Ok(RangeArchive {
                    node: self.id(r.port.node)?,
                    port: r.port.index,
                    start: r.start,
                    count: r.count,
                })
            })
            .collect()
    }
}

/// Archive every node of `model` in visit order.
pub fn write_model(model: &Model) -> Result<(ModelArchive, WriteContext)> {
    let mut context = WriteContext::default();
    let mut nodes = Vec::with_capacity(model.size());
    for (serial, id) in model.visit_order(&[])?.into_iter().enumerate() {
        let serial = serial as u64;
        context.ids.insert(id, serial);
        let node = model.node(id)?;
        let inputs = node
            .input_ports()
            .iter()
            .map(|input| context.ranges(input.elements()))
            .collect::<Result<Vec<_>>>()?;
        nodes.push(NodeArchive {
            type_name: node.type_name(),
            version: node.archive_version(),
            id: serial,
            inputs,
            fields: node.archive_fields()?,
            metadata: node.base().metadata().clone(),
        });
    }
    let archive = ModelArchive {
        nodes,
        metadata: model.metadata().clone(),
    };
    Ok((archive, context))
}

// ── Reading ─────────────────────────────────────────────────────────────────

/// Serialized id → id of the node rebuilt from it.
#[derive(Debug, Default)]
pub struct ReadContext {
    ids: HashMap<u64, NodeId>,
}

impl ReadContext {
    pub fn node(&self, serialized: u64) -> Result<NodeId> {
        self.ids
            .get(&serialized)
            .copied()
            .ok_or_else(|| ModelError::invalid(format!("archive references unknown node {serialized}")))
    }

    pub fn elements(&self, ranges: &[RangeArchive]) -> Result<PortElements> {
        let ranges = ranges
            .iter()
            .map(|r| PortRange::new(OutputPortRef::new(self.node(r.node)?, r.port), r.start, r.count))
            .collect::<Result<Vec<_>>>()?;
        PortElements::from_ranges(ranges)
    }

    /// The elements feeding input port `index` of an archived node.
    pub fn input(&self, archive: &NodeArchive, index: usize) -> Result<PortElements> {
        let ranges = archive.inputs.get(index).ok_or_else(|| {
            ModelError::invalid(format!(
                "archived {} node {} has no input {index}",
                archive.type_name, archive.id
            ))
        })?;
        self.elements(ranges)
    }
}

/// A node type that can be rebuilt from its archive.
pub trait ArchivableNode: Node + Sized {
    /// Registry key; must equal `Node::type_name` for every instance.
    fn archive_tag() -> String;

    /// Node archive versions `from_archive` understands.
    fn accepted_versions() -> RangeInclusive<u32> {
        1..=1
    }

    fn from_archive(archive: &NodeArchive, context: &ReadContext) -> Result<Self>;
}

type BuildFn = fn(&NodeArchive, &ReadContext) -> Result<Box<dyn Node>>;

struct NodeFactory {
    versions: RangeInclusive<u32>,
    build: BuildFn,
}

fn build_node<N: ArchivableNode>(archive: &NodeArchive, context: &ReadContext) -> Result<Box<dyn Node>> {
    Ok(Box::new(N::from_archive(archive, context)?))
}

/// Type tag → constructor, consulted when reading archives.
#[derive(Default)]
pub struct NodeRegistry {
    factories: HashMap<String, NodeFactory>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in node for every value type it supports.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register_value_nodes::<bool>();
        registry.register_numeric_nodes::<i32>();
        registry.register_numeric_nodes::<i64>();
        registry.register_numeric_nodes::<f32>();
        registry.register_numeric_nodes::<f64>();
        registry
    }

    fn register_value_nodes<T: PortValue>(&mut self) {
        self.register::<InputNode<T>>();
        self.register::<OutputNode<T>>();
        self.register::<ConstantNode<T>>();
        self.register::<SpliceNode<T>>();
        self.register::<DelayNode<T>>();
        self.register::<SinkNode<T>>();
        self.register::<DebugSinkNode<T>>();
    }

    fn register_numeric_nodes<T: Numeric>(&mut self) {
        self.register_value_nodes::<T>();
        self.register::<ArgMinNode<T>>();
        self.register::<ArgMaxNode<T>>();
        self.register::<MovingAverageNode<T>>();
        self.register::<AccumulatorNode<T>>();
        self.register::<BinaryOperationNode<T>>();
    }

    /// Add (or replace) the constructor for `N`'s tag.
    pub fn register<N: ArchivableNode>(&mut self) {
        self.factories.insert(
            N::archive_tag(),
            NodeFactory {
                versions: N::accepted_versions(),
                build: build_node::<N>,
            },
        );
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    pub fn build(&self, archive: &NodeArchive, context: &ReadContext) -> Result<Box<dyn Node>> {
        let factory = self
            .factories
            .get(&archive.type_name)
            .ok_or_else(|| ModelError::invalid(format!("unknown node type '{}'", archive.type_name)))?;
        if !factory.versions.contains(&archive.version) {
            return Err(ModelError::UnsupportedVersion {
                entity: archive.type_name.clone(),
                version: archive.version,
            });
        }
        let mut node = (factory.build)(archive, context)?;
        node.base_mut().metadata_mut().extend(archive.metadata.clone());
        Ok(node)
    }

    /// Rebuild a model. Nodes must appear after every node they read from,
    /// which `write_model` guarantees.
    pub fn read_model(&self, archive: &ModelArchive) -> Result<(Model, ReadContext)> {
        let mut model = Model::with_metadata(archive.metadata.clone());
        let mut context = ReadContext::default();
        for node in &archive.nodes {
            let built = self.build(node, &context)?;
            let id = model.add_boxed(built)?;
            if context.ids.insert(node.id, id).is_some() {
                return Err(ModelError::invalid(format!("archive repeats node id {}", node.id)));
            }
        }
        Ok((model, context))
    }
}
