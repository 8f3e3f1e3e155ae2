use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::archive::{ArchivableNode, NodeArchive, ReadContext};
use crate::error::Result;
use crate::model::Model;
use crate::node::{Node, NodeBase};
use crate::port::{OutputPort, PortValue};
use crate::port_elements::PortElements;
use crate::transform::ModelTransformer;

#[derive(Serialize, Deserialize)]
#[serde(bound = "T: PortValue")]
struct ConstantFields<T> {
    values: Vec<T>,
}

/// A fixed value vector.
#[derive(Debug)]
pub struct ConstantNode<T: PortValue> {
    base: NodeBase,
    values: Vec<T>,
}

impl<T: PortValue> ConstantNode<T> {
    pub fn new(values: Vec<T>) -> Self {
        let mut base = NodeBase::new();
        base.add_output::<T>("output", values.len());
        ConstantNode { base, values }
    }

    pub fn output(&self) -> &OutputPort {
        self.base.output(0)
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }
}

impl<T: PortValue> Node for ConstantNode<T> {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn type_name(&self) -> String {
        Self::archive_tag()
    }

    fn compute(&self, _model: &Model) -> Result<()> {
        self.output().set_output(self.values.clone())
    }

    fn copy(&self, transformer: &mut ModelTransformer) -> Result<()> {
        let node = ConstantNode::new(self.values.clone());
        let elements = PortElements::from(transformer.add_node(node)?.output());
        transformer.map_node_output(self.output(), &elements)
    }

    fn is_compilable(&self) -> bool {
        true
    }

    fn archive_fields(&self) -> Result<Value> {
        Ok(serde_json::to_value(ConstantFields {
            values: self.values.clone(),
        })?)
    }
}

impl<T: PortValue> ArchivableNode for ConstantNode<T> {
    fn archive_tag() -> String {
        format!("ConstantNode<{}>", T::TYPE_NAME)
    }

    fn from_archive(archive: &NodeArchive, _context: &ReadContext) -> Result<Self> {
        let fields: ConstantFields<T> = archive.fields()?;
        Ok(ConstantNode::new(fields.values))
    }
}
