use std::cell::RefCell;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::archive::{ArchivableNode, NodeArchive, ReadContext};
use crate::error::{ModelError, Result};
use crate::model::Model;
use crate::node::{Node, NodeBase, NodeRole};
use crate::port::{OutputPort, PortValue};
use crate::port_elements::PortElements;
use crate::transform::ModelTransformer;

#[derive(Serialize, Deserialize)]
struct InputFields {
    size: usize,
}

/// Entry point for externally supplied values.
#[derive(Debug)]
pub struct InputNode<T: PortValue> {
    base: NodeBase,
    values: RefCell<Vec<T>>,
}

impl<T: PortValue> InputNode<T> {
    pub fn new(size: usize) -> Self {
        let mut base = NodeBase::new();
        base.add_output::<T>("output", size);
        InputNode {
            base,
            values: RefCell::new(vec![T::default(); size]),
        }
    }

    pub fn output(&self) -> &OutputPort {
        self.base.output(0)
    }

    pub fn size(&self) -> usize {
        self.output().size()
    }

    /// Stage values for the next compute.
    pub fn set_input(&self, values: &[T]) -> Result<()> {
        if values.len() != self.size() {
            return Err(ModelError::invalid(format!(
                "input {} expects {} values, got {}",
                self.base.id(),
                self.size(),
                values.len()
            )));
        }
        *self.values.borrow_mut() = values.to_vec();
        Ok(())
    }
}

impl<T: PortValue> Node for InputNode<T> {
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
        self.output().set_output(self.values.borrow().clone())
    }

    fn copy(&self, transformer: &mut ModelTransformer) -> Result<()> {
        let copy = InputNode::<T>::new(self.size());
        copy.set_input(&self.values.borrow())?;
        let elements = PortElements::from(transformer.add_node(copy)?.output());
        transformer.map_node_output(self.output(), &elements)
    }

    fn is_compilable(&self) -> bool {
        true
    }

    fn role(&self) -> NodeRole {
        NodeRole::Input
    }

    fn archive_fields(&self) -> Result<Value> {
        Ok(serde_json::to_value(InputFields { size: self.size() })?)
    }
}

impl<T: PortValue> ArchivableNode for InputNode<T> {
    fn archive_tag() -> String {
        format!("InputNode<{}>", T::TYPE_NAME)
    }

    fn from_archive(archive: &NodeArchive, _context: &ReadContext) -> Result<Self> {
        let fields: InputFields = archive.fields()?;
        Ok(InputNode::new(fields.size))
    }
}
