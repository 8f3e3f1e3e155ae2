use crate::archive::{ArchivableNode, NodeArchive, ReadContext};
use crate::error::Result;
use crate::model::Model;
use crate::node::{Node, NodeBase, NodeRole};
use crate::port::{InputPort, OutputPort, PortValue};
use crate::port_elements::PortElements;
use crate::transform::ModelTransformer;

/// Marks a value as a model output; passes its input through.
#[derive(Debug)]
pub struct OutputNode<T: PortValue> {
    base: NodeBase,
    _value: std::marker::PhantomData<T>,
}

impl<T: PortValue> OutputNode<T> {
    pub fn new(input: PortElements) -> Self {
        let mut base = NodeBase::new();
        let size = input.size();
        base.add_input::<T>("input", input);
        base.add_output::<T>("output", size);
        OutputNode {
            base,
            _value: std::marker::PhantomData,
        }
    }

    pub fn input(&self) -> &InputPort {
        self.base.input(0)
    }

    pub fn output(&self) -> &OutputPort {
        self.base.output(0)
    }
}

impl<T: PortValue> Node for OutputNode<T> {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn type_name(&self) -> String {
        Self::archive_tag()
    }

    fn compute(&self, model: &Model) -> Result<()> {
        self.output().set_output(self.input().values::<T>(model)?)
    }

    fn copy(&self, transformer: &mut ModelTransformer) -> Result<()> {
        let input = transformer.corresponding_inputs(self.input())?;
        let elements = PortElements::from(transformer.add_node(OutputNode::<T>::new(input))?.output());
        transformer.map_node_output(self.output(), &elements)
    }

    fn is_compilable(&self) -> bool {
        true
    }

    fn role(&self) -> NodeRole {
        NodeRole::Output
    }
}

impl<T: PortValue> ArchivableNode for OutputNode<T> {
    fn archive_tag() -> String {
        format!("OutputNode<{}>", T::TYPE_NAME)
    }

    fn from_archive(archive: &NodeArchive, context: &ReadContext) -> Result<Self> {
        Ok(OutputNode::new(context.input(archive, 0)?))
    }
}
