use crate::archive::{ArchivableNode, NodeArchive, ReadContext};
use crate::error::Result;
use crate::model::Model;
use crate::node::{downcast, Node, NodeBase};
use crate::port::{InputPort, OutputPort, PortValue};
use crate::port_elements::PortElements;
use crate::transform::ModelTransformer;

/// Concatenates the ranges of its input into one contiguous port. Inserted
/// by `Model::simplify_outputs` whenever a consumer needs a whole port.
#[derive(Debug)]
pub struct SpliceNode<T: PortValue> {
    base: NodeBase,
    _value: std::marker::PhantomData<T>,
}

impl<T: PortValue> SpliceNode<T> {
    pub fn new(input: PortElements) -> Self {
        let mut base = NodeBase::new();
        let size = input.size();
        base.add_input::<T>("input", input);
        base.add_output::<T>("output", size);
        SpliceNode {
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

impl<T: PortValue> Node for SpliceNode<T> {
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
        let elements = PortElements::from(transformer.add_node(SpliceNode::<T>::new(input))?.output());
        transformer.map_node_output(self.output(), &elements)
    }

    fn is_compilable(&self) -> bool {
        true
    }
}

impl<T: PortValue> ArchivableNode for SpliceNode<T> {
    fn archive_tag() -> String {
        format!("SpliceNode<{}>", T::TYPE_NAME)
    }

    fn from_archive(archive: &NodeArchive, context: &ReadContext) -> Result<Self> {
        Ok(SpliceNode::new(context.input(archive, 0)?))
    }
}

/// The input port of `node` if it is a splice of any value type.
pub fn splice_input(node: &dyn Node) -> Option<&InputPort> {
    downcast::<SpliceNode<bool>>(node)
        .map(|n| n.input())
        .or_else(|| downcast::<SpliceNode<i32>>(node).map(|n| n.input()))
        .or_else(|| downcast::<SpliceNode<i64>>(node).map(|n| n.input()))
        .or_else(|| downcast::<SpliceNode<f32>>(node).map(|n| n.input()))
        .or_else(|| downcast::<SpliceNode<f64>>(node).map(|n| n.input()))
}
