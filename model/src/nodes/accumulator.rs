use std::cell::RefCell;

use crate::archive::{ArchivableNode, NodeArchive, ReadContext};
use crate::error::Result;
use crate::model::Model;
use crate::node::{Node, NodeBase};
use crate::port::{InputPort, Numeric, OutputPort};
use crate::port_elements::PortElements;
use crate::transform::ModelTransformer;

/// Running element-wise sum of every input seen since the last reset.
#[derive(Debug)]
pub struct AccumulatorNode<T: Numeric> {
    base: NodeBase,
    total: RefCell<Vec<T>>,
}

impl<T: Numeric> AccumulatorNode<T> {
    pub fn new(input: PortElements) -> Self {
        let size = input.size();
        let mut base = NodeBase::new();
        base.add_input::<T>("input", input);
        base.add_output::<T>("output", size);
        AccumulatorNode {
            base,
            total: RefCell::new(vec![T::default(); size]),
        }
    }

    pub fn input(&self) -> &InputPort {
        self.base.input(0)
    }

    pub fn output(&self) -> &OutputPort {
        self.base.output(0)
    }
}

impl<T: Numeric> Node for AccumulatorNode<T> {
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
        let sample = self.input().values::<T>(model)?;
        let mut total = self.total.borrow_mut();
        for (acc, value) in total.iter_mut().zip(sample) {
            *acc = acc.plus(value);
        }
        self.output().set_output(total.clone())
    }

    fn copy(&self, transformer: &mut ModelTransformer) -> Result<()> {
        let input = transformer.corresponding_inputs(self.input())?;
        let elements = PortElements::from(transformer.add_node(AccumulatorNode::<T>::new(input))?.output());
        transformer.map_node_output(self.output(), &elements)
    }

    fn is_compilable(&self) -> bool {
        true
    }

    fn has_state(&self) -> bool {
        true
    }

    fn reset(&self) {
        *self.total.borrow_mut() = vec![T::default(); self.output().size()];
    }
}

impl<T: Numeric> ArchivableNode for AccumulatorNode<T> {
    fn archive_tag() -> String {
        format!("AccumulatorNode<{}>", T::TYPE_NAME)
    }

    fn from_archive(archive: &NodeArchive, context: &ReadContext) -> Result<Self> {
        Ok(AccumulatorNode::new(context.input(archive, 0)?))
    }
}
