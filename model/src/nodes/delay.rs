use std::cell::RefCell;
use std::collections::VecDeque;

use serde_json::Value;

use super::moving_average::{zeroed_window, WindowFields};
use crate::archive::{ArchivableNode, NodeArchive, ReadContext};
use crate::error::{ModelError, Result};
use crate::model::Model;
use crate::node::{Node, NodeBase};
use crate::port::{InputPort, OutputPort, PortValue};
use crate::port_elements::PortElements;
use crate::transform::ModelTransformer;

/// Emits the input vector from `window` computes ago (zeros until then).
#[derive(Debug)]
pub struct DelayNode<T: PortValue> {
    base: NodeBase,
    window: usize,
    samples: RefCell<VecDeque<Vec<T>>>,
}

impl<T: PortValue> DelayNode<T> {
    pub fn new(input: PortElements, window: usize) -> Result<Self> {
        if window == 0 {
            return Err(ModelError::invalid("delay window must be positive"));
        }
        let size = input.size();
        let mut base = NodeBase::new();
        base.add_input::<T>("input", input);
        base.add_output::<T>("output", size);
        Ok(DelayNode {
            base,
            window,
            samples: RefCell::new(zeroed_window(window, size)),
        })
    }

    pub fn input(&self) -> &InputPort {
        self.base.input(0)
    }

    pub fn output(&self) -> &OutputPort {
        self.base.output(0)
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

impl<T: PortValue> Node for DelayNode<T> {
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
        let mut samples = self.samples.borrow_mut();
        let delayed = samples
            .pop_front()
            .unwrap_or_else(|| vec![T::default(); sample.len()]);
        samples.push_back(sample);
        self.output().set_output(delayed)
    }

    fn copy(&self, transformer: &mut ModelTransformer) -> Result<()> {
        let input = transformer.corresponding_inputs(self.input())?;
        let node = DelayNode::<T>::new(input, self.window)?;
        let elements = PortElements::from(transformer.add_node(node)?.output());
        transformer.map_node_output(self.output(), &elements)
    }

    fn is_compilable(&self) -> bool {
        true
    }

    fn has_state(&self) -> bool {
        true
    }

    fn reset(&self) {
        *self.samples.borrow_mut() = zeroed_window(self.window, self.output().size());
    }

    fn archive_fields(&self) -> Result<Value> {
        Ok(serde_json::to_value(WindowFields {
            window: self.window,
        })?)
    }
}

impl<T: PortValue> ArchivableNode for DelayNode<T> {
    fn archive_tag() -> String {
        format!("DelayNode<{}>", T::TYPE_NAME)
    }

    fn from_archive(archive: &NodeArchive, context: &ReadContext) -> Result<Self> {
        let fields: WindowFields = archive.fields()?;
        DelayNode::new(context.input(archive, 0)?, fields.window)
    }
}
