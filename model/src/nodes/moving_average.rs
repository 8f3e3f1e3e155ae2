use std::cell::RefCell;
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{AccumulatorNode, BinaryOperation, BinaryOperationNode, ConstantNode, DelayNode};
use crate::archive::{ArchivableNode, NodeArchive, ReadContext};
use crate::error::{ModelError, Result};
use crate::model::Model;
use crate::node::{Node, NodeBase};
use crate::port::{InputPort, Numeric, OutputPort};
use crate::port_elements::PortElements;
use crate::transform::ModelTransformer;

#[derive(Serialize, Deserialize)]
pub(super) struct WindowFields {
    pub(super) window: usize,
}

/// Element-wise mean of the last `window` input vectors. Not compilable: a
/// refine pass lowers it to delay, subtract, accumulate, and divide.
#[derive(Debug)]
pub struct MovingAverageNode<T: Numeric> {
    base: NodeBase,
    window: usize,
    samples: RefCell<VecDeque<Vec<T>>>,
    running_sum: RefCell<Vec<T>>,
}

impl<T: Numeric> MovingAverageNode<T> {
    pub fn new(input: PortElements, window: usize) -> Result<Self> {
        if window == 0 {
            return Err(ModelError::invalid("moving average window must be positive"));
        }
        let size = input.size();
        let mut base = NodeBase::new();
        base.add_input::<T>("input", input);
        base.add_output::<T>("output", size);
        Ok(MovingAverageNode {
            base,
            window,
            samples: RefCell::new(zeroed_window(window, size)),
            running_sum: RefCell::new(vec![T::default(); size]),
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

pub(super) fn zeroed_window<T: Copy + Default>(window: usize, size: usize) -> VecDeque<Vec<T>> {
    (0..window).map(|_| vec![T::default(); size]).collect()
}

impl<T: Numeric> Node for MovingAverageNode<T> {
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
        let mut sum = self.running_sum.borrow_mut();
        let oldest = samples
            .pop_front()
            .unwrap_or_else(|| vec![T::default(); sample.len()]);
        for ((total, new), old) in sum.iter_mut().zip(&sample).zip(&oldest) {
            *total = total.plus(new.minus(*old));
        }
        samples.push_back(sample);

        let window = T::from_count(self.window);
        let mut result = Vec::with_capacity(sum.len());
        for total in sum.iter() {
            result.push(
                total
                    .divide(window)
                    .ok_or_else(|| ModelError::illegal("moving average window is zero"))?,
            );
        }
        self.output().set_output(result)
    }

    fn copy(&self, transformer: &mut ModelTransformer) -> Result<()> {
        let input = transformer.corresponding_inputs(self.input())?;
        let node = MovingAverageNode::<T>::new(input, self.window)?;
        let elements = PortElements::from(transformer.add_node(node)?.output());
        transformer.map_node_output(self.output(), &elements)
    }

    fn refine(&self, transformer: &mut ModelTransformer) -> Result<bool> {
        let input = transformer.corresponding_inputs(self.input())?;
        let size = input.size();

        let delay = transformer.add_node(DelayNode::<T>::new(input.clone(), self.window)?)?;
        let delayed = PortElements::from(delay.output());
        let difference = transformer.add_node(BinaryOperationNode::<T>::new(
            input,
            delayed,
            BinaryOperation::Subtract,
        )?)?;
        let difference = PortElements::from(difference.output());
        let sum = PortElements::from(transformer.add_node(AccumulatorNode::<T>::new(difference))?.output());
        let divisor = vec![T::from_count(self.window); size];
        let divisor = PortElements::from(transformer.add_node(ConstantNode::new(divisor))?.output());
        let quotient =
            transformer.add_node(BinaryOperationNode::<T>::new(sum, divisor, BinaryOperation::Divide)?)?;
        let quotient = PortElements::from(quotient.output());

        transformer.map_node_output(self.output(), &quotient)?;
        Ok(true)
    }

    fn has_state(&self) -> bool {
        true
    }

    fn reset(&self) {
        let size = self.output().size();
        *self.samples.borrow_mut() = zeroed_window(self.window, size);
        *self.running_sum.borrow_mut() = vec![T::default(); size];
    }

    fn archive_fields(&self) -> Result<Value> {
        Ok(serde_json::to_value(WindowFields {
            window: self.window,
        })?)
    }
}

impl<T: Numeric> ArchivableNode for MovingAverageNode<T> {
    fn archive_tag() -> String {
        format!("MovingAverageNode<{}>", T::TYPE_NAME)
    }

    fn from_archive(archive: &NodeArchive, context: &ReadContext) -> Result<Self> {
        let fields: WindowFields = archive.fields()?;
        MovingAverageNode::new(context.input(archive, 0)?, fields.window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::OutputPortRef;
    use crate::nodes::InputNode;

    #[test]
    fn averages_over_window() {
        let mut model = Model::new();
        let input = model.add_node(InputNode::<f64>::new(1)).unwrap();
        let (input_id, elements) = (input.id(), PortElements::from(input.output()));
        let average = model.add_node(MovingAverageNode::<f64>::new(elements, 2).unwrap()).unwrap();
        let out = PortElements::from(average.output());

        let mut seen = Vec::new();
        for x in [2.0, 4.0, 8.0] {
            model
                .node_as::<InputNode<f64>>(input_id)
                .unwrap()
                .set_input(&[x])
                .unwrap();
            seen.extend(model.compute_output::<f64>(&out).unwrap());
        }
        assert_eq!(seen, vec![1.0, 3.0, 6.0]);
    }

    #[test]
    fn reset_clears_history() {
        let mut model = Model::new();
        let input = model.add_node(InputNode::<i32>::new(1)).unwrap();
        let (input_id, elements) = (input.id(), PortElements::from(input.output()));
        let average = model.add_node(MovingAverageNode::<i32>::new(elements, 2).unwrap()).unwrap();
        let out = PortElements::from(average.output());
        let feed = |x: i32| {
            model
                .node_as::<InputNode<i32>>(input_id)
                .unwrap()
                .set_input(&[x])
                .unwrap();
            model.compute_output::<i32>(&out).unwrap()[0]
        };
        assert_eq!(feed(10), 5);
        assert_eq!(feed(10), 10);
        model.reset();
        assert_eq!(feed(10), 5);
        assert!(model
            .output_port(OutputPortRef::new(input_id, 0))
            .unwrap()
            .is_referenced());
    }

    #[test]
    fn zero_window_is_rejected() {
        let elements = PortElements::element(OutputPortRef::new(crate::id::NodeId(1), 0), 0);
        assert!(MovingAverageNode::<f64>::new(elements, 0).is_err());
    }
}
