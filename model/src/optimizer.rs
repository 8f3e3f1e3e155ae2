// optimizer.rs — Rewrite passes over a model
//
// Each pass is a per-node rewrite run through `ModelTransformer::
// transform_model`. The optimizer repeats its pass list until a full round
// changes nothing or the iteration bound is reached.

use tracing::debug;

use crate::error::{ModelError, Result};
use crate::model::Model;
use crate::node::Node;
use crate::nodes::splice_input;
use crate::transform::{ModelTransformer, TransformContext};

/// A per-node rewrite.
pub trait OptimizationPass {
    fn name(&self) -> &str;

    /// Emit `node` (or a replacement) into the transformer's model. Returns
    /// true when the node was rewritten rather than copied. `source` is the
    /// model `node` belongs to.
    fn optimize_node(&self, node: &dyn Node, source: &Model, transformer: &mut ModelTransformer) -> Result<bool>;
}

/// Drops splices that reassemble exactly one whole port; consumers read the
/// port directly.
#[derive(Debug, Default)]
pub struct RemoveRedundantSplices;

impl OptimizationPass for RemoveRedundantSplices {
    fn name(&self) -> &str {
        "remove_redundant_splices"
    }

    fn optimize_node(&self, node: &dyn Node, source: &Model, transformer: &mut ModelTransformer) -> Result<bool> {
        if let Some(input) = splice_input(node) {
            if input.elements().consolidate().is_full_port_output(source) {
                let upstream = transformer.corresponding_inputs(input)?;
                transformer.map_node_output(&node.output_ports()[0], &upstream)?;
                return Ok(true);
            }
        }
        node.copy(transformer)?;
        Ok(false)
    }
}

/// Ordered pass list with an iteration bound.
pub struct ModelOptimizer {
    passes: Vec<Box<dyn OptimizationPass>>,
    max_iterations: usize,
    context: TransformContext,
}

impl Default for ModelOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelOptimizer {
    pub fn new() -> Self {
        ModelOptimizer {
            passes: Vec::new(),
            max_iterations: 4,
            context: TransformContext::new(),
        }
    }

    /// The built-in pass list.
    pub fn standard() -> Self {
        let mut optimizer = Self::new();
        optimizer.add_pass(RemoveRedundantSplices);
        optimizer
    }

    pub fn add_pass<P: OptimizationPass + 'static>(&mut self, pass: P) {
        self.passes.push(Box::new(pass));
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Run one pass over `model`, returning the rewritten model, the
    /// transformer holding the remap, and whether anything changed.
    pub fn run_pass(&self, index: usize, model: &Model) -> Result<(Model, ModelTransformer, bool)> {
        let pass = self
            .passes
            .get(index)
            .ok_or_else(|| ModelError::invalid(format!("no optimization pass {index}")))?;
        let mut transformer = ModelTransformer::new(self.context.clone());
        let mut changed = false;
        let optimized = transformer.transform_model(model, |node, t| {
            changed |= pass.optimize_node(node, model, t)?;
            Ok(())
        })?;
        debug!(pass = pass.name(), changed, "optimization pass");
        Ok((optimized, transformer, changed))
    }

    pub fn num_passes(&self) -> usize {
        self.passes.len()
    }

    /// Optimize a bare model. Callers holding ids into `model` should use
    /// `Map::optimize`, which re-resolves them after every pass.
    pub fn optimize(&self, model: &Model) -> Result<Model> {
        let mut transformer = ModelTransformer::new(self.context.clone());
        let mut current = transformer.copy_model(model)?;
        for _ in 0..self.max_iterations {
            let mut changed = false;
            for index in 0..self.passes.len() {
                let (next, _, pass_changed) = self.run_pass(index, &current)?;
                current = next;
                changed |= pass_changed;
            }
            if !changed {
                break;
            }
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{InputNode, OutputNode, SpliceNode};
    use crate::port_elements::PortElements;

    #[test]
    fn redundant_splice_is_removed() {
        let mut model = Model::new();
        let input = model.add_node(InputNode::<f32>::new(3)).unwrap();
        let elements = PortElements::from(input.output());
        let splice = model.add_node(SpliceNode::<f32>::new(elements)).unwrap();
        let spliced = PortElements::from(splice.output());
        model.add_node(OutputNode::<f32>::new(spliced)).unwrap();

        let optimized = ModelOptimizer::standard().optimize(&model).unwrap();
        assert_eq!(optimized.size(), 2);
        assert!(optimized.nodes().all(|n| !n.type_name().starts_with("SpliceNode")));
    }

    #[test]
    fn real_splice_is_kept() {
        let mut model = Model::new();
        let a = model.add_node(InputNode::<f32>::new(2)).unwrap();
        let a = PortElements::from(a.output());
        let b = model.add_node(InputNode::<f32>::new(2)).unwrap();
        let b = PortElements::from(b.output());
        let both = PortElements::concat([&a, &b]);
        let splice = model.add_node(SpliceNode::<f32>::new(both)).unwrap();
        let spliced = PortElements::from(splice.output());
        model.add_node(OutputNode::<f32>::new(spliced)).unwrap();

        let optimized = ModelOptimizer::standard().optimize(&model).unwrap();
        assert_eq!(optimized.size(), 4);
    }

    #[test]
    fn standard_pass_list() {
        assert_eq!(
            ModelOptimizer::standard().pass_names(),
            vec!["remove_redundant_splices"]
        );
    }
}
