// submodel.rs — Reachability-validated slices of a model
//
// A Submodel names the outputs to compute and, optionally, input ports at
// which traversal stops. Construction proves the declared inputs are both
// necessary (each lies on some path to an output) and sufficient (no input
// node is reachable without crossing one of them). An empty input set means
// "trace back to the true sources" and is always sufficient.
//
// Preconditions: declared ports exist in `model`.
// Postconditions: `visit_order` lists exactly the nodes between the declared
//                 inputs (exclusive) and outputs (inclusive).
// Failure modes: unknown port, unnecessary input, or missing input →
//                `InvalidArgument`.
// Side effects: none.

use std::collections::HashSet;

use crate::error::{ModelError, Result};
use crate::id::{InputPortRef, NodeId, OutputPortRef};
use crate::model::Model;
use crate::node::{Node, NodeRole};

/// A non-owning, validated slice of a model.
#[derive(Debug, Clone)]
pub struct Submodel<'m> {
    model: &'m Model,
    inputs: Vec<InputPortRef>,
    outputs: Vec<OutputPortRef>,
}

impl<'m> Submodel<'m> {
    pub fn new(model: &'m Model, inputs: Vec<InputPortRef>, outputs: Vec<OutputPortRef>) -> Result<Self> {
        let submodel = Submodel {
            model,
            inputs,
            outputs,
        };
        submodel.validate()?;
        Ok(submodel)
    }

    /// Everything needed for `outputs`, back to the sources.
    pub fn from_outputs(model: &'m Model, outputs: Vec<OutputPortRef>) -> Result<Self> {
        Self::new(model, Vec::new(), outputs)
    }

    /// Every output port of every node in `nodes`.
    pub fn from_nodes(model: &'m Model, nodes: &[NodeId]) -> Result<Self> {
        let mut outputs = Vec::new();
        for id in nodes {
            outputs.extend(model.node(*id)?.output_ports().iter().map(|p| p.port_ref()));
        }
        Self::from_outputs(model, outputs)
    }

    /// The whole model.
    pub fn full(model: &'m Model) -> Self {
        Submodel {
            model,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn model(&self) -> &'m Model {
        self.model
    }

    pub fn inputs(&self) -> &[InputPortRef] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OutputPortRef] {
        &self.outputs
    }

    /// Nodes owning the declared outputs, deduplicated. Empty for `full`.
    fn roots(&self) -> Vec<NodeId> {
        let mut roots: Vec<NodeId> = Vec::new();
        for port in &self.outputs {
            if !roots.contains(&port.node) {
                roots.push(port.node);
            }
        }
        roots
    }

    fn frontier(&self) -> HashSet<InputPortRef> {
        self.inputs.iter().copied().collect()
    }

    pub fn visit_order(&self) -> Result<Vec<NodeId>> {
        self.model.traverse(&self.roots(), &self.frontier())
    }

    /// Number of distinct nodes visited.
    pub fn size(&self) -> Result<usize> {
        Ok(self.visit_order()?.len())
    }

    pub fn visit<F>(&self, mut visitor: F) -> Result<()>
    where
        F: FnMut(&dyn Node) -> Result<()>,
    {
        for id in self.visit_order()? {
            visitor(self.model.node(id)?)?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        for port in &self.outputs {
            self.model.output_port(*port)?;
        }
        for port in &self.inputs {
            self.model.input_port(*port)?;
        }
        if self.outputs.is_empty() {
            return match self.inputs.first() {
                Some(input) => Err(ModelError::invalid(format!(
                    "unnecessary input {input}: submodel has no outputs"
                ))),
                None => Ok(()),
            };
        }

        let frontier = self.frontier();
        let mut seen: HashSet<InputPortRef> = HashSet::new();
        let mut expanded: HashSet<NodeId> = HashSet::new();
        let mut stack = self.roots();
        while let Some(id) = stack.pop() {
            if !expanded.insert(id) {
                continue;
            }
            let node = self.model.node(id)?;
            if !frontier.is_empty() && node.role() == NodeRole::Input {
                return Err(ModelError::invalid(format!(
                    "missing input: input node {id} is reachable past the declared inputs"
                )));
            }
            for input in node.input_ports() {
                if frontier.contains(&input.port_ref()) {
                    seen.insert(input.port_ref());
                    continue;
                }
                stack.extend(input.parent_nodes());
            }
        }

        match self.inputs.iter().find(|i| !seen.contains(i)) {
            Some(unused) => Err(ModelError::invalid(format!(
                "unnecessary input {unused}: not on any path to the outputs"
            ))),
            None => Ok(()),
        }
    }
}
