// dot.rs — Graphviz DOT output for models
//
// Preconditions: `model` is acyclic.
// Postconditions: returns a DOT digraph with one vertex per node, in visit
//                 order, and one edge per input range.
// Failure modes: cycles → `IllegalState` (from traversal).
// Side effects: none.

use std::fmt::Write;

use crate::error::{ModelError, Result};
use crate::model::Model;
use crate::node::NodeRole;

/// Emit the model as a Graphviz DOT string.
pub fn emit_dot(model: &Model) -> Result<String> {
    let mut buf = String::new();
    match render(model, &mut buf) {
        Ok(()) => Ok(buf),
        Err(RenderError::Model(err)) => Err(err),
        Err(RenderError::Format) => Err(ModelError::illegal("failed to format DOT output")),
    }
}

fn render(model: &Model, buf: &mut String) -> std::result::Result<(), RenderError> {
    let order = model.visit_order(&[])?;
    writeln!(buf, "digraph model {{")?;
    writeln!(buf, "    rankdir=LR;")?;
    writeln!(buf, "    node [fontname=\"Helvetica\", fontsize=10];")?;
    writeln!(buf, "    edge [fontname=\"Helvetica\", fontsize=9];")?;
    writeln!(buf)?;

    for id in &order {
        let node = model.node(*id)?;
        writeln!(
            buf,
            "    {} [label=\"{}\\n{}\", shape={}];",
            id,
            escape(&node.type_name()),
            id,
            shape(node.role())
        )?;
    }

    writeln!(buf)?;
    for id in &order {
        let node = model.node(*id)?;
        for input in node.input_ports() {
            for range in input.elements().ranges() {
                let source = model.output_port(range.port)?;
                writeln!(
                    buf,
                    "    {} -> {} [label=\"{}[{}..{}] -> {}\"];",
                    range.port.node,
                    id,
                    escape(source.name()),
                    range.start,
                    range.end(),
                    escape(input.name())
                )?;
            }
        }
    }

    writeln!(buf, "}}")?;
    Ok(())
}

// ── Helpers ─────────────────────────────────────────────────────────────────

enum RenderError {
    Model(ModelError),
    Format,
}

impl From<ModelError> for RenderError {
    fn from(err: ModelError) -> Self {
        RenderError::Model(err)
    }
}

impl From<std::fmt::Error> for RenderError {
    fn from(_: std::fmt::Error) -> Self {
        RenderError::Format
    }
}

fn shape(role: NodeRole) -> &'static str {
    match role {
        NodeRole::Input => "invhouse",
        NodeRole::Output => "house",
        NodeRole::Sink => "box3d",
        NodeRole::DebugSink => "note",
        NodeRole::Compute => "box",
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use crate::nodes::{InputNode, OutputNode};
    use crate::port_elements::PortElements;

    #[test]
    fn emits_one_vertex_per_node_and_one_edge_per_range() {
        let mut model = Model::new();
        let input = model.add_node(InputNode::<f64>::new(3)).unwrap();
        let (input_id, elements) = (input.id(), PortElements::from(input.output()));
        let output = model.add_node(OutputNode::<f64>::new(elements)).unwrap().id();

        let dot = emit_dot(&model).unwrap();
        assert!(dot.starts_with("digraph model {"));
        assert!(dot.contains(&format!("{input_id} [label=\"InputNode<double>\\n{input_id}\", shape=invhouse];")));
        assert!(dot.contains(&format!("{input_id} -> {output} [label=\"output[0..3] -> input\"];")));
        assert_eq!(dot.matches("->").count(), 2);
    }

    #[test]
    fn output_is_deterministic() {
        let mut model = Model::new();
        let input = model.add_node(InputNode::<i32>::new(1)).unwrap();
        let elements = PortElements::from(input.output());
        model.add_node(OutputNode::<i32>::new(elements)).unwrap();
        assert_eq!(emit_dot(&model).unwrap(), emit_dot(&model).unwrap());
    }
}
