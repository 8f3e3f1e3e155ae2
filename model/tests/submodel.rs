// Submodel slicing tests.
//
// Size agrees with traversal, and declared inputs are checked for necessity
// (each on a path to an output) and sufficiency (no input node reachable
// past them). Non-input sources behind the frontier are pulled into the
// slice rather than rejected; `constants_behind_frontier_join_the_slice`
// pins that behavior.

use emodel::nodes::{BinaryOperation, BinaryOperationNode, ConstantNode, InputNode, OutputNode};
use emodel::*;

/// ```text
///   a ─┐
///      s1 ─┐
///   c ─┘    s2 ── out
///   b ─────┘
/// ```
struct Diamond {
    model: Model,
    a: NodeId,
    b: NodeId,
    s1: NodeId,
    s2: NodeId,
    out: NodeId,
}

fn diamond() -> Diamond {
    let mut model = Model::new();
    let a = model.add_node(InputNode::<i32>::new(2)).unwrap();
    let (a_id, a_out) = (a.id(), PortElements::from(a.output()));
    let b = model.add_node(InputNode::<i32>::new(2)).unwrap();
    let (b_id, b_out) = (b.id(), PortElements::from(b.output()));
    let c = model.add_node(ConstantNode::new(vec![1i32, 1])).unwrap();
    let c_out = PortElements::from(c.output());
    let s1 = model
        .add_node(BinaryOperationNode::<i32>::new(a_out, c_out, BinaryOperation::Add).unwrap())
        .unwrap();
    let (s1_id, s1_out) = (s1.id(), PortElements::from(s1.output()));
    let s2 = model
        .add_node(BinaryOperationNode::<i32>::new(s1_out, b_out, BinaryOperation::Multiply).unwrap())
        .unwrap();
    let (s2_id, s2_out) = (s2.id(), PortElements::from(s2.output()));
    let out = model.add_node(OutputNode::<i32>::new(s2_out)).unwrap().id();
    Diamond {
        model,
        a: a_id,
        b: b_id,
        s1: s1_id,
        s2: s2_id,
        out,
    }
}

fn out_port(d: &Diamond) -> OutputPortRef {
    OutputPortRef::new(d.out, 0)
}

#[test]
fn size_matches_visit_count() {
    let d = diamond();
    let slice = Submodel::from_outputs(&d.model, vec![out_port(&d)]).unwrap();
    assert_eq!(slice.size().unwrap(), d.model.visit_order(&[d.out]).unwrap().len());
    assert_eq!(slice.size().unwrap(), 6);

    let partial = Submodel::from_outputs(&d.model, vec![OutputPortRef::new(d.s1, 0)]).unwrap();
    assert_eq!(partial.size().unwrap(), 3);
}

#[test]
fn full_submodel_covers_the_model() {
    let d = diamond();
    let slice = Submodel::full(&d.model);
    assert_eq!(slice.size().unwrap(), d.model.size());
}

#[test]
fn sufficient_inputs_stop_traversal() {
    let d = diamond();
    let slice = Submodel::new(
        &d.model,
        vec![
            InputPortRef::new(d.s2, 0),
            InputPortRef::new(d.s2, 1),
        ],
        vec![out_port(&d)],
    )
    .unwrap();
    assert_eq!(slice.visit_order().unwrap(), vec![d.s2, d.out]);
}

#[test]
fn missing_input_is_rejected() {
    let d = diamond();
    let err = Submodel::new(&d.model, vec![InputPortRef::new(d.s1, 0)], vec![out_port(&d)]).unwrap_err();
    assert!(matches!(err, ModelError::InvalidArgument(msg) if msg.contains("missing input")));
}

#[test]
fn unnecessary_input_is_rejected() {
    let d = diamond();
    let err = Submodel::new(
        &d.model,
        vec![
            InputPortRef::new(d.s2, 0),
            InputPortRef::new(d.s2, 1),
            InputPortRef::new(d.s1, 0),
        ],
        vec![out_port(&d)],
    )
    .unwrap_err();
    assert!(matches!(err, ModelError::InvalidArgument(msg) if msg.contains("unnecessary input")));

    let err = Submodel::new(&d.model, vec![InputPortRef::new(d.s1, 0)], Vec::new()).unwrap_err();
    assert!(matches!(err, ModelError::InvalidArgument(_)));
}

#[test]
fn constants_behind_frontier_join_the_slice() {
    let d = diamond();
    let slice = Submodel::new(
        &d.model,
        vec![InputPortRef::new(d.s1, 0), InputPortRef::new(d.s2, 1)],
        vec![out_port(&d)],
    )
    .unwrap();
    let order = slice.visit_order().unwrap();
    assert_eq!(order.len(), 4);
    assert!(!order.contains(&d.a));
    assert!(!order.contains(&d.b));
}

#[test]
fn visit_calls_parents_first() {
    let d = diamond();
    let slice = Submodel::from_outputs(&d.model, vec![out_port(&d)]).unwrap();
    let mut names = Vec::new();
    slice
        .visit(|node| {
            names.push((node.id(), node.type_name()));
            Ok(())
        })
        .unwrap();
    let pos = |id: NodeId| names.iter().position(|(n, _)| *n == id).unwrap();
    assert!(pos(d.a) < pos(d.s1));
    assert!(pos(d.b) < pos(d.s2));
    assert!(pos(d.s1) < pos(d.s2));
    assert_eq!(names.last().map(|(_, t)| t.as_str()), Some("OutputNode<int>"));
}

#[test]
fn unknown_ports_are_rejected() {
    let d = diamond();
    let err = Submodel::from_outputs(&d.model, vec![OutputPortRef::new(d.out, 3)]).unwrap_err();
    assert!(matches!(err, ModelError::InvalidArgument(_)));
}
