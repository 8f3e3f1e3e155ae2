// id.rs — Process-wide node identities and port references
//
// A NodeId is the only handle that survives across models: raw references
// into a Model are invalidated by every copy/refine pass, ids are not.
// Port references pair a node id with a port index and are what the
// transformer's remap tables are keyed on.
//
// Preconditions: none.
// Postconditions: every call to `NodeId::fresh` returns a distinct id.
// Failure modes: none.
// Side effects: advances a global atomic counter.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a node. Ids are allocated in construction order and never
/// reused, so ordering by id is ordering by construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Allocate a new id from the process-wide counter.
    pub fn fresh() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// The `index`-th output port of `node`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputPortRef {
    pub node: NodeId,
    pub index: usize,
}

impl OutputPortRef {
    pub fn new(node: NodeId, index: usize) -> Self {
        OutputPortRef { node, index }
    }
}

impl fmt::Display for OutputPortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.out{}", self.node, self.index)
    }
}

/// The `index`-th input port of `node`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputPortRef {
    pub node: NodeId,
    pub index: usize,
}

impl InputPortRef {
    pub fn new(node: NodeId, index: usize) -> Self {
        InputPortRef { node, index }
    }
}

impl fmt::Display for InputPortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.in{}", self.node, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_are_distinct_and_increasing() {
        let a = NodeId::fresh();
        let b = NodeId::fresh();
        let c = NodeId::fresh();
        assert!(a < b && b < c);
    }

    #[test]
    fn port_refs_display_with_owner() {
        let port = OutputPortRef::new(NodeId(7), 1);
        assert_eq!(port.to_string(), "n7.out1");
        let input = InputPortRef::new(NodeId(7), 0);
        assert_eq!(input.to_string(), "n7.in0");
    }
}
