// port_elements.rs — Composite views over one or more output ports
//
// A PortElements is an ordered list of (port, start, count) ranges. It lets
// an input consume slices of several upstream ports as one logical vector.
//
// Preconditions: ranges reference output ports that exist in the model the
//                view is resolved against.
// Postconditions: `size()` is the sum of range counts.
// Failure modes: zero-count or overflowing ranges → `InvalidArgument`.
// Side effects: none.

use std::fmt;

use crate::error::{ModelError, Result};
use crate::id::{NodeId, OutputPortRef};
use crate::model::Model;
use crate::port::OutputPort;

/// A contiguous slice of one output port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortRange {
    pub port: OutputPortRef,
    pub start: usize,
    pub count: usize,
}

impl PortRange {
    pub fn new(port: OutputPortRef, start: usize, count: usize) -> Result<Self> {
        if count == 0 {
            return Err(ModelError::invalid(format!("empty range on {port}")));
        }
        if start.checked_add(count).is_none() {
            return Err(ModelError::invalid(format!(
                "range on {port} starting at {start} with {count} elements overflows"
            )));
        }
        Ok(PortRange { port, start, count })
    }

    /// One past the last element. Saturates, so an unchecked range built
    /// from the public fields still fails any bounds check against a port.
    pub fn end(&self) -> usize {
        self.start.saturating_add(self.count)
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}..{}]", self.port, self.start, self.end())
    }
}

/// Ordered ranges over output ports, read as one vector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortElements {
    ranges: Vec<PortRange>,
}

impl PortElements {
    /// Every element of a port. A size-0 port yields an empty view, which
    /// no input accepts.
    pub fn full(port: &OutputPort) -> Self {
        if port.size() == 0 {
            return PortElements::default();
        }
        PortElements {
            ranges: vec![PortRange {
                port: port.port_ref(),
                start: 0,
                count: port.size(),
            }],
        }
    }

    /// A single slice of a port.
    pub fn range(port: OutputPortRef, start: usize, count: usize) -> Result<Self> {
        Ok(PortElements {
            ranges: vec![PortRange::new(port, start, count)?],
        })
    }

    /// Element `index` of a port.
    pub fn element(port: OutputPortRef, index: usize) -> Self {
        PortElements {
            ranges: vec![PortRange {
                port,
                start: index,
                count: 1,
            }],
        }
    }

    pub fn from_ranges(ranges: Vec<PortRange>) -> Result<Self> {
        for range in &ranges {
            PortRange::new(range.port, range.start, range.count)?;
        }
        Ok(PortElements { ranges })
    }

    /// Concatenate several views in order.
    pub fn concat<'a>(parts: impl IntoIterator<Item = &'a PortElements>) -> Self {
        let mut out = PortElements::default();
        for part in parts {
            out.append(part);
        }
        out
    }

    pub fn append(&mut self, other: &PortElements) {
        self.ranges.extend_from_slice(&other.ranges);
    }

    pub fn ranges(&self) -> &[PortRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn size(&self) -> usize {
        self.ranges.iter().map(|r| r.count).sum()
    }

    /// The port and offset holding logical element `index`.
    pub fn element_at(&self, index: usize) -> Result<(OutputPortRef, usize)> {
        let mut remaining = index;
        for range in &self.ranges {
            if remaining < range.count {
                return Ok((range.port, range.start + remaining));
            }
            remaining -= range.count;
        }
        Err(ModelError::invalid(format!(
            "element {index} out of range for elements of size {}",
            self.size()
        )))
    }

    /// Merge adjacent ranges that continue on the same port.
    pub fn consolidate(&self) -> Self {
        let mut merged: Vec<PortRange> = Vec::with_capacity(self.ranges.len());
        for range in &self.ranges {
            match merged.last_mut() {
                Some(last) if last.port == range.port && last.end() == range.start => {
                    last.count += range.count;
                }
                _ => merged.push(*range),
            }
        }
        PortElements { ranges: merged }
    }

    /// The referenced port when this view is exactly one whole port.
    pub fn full_port(&self, model: &Model) -> Option<OutputPortRef> {
        match self.ranges.as_slice() {
            [only] if only.start == 0 => {
                let port = model.output_port(only.port).ok()?;
                (port.size() == only.count).then_some(only.port)
            }
            _ => None,
        }
    }

    /// Whether this view is exactly one whole port, so no synthetic splice is
    /// needed to materialize it.
    pub fn is_full_port_output(&self, model: &Model) -> bool {
        self.full_port(model).is_some()
    }

    /// Owners of the referenced ports, deduplicated, in first-reference order.
    pub fn referenced_nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = Vec::new();
        for range in &self.ranges {
            if !nodes.contains(&range.port.node) {
                nodes.push(range.port.node);
            }
        }
        nodes
    }
}

impl From<&OutputPort> for PortElements {
    fn from(port: &OutputPort) -> Self {
        PortElements::full(port)
    }
}

impl fmt::Display for PortElements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, range) in self.ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{range}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(node: u64, index: usize) -> OutputPortRef {
        OutputPortRef::new(NodeId(node), index)
    }

    #[test]
    fn size_sums_ranges() {
        let a = PortElements::range(port(1, 0), 0, 3).unwrap();
        let b = PortElements::range(port(2, 0), 1, 2).unwrap();
        assert_eq!(PortElements::concat([&a, &b]).size(), 5);
    }

    #[test]
    fn empty_range_is_rejected() {
        assert!(matches!(
            PortElements::range(port(1, 0), 0, 0),
            Err(ModelError::InvalidArgument(_))
        ));
    }

    #[test]
    fn overflowing_range_is_rejected() {
        assert!(matches!(
            PortRange::new(port(1, 0), usize::MAX, 2),
            Err(ModelError::InvalidArgument(_))
        ));
        let unchecked = PortRange {
            port: port(1, 0),
            start: usize::MAX,
            count: 2,
        };
        assert_eq!(unchecked.end(), usize::MAX);
        assert!(matches!(
            PortElements::from_ranges(vec![unchecked]),
            Err(ModelError::InvalidArgument(_))
        ));
    }

    #[test]
    fn full_view_of_empty_port_is_empty() {
        let input = crate::nodes::InputNode::<f64>::new(0);
        let elements = PortElements::from(input.output());
        assert!(elements.is_empty());
        assert_eq!(elements.size(), 0);

        let mut model = Model::new();
        let input = model.add_node(crate::nodes::InputNode::<f64>::new(0)).unwrap();
        let elements = PortElements::from(input.output());
        assert!(matches!(
            model.add_node(crate::nodes::OutputNode::<f64>::new(elements)),
            Err(ModelError::InvalidArgument(_))
        ));
    }

    #[test]
    fn consolidate_merges_contiguous_ranges_on_same_port() {
        let elements = PortElements::from_ranges(vec![
            PortRange::new(port(1, 0), 0, 2).unwrap(),
            PortRange::new(port(1, 0), 2, 1).unwrap(),
            PortRange::new(port(2, 0), 0, 1).unwrap(),
            PortRange::new(port(1, 0), 3, 1).unwrap(),
        ])
        .unwrap();
        let merged = elements.consolidate();
        assert_eq!(merged.ranges().len(), 3);
        assert_eq!(merged.ranges()[0].count, 3);
        assert_eq!(merged.size(), elements.size());
    }

    #[test]
    fn element_at_walks_ranges() {
        let elements = PortElements::concat([
            &PortElements::range(port(1, 0), 4, 2).unwrap(),
            &PortElements::range(port(2, 1), 0, 3).unwrap(),
        ]);
        assert_eq!(elements.element_at(1).unwrap(), (port(1, 0), 5));
        assert_eq!(elements.element_at(2).unwrap(), (port(2, 1), 0));
        assert!(elements.element_at(5).is_err());
    }

    #[test]
    fn referenced_nodes_are_deduplicated_in_order() {
        let elements = PortElements::concat([
            &PortElements::element(port(5, 0), 0),
            &PortElements::element(port(3, 0), 0),
            &PortElements::element(port(5, 1), 0),
        ]);
        assert_eq!(elements.referenced_nodes(), vec![NodeId(5), NodeId(3)]);
    }
}
