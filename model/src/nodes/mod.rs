// nodes — Built-in node library
//
// The small set of node types the Map facade itself needs (inputs, outputs,
// constants, splices, sinks) plus the arithmetic and signal nodes that the
// moving-average refinement expands into. Kernels are plain reference
// implementations; fast code comes from a backend, not from here.

mod accumulator;
mod binary;
mod constant;
mod delay;
mod extremal;
mod input;
mod moving_average;
mod output;
mod sink;
mod splice;

pub use accumulator::AccumulatorNode;
pub use binary::{BinaryOperation, BinaryOperationNode};
pub use constant::ConstantNode;
pub use delay::DelayNode;
pub use extremal::{ArgMax, ArgMaxNode, ArgMin, ArgMinNode, Extremum, ExtremalValueNode};
pub use input::InputNode;
pub use moving_average::MovingAverageNode;
pub use output::OutputNode;
pub use sink::{DebugSinkNode, SinkCallback, SinkNode};
pub use splice::{splice_input, SpliceNode};
