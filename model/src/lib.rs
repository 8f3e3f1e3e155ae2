// emodel — computation-graph IR for embedded model compilation
//
// Library root. Leaves first: identities and ports, then nodes and the
// owning Model, then the transform/submodel machinery, then the Map facade
// and its archive format.

pub mod archive;
pub mod config;
pub mod dot;
pub mod error;
pub mod id;
pub mod lifecycle;
pub mod map;
pub mod model;
pub mod node;
pub mod nodes;
pub mod optimizer;
pub mod port;
pub mod port_elements;
pub mod submodel;
pub mod transform;

pub use error::{ModelError, Result};
pub use id::{InputPortRef, NodeId, OutputPortRef};
pub use map::{DynamicMap, Map, TypedMap};
pub use model::Model;
pub use node::{Node, NodeBase, NodeRole};
pub use port::{Numeric, PortBuffer, PortType, PortValue};
pub use port_elements::{PortElements, PortRange};
pub use submodel::Submodel;
pub use transform::{CompilerBackend, ModelTransformer, NodeAction, TransformContext};
