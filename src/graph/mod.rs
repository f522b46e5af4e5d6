//! Core graph data structures

mod edge;
mod hemisphere;
mod node;
mod registry;


pub use edge::{Edge, EdgeId, EdgeKind};
pub use hemisphere::HemisphereGraph;
pub use node::{Layer, Node, NodeId, NodeType, SourceRef, WeightedMean, EVIDENCE_CAP};
pub use registry::{sort_by_weight_desc, EdgeSet, NodeRegistry};
