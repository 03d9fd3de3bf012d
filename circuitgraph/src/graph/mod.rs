//! Circuit graph model and queries

pub mod circuit;
pub mod power;
pub mod traversal;

pub use circuit::{
    BuildDiagnostic, CircuitGraph, ComponentDetails, GraphEdge, GraphNode, GraphSnapshot, GraphStats,
    NodeDetails, NodeKind, SnapshotEdge,
};
pub use power::{PowerClassifier, PowerNetSource, KICAD_POWER_SYMBOLS};
pub use traversal::{NeighborhoodMember, NeighborhoodResult, PathResult};
