//! CircuitGraph - structural queries over KiCad netlists
//!
//! This library turns a schematic's netlist into a bipartite graph of
//! components and nets and answers two questions about it: the shortest
//! connection between two components, and the functional block around a
//! component. Both can hide power and ground wiring so the answer reflects
//! signal topology.
//!
//! # Quick Start
//!
//! ```no_run
//! use circuitgraph::{GraphService, GraphSettings};
//! use std::path::Path;
//!
//! # async fn run() -> Result<(), circuitgraph::GraphError> {
//! let service = GraphService::new(GraphSettings::from_env());
//! let project = Path::new("demo");
//! let schematic = Path::new("demo/demo.kicad_sch");
//!
//! let path = service.find_path(project, schematic, "R1", "U1", true, None).await?;
//! if let Some(nodes) = path.path {
//!     println!("{} ({} components)", nodes.join(" -> "), path.path_length);
//! }
//!
//! let block = service.get_neighborhood(project, schematic, "U1", false, Some(2)).await?;
//! println!("{:?}", block.member_ids());
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Graph construction**: one node per component and net, pin lists per edge
//! - **Power abstraction**: stock KiCad power symbols, project power symbols, name heuristics
//! - **Caching**: graphs are reused until the schematic's content hash changes
//! - **Providers**: `kicad-cli` export for `.kicad_sch`, direct reading of `.net`

pub mod cache;
pub mod config;
pub mod core;
pub mod graph;
pub mod netlist;
pub mod parser;
pub mod provider;

// Re-export main types
pub use cache::{CacheEntryInfo, CacheKey, CachedGraph, GraphCache};
pub use config::{ConfigError, GraphSettings};
pub use core::{GraphError, GraphService, NetlistSummary};
pub use graph::{
    CircuitGraph, GraphSnapshot, GraphStats, NeighborhoodResult, NodeKind, PathResult, PowerClassifier,
};
pub use netlist::{ComponentInfo, ElectricalType, Netlist, PinConnection};
pub use parser::netlist::{KicadNetlistParser, NetlistReadOptions};
pub use provider::{
    KicadCliProvider, NetlistFileProvider, NetlistProvider, NoPowerSymbols, PowerSymbolSource,
    ProviderError, ProviderRegistry, SchematicPowerSymbols,
};

/// Build a graph straight from a pre-exported `.net` file (convenience wrapper).
pub fn graph_from_netlist_file(path: &std::path::Path) -> Result<CircuitGraph, GraphError> {
    let netlist = KicadNetlistParser::parse_file(path, NetlistReadOptions::default())
        .map_err(|e| GraphError::Provider(ProviderError::Parse(e)))?;
    CircuitGraph::build(netlist)
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        CircuitGraph, GraphError, GraphService, GraphSettings, NeighborhoodResult, Netlist, PathResult,
        PowerClassifier,
    };
}
