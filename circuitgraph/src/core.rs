//! Query surface over cached circuit graphs.
//! No transport or front-end dependencies.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::{CachedGraph, GraphCache};
use crate::config::GraphSettings;
use crate::graph::{GraphSnapshot, NeighborhoodResult, PathResult};
use crate::provider::{
    NoPowerSymbols, PowerSymbolSource, ProviderError, ProviderRegistry, SchematicPowerSymbols,
};

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Schematic not found: {}", .0.display())]
    SchematicNotFound(PathBuf),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("'{0}' is used both as a component reference and as a net name")]
    NameCollision(String),
    #[error("No components or nets found in {}", .0.display())]
    EmptyNetlist(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Component and net totals of one schematic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetlistSummary {
    pub total_components: usize,
    pub total_nets: usize,
    pub component_references: Vec<String>,
}

pub struct GraphService {
    settings: GraphSettings,
    cache: GraphCache,
}

impl GraphService {
    /// Service backed by the default providers configured from `settings`.
    pub fn new(settings: GraphSettings) -> Self {
        let registry = ProviderRegistry::with_defaults(settings.read_options(), settings.kicad_cli.clone());
        let power_symbols: Arc<dyn PowerSymbolSource> = if settings.harvest_power_symbols {
            Arc::new(SchematicPowerSymbols)
        } else {
            Arc::new(NoPowerSymbols)
        };
        let cache = GraphCache::new(Arc::new(registry), power_symbols);
        Self::with_cache(settings, cache)
    }

    pub fn with_cache(settings: GraphSettings, cache: GraphCache) -> Self {
        Self { settings, cache }
    }

    pub fn settings(&self) -> &GraphSettings {
        &self.settings
    }

    pub fn cache(&self) -> &GraphCache {
        &self.cache
    }

    pub async fn build_or_get_graph(&self, project: &Path, schematic: &Path) -> Result<CachedGraph, GraphError> {
        if !schematic.exists() {
            return Err(GraphError::SchematicNotFound(schematic.to_path_buf()));
        }
        self.cache.get(project, schematic).await
    }

    pub async fn find_path(
        &self,
        project: &Path,
        schematic: &Path,
        start: &str,
        end: &str,
        ignore_power: bool,
        max_depth: Option<usize>,
    ) -> Result<PathResult, GraphError> {
        let start = required("start component", start)?;
        let end = required("end component", end)?;
        let max_depth = max_depth.unwrap_or(self.settings.default_max_depth);

        let cached = self.build_or_get_graph(project, schematic).await?;
        debug!("find_path {} -> {} (ignore_power={}, max_depth={})", start, end, ignore_power, max_depth);
        Ok(cached.graph.find_path(start, end, ignore_power, max_depth))
    }

    pub async fn get_neighborhood(
        &self,
        project: &Path,
        schematic: &Path,
        component: &str,
        ignore_power: bool,
        radius: Option<usize>,
    ) -> Result<NeighborhoodResult, GraphError> {
        let component = required("component", component)?;
        let radius = radius.unwrap_or(self.settings.default_radius);

        let cached = self.build_or_get_graph(project, schematic).await?;
        debug!("get_neighborhood {} (ignore_power={}, radius={})", component, ignore_power, radius);
        Ok(cached.graph.get_neighborhood(component, ignore_power, radius))
    }

    pub async fn graph_snapshot(&self, project: &Path, schematic: &Path) -> Result<GraphSnapshot, GraphError> {
        let cached = self.build_or_get_graph(project, schematic).await?;
        if cached.graph.component_count() == 0 && cached.graph.net_count() == 0 {
            return Err(GraphError::EmptyNetlist(schematic.to_path_buf()));
        }
        Ok(cached.graph.snapshot())
    }

    pub async fn netlist_summary(&self, project: &Path, schematic: &Path) -> Result<NetlistSummary, GraphError> {
        let cached = self.build_or_get_graph(project, schematic).await?;
        Ok(NetlistSummary {
            total_components: cached.netlist.components.len(),
            total_nets: cached.netlist.nets.len(),
            component_references: cached.netlist.components.keys().cloned().collect(),
        })
    }
}

/// Trimmed, non-empty reference or `InvalidInput`.
fn required<'a>(what: &str, value: &'a str) -> Result<&'a str, GraphError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(GraphError::InvalidInput(format!("{} must not be empty", what)));
    }
    Ok(trimmed)
}
