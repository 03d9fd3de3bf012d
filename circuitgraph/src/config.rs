//! Graph service settings

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parser::netlist::NetlistReadOptions;
use crate::provider::kicad_cli::KICAD_CLI_ENV;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid settings file: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    /// Explicit `kicad-cli` location; searched for when unset
    pub kicad_cli: Option<PathBuf>,
    /// Path bound in components when a query does not give one
    pub default_max_depth: usize,
    /// Neighborhood radius in components when a query does not give one
    pub default_radius: usize,
    /// Keep KiCad's `unconnected-*` single-pin nets
    pub include_unconnected_nets: bool,
    /// Harvest power-symbol values from the project's sheets
    pub harvest_power_symbols: bool,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            kicad_cli: None,
            default_max_depth: 10,
            default_radius: 2,
            include_unconnected_nets: false,
            harvest_power_symbols: true,
        }
    }
}

impl GraphSettings {
    /// Defaults with `KICAD_CLI` applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(cli) = std::env::var_os(KICAD_CLI_ENV).filter(|v| !v.is_empty()) {
            self.kicad_cli = Some(PathBuf::from(cli));
        }
        self
    }

    pub fn read_options(&self) -> NetlistReadOptions {
        NetlistReadOptions {
            include_unconnected_nets: self.include_unconnected_nets,
        }
    }
}
