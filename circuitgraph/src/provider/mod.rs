//! Netlist Providers
//!
//! A provider turns a schematic identifier into a [`Netlist`]. Each provider
//! implements [`NetlistProvider`] and declares the file extensions it handles;
//! the [`ProviderRegistry`] dispatches on extension.
//!
//! Supported inputs:
//! - KiCad sheets (.kicad_sch), exported through `kicad-cli`
//! - Pre-exported KiCad netlists (.net)
//!
//! Power-symbol harvesting sits behind [`PowerSymbolSource`] so the graph can
//! fall back to name heuristics when no schematic sources are available.

pub mod kicad_cli;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::netlist::Netlist;
use crate::parser::netlist::{KicadNetlistParser, NetlistParseError, NetlistReadOptions};
use crate::parser::power_symbols::{discover_schematics, harvest_power_values, project_dir};

pub use kicad_cli::{find_kicad_cli, KicadCliProvider};

/// Errors that can occur while acquiring a netlist
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Netlist parse error: {0}")]
    Parse(#[from] NetlistParseError),

    #[error("kicad-cli not found. Install KiCad 8+ or set KICAD_CLI")]
    KicadCliNotFound,

    #[error("Netlist export failed ({status}): {stderr}")]
    ExportFailed { status: String, stderr: String },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Source of structured netlists
#[async_trait]
pub trait NetlistProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// File extensions this provider can handle
    fn supported_extensions(&self) -> &[&str];

    fn can_handle(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.supported_extensions()
                    .iter()
                    .any(|&supported| supported.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    async fn parse(&self, schematic: &Path) -> Result<Netlist, ProviderError>;

    /// Parse `contents`, the bytes just read from `schematic`. Providers
    /// that hand the file to an external tool fall back to [`Self::parse`].
    async fn parse_contents(&self, schematic: &Path, _contents: &[u8]) -> Result<Netlist, ProviderError> {
        self.parse(schematic).await
    }
}

/// Source of the power-symbol values placed in a project.
///
/// Never fails: anything that cannot be read contributes nothing.
#[async_trait]
pub trait PowerSymbolSource: Send + Sync {
    async fn load_power_symbol_values(&self, project: &Path) -> HashSet<String>;
}

/// Reads pre-exported KiCad `.net` files.
#[derive(Debug, Clone, Default)]
pub struct NetlistFileProvider {
    options: NetlistReadOptions,
}

impl NetlistFileProvider {
    pub fn new(options: NetlistReadOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl NetlistProvider for NetlistFileProvider {
    fn name(&self) -> &str {
        "netlist-file"
    }

    fn supported_extensions(&self) -> &[&str] {
        &["net"]
    }

    async fn parse(&self, schematic: &Path) -> Result<Netlist, ProviderError> {
        let content = tokio::fs::read(schematic).await?;
        self.parse_contents(schematic, &content).await
    }

    async fn parse_contents(&self, _schematic: &Path, contents: &[u8]) -> Result<Netlist, ProviderError> {
        let content = std::str::from_utf8(contents)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(KicadNetlistParser::parse_str(content, self.options)?)
    }
}

/// Registry of available providers
pub struct ProviderRegistry {
    providers: Vec<Box<dyn NetlistProvider>>,
}

impl ProviderRegistry {
    /// Empty registry
    pub fn empty() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Registry with the `.net` reader and the `kicad-cli` exporter
    pub fn with_defaults(options: NetlistReadOptions, kicad_cli: Option<PathBuf>) -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(NetlistFileProvider::new(options)));
        registry.register(Box::new(KicadCliProvider::new(kicad_cli, options)));
        registry
    }

    pub fn register(&mut self, provider: Box<dyn NetlistProvider>) {
        self.providers.push(provider);
    }

    pub fn find_provider(&self, path: &Path) -> Option<&dyn NetlistProvider> {
        self.providers
            .iter()
            .find(|p| p.can_handle(path))
            .map(|p| p.as_ref())
    }

    fn provider_for(&self, schematic: &Path) -> Result<&dyn NetlistProvider, ProviderError> {
        let provider = self.find_provider(schematic).ok_or_else(|| {
            let ext = schematic
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("unknown");
            ProviderError::UnsupportedFormat(format!("No provider for .{} files", ext))
        })?;
        debug!("Parsing {} with {}", schematic.display(), provider.name());
        Ok(provider)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_defaults(NetlistReadOptions::default(), None)
    }
}

#[async_trait]
impl NetlistProvider for ProviderRegistry {
    fn name(&self) -> &str {
        "registry"
    }

    fn supported_extensions(&self) -> &[&str] {
        &[]
    }

    fn can_handle(&self, path: &Path) -> bool {
        self.find_provider(path).is_some()
    }

    async fn parse(&self, schematic: &Path) -> Result<Netlist, ProviderError> {
        self.provider_for(schematic)?.parse(schematic).await
    }

    async fn parse_contents(&self, schematic: &Path, contents: &[u8]) -> Result<Netlist, ProviderError> {
        self.provider_for(schematic)?.parse_contents(schematic, contents).await
    }
}

/// Harvests power symbols from every `.kicad_sch` sheet of a project.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchematicPowerSymbols;

#[async_trait]
impl PowerSymbolSource for SchematicPowerSymbols {
    async fn load_power_symbol_values(&self, project: &Path) -> HashSet<String> {
        let dir = project_dir(project);
        let listing = {
            let dir = dir.clone();
            tokio::task::spawn_blocking(move || discover_schematics(&dir)).await
        };
        let sheets = match listing {
            Ok(Ok(sheets)) => sheets,
            Ok(Err(e)) => {
                warn!("Cannot list schematics in {}: {}", dir.display(), e);
                return HashSet::new();
            }
            Err(e) => {
                warn!("Schematic discovery task failed: {}", e);
                return HashSet::new();
            }
        };

        let mut values = HashSet::new();
        for sheet in sheets {
            let content = match tokio::fs::read_to_string(&sheet).await {
                Ok(content) => content,
                Err(e) => {
                    warn!("Skipping unreadable sheet {}: {}", sheet.display(), e);
                    continue;
                }
            };
            match harvest_power_values(&content) {
                Ok(found) => values.extend(found),
                Err(e) => warn!("Skipping unparsable sheet {}: {}", sheet.display(), e),
            }
        }

        debug!("Harvested {} power symbol values from {}", values.len(), dir.display());
        values
    }
}

/// Power-symbol source for setups without schematic sheets.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPowerSymbols;

#[async_trait]
impl PowerSymbolSource for NoPowerSymbols {
    async fn load_power_symbol_values(&self, _project: &Path) -> HashSet<String> {
        HashSet::new()
    }
}
