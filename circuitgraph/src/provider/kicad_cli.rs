//! `kicad-cli` backed provider for `.kicad_sch` sheets.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use super::{NetlistProvider, ProviderError};
use crate::netlist::Netlist;
use crate::parser::netlist::{KicadNetlistParser, NetlistReadOptions};
use crate::parser::power_symbols::SCHEMATIC_EXTENSION;

/// Environment variable holding an explicit `kicad-cli` path
pub const KICAD_CLI_ENV: &str = "KICAD_CLI";

#[cfg(windows)]
const EXECUTABLE: &str = "kicad-cli.exe";
#[cfg(not(windows))]
const EXECUTABLE: &str = "kicad-cli";

#[cfg(target_os = "macos")]
const INSTALL_LOCATIONS: &[&str] = &[
    "/Applications/KiCad/KiCad.app/Contents/MacOS/kicad-cli",
    "/Applications/KiCad/kicad.app/Contents/MacOS/kicad-cli",
];
#[cfg(windows)]
const INSTALL_LOCATIONS: &[&str] = &[
    r"C:\Program Files\KiCad\9.0\bin\kicad-cli.exe",
    r"C:\Program Files\KiCad\8.0\bin\kicad-cli.exe",
];
#[cfg(not(any(windows, target_os = "macos")))]
const INSTALL_LOCATIONS: &[&str] = &[
    "/usr/bin/kicad-cli",
    "/usr/local/bin/kicad-cli",
    "/snap/bin/kicad-cli",
];

/// Locate `kicad-cli`: the explicit path if it exists, then `KICAD_CLI`,
/// then `PATH`, then KiCad's usual install locations.
pub fn find_kicad_cli(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit.filter(|p| p.is_file()) {
        return Some(path.to_path_buf());
    }

    if let Some(path) = std::env::var_os(KICAD_CLI_ENV).map(PathBuf::from) {
        if path.is_file() {
            return Some(path);
        }
    }

    if let Some(paths) = std::env::var_os("PATH") {
        if let Some(found) = std::env::split_paths(&paths)
            .map(|dir| dir.join(EXECUTABLE))
            .find(|candidate| candidate.is_file())
        {
            return Some(found);
        }
    }

    INSTALL_LOCATIONS
        .iter()
        .map(PathBuf::from)
        .find(|candidate| candidate.is_file())
}

/// Exports a schematic with `kicad-cli sch export netlist` and reads the
/// resulting s-expression netlist.
#[derive(Debug, Clone, Default)]
pub struct KicadCliProvider {
    executable: Option<PathBuf>,
    options: NetlistReadOptions,
}

impl KicadCliProvider {
    pub fn new(executable: Option<PathBuf>, options: NetlistReadOptions) -> Self {
        Self { executable, options }
    }

    async fn export(&self, cli: &Path, schematic: &Path) -> Result<String, ProviderError> {
        let workdir = tempfile::tempdir()?;
        let output = workdir.path().join("netlist.net");

        info!("Exporting netlist for {}", schematic.display());
        let result = Command::new(cli)
            .args(["sch", "export", "netlist", "--format", "kicadsexpr", "--output"])
            .arg(&output)
            .arg(schematic)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !result.status.success() {
            return Err(ProviderError::ExportFailed {
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        match tokio::fs::read_to_string(&output).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ProviderError::ExportFailed {
                status: result.status.to_string(),
                stderr: format!("netlist file not created: {}", output.display()),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl NetlistProvider for KicadCliProvider {
    fn name(&self) -> &str {
        "kicad-cli"
    }

    fn supported_extensions(&self) -> &[&str] {
        &[SCHEMATIC_EXTENSION]
    }

    async fn parse(&self, schematic: &Path) -> Result<Netlist, ProviderError> {
        let cli = find_kicad_cli(self.executable.as_deref()).ok_or(ProviderError::KicadCliNotFound)?;
        debug!("Using {}", cli.display());

        let content = self.export(&cli, schematic).await?;
        Ok(KicadNetlistParser::parse_str(&content, self.options)?)
    }
}
