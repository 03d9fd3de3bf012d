//! Power symbol harvesting from `.kicad_sch` files
//!
//! KiCad power symbols (GND, +3V3, a custom `VMOTOR`) name the net they sit on.
//! Collecting their resolved values gives the power classifier an exact,
//! per-project list of supply nets on top of the built-in table.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::parser::sexp::{parse_document, ParseError, SExp};

/// File extension of KiCad 6+ schematic sheets
pub const SCHEMATIC_EXTENSION: &str = "kicad_sch";

const MAX_WALK_DEPTH: usize = 20;

/// Resolved values of every power-symbol instance placed in one schematic.
pub fn harvest_power_values(content: &str) -> Result<BTreeSet<String>, ParseError> {
    let root = parse_document(content)?;
    let mut values = BTreeSet::new();

    // lib_id -> library default Value, for lib symbols flagged (power)
    let mut power_defaults: HashMap<&str, Option<&str>> = HashMap::new();
    if let Some(lib_symbols) = root.child("lib_symbols") {
        for symbol in lib_symbols.children("symbol") {
            let Some(lib_id) = symbol.args().first().and_then(|a| a.as_atom()) else {
                continue;
            };
            if symbol.has_flag("power") {
                power_defaults.insert(lib_id, property(symbol, "Value"));
            }
        }
    }

    let legacy_instances = legacy_instance_values(&root);

    for symbol in root.children("symbol") {
        let Some(lib_id) = symbol.value("lib_id") else {
            continue;
        };
        let library_default = match power_defaults.get(lib_id) {
            Some(default) => *default,
            None if lib_id.starts_with("power:") => None,
            None => continue,
        };

        let resolved = instance_value(symbol)
            .or_else(|| {
                symbol
                    .value("uuid")
                    .and_then(|uuid| legacy_instances.get(uuid).copied())
            })
            .or_else(|| property(symbol, "Value"))
            .or(library_default)
            .filter(|v| !v.is_empty() && *v != "~");

        if let Some(value) = resolved {
            values.insert(value.to_string());
        }
    }

    Ok(values)
}

/// `(property "KEY" "VALUE" ...)` lookup.
fn property<'a>(symbol: &'a SExp, key: &str) -> Option<&'a str> {
    symbol.children("property").into_iter().find_map(|prop| {
        let args = prop.args();
        match (args.first().and_then(|a| a.as_atom()), args.get(1).and_then(|a| a.as_atom())) {
            (Some(k), Some(v)) if k == key => Some(v),
            _ => None,
        }
    })
}

/// Value override under `(instances (project ... (path ... (value "X"))))`.
fn instance_value(symbol: &SExp) -> Option<&str> {
    let instances = symbol.child("instances")?;
    instances
        .children("project")
        .into_iter()
        .flat_map(|project| project.children("path"))
        .find_map(|path| path.value("value"))
}

/// KiCad 6 root-level `(symbol_instances (path "/<uuid>" ... (value "X")))`,
/// keyed by the symbol uuid at the end of the path.
fn legacy_instance_values(root: &SExp) -> HashMap<&str, &str> {
    let mut values = HashMap::new();
    let Some(instances) = root.child("symbol_instances") else {
        return values;
    };
    for path in instances.children("path") {
        let (Some(p), Some(value)) = (path.args().first().and_then(|a| a.as_atom()), path.value("value")) else {
            continue;
        };
        if let Some(uuid) = p.rsplit('/').next().filter(|u| !u.is_empty()) {
            values.insert(uuid, value);
        }
    }
    values
}

/// Directory holding a project's sheets. Accepts a project directory,
/// a `.kicad_pro` file or any sheet inside the project.
pub fn project_dir(project: &Path) -> PathBuf {
    if project.is_dir() {
        project.to_path_buf()
    } else {
        project
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Recursively find every `.kicad_sch` sheet under `dir`.
pub fn discover_schematics(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    walk_dir(dir, &mut files, 0)?;
    files.sort();
    Ok(files)
}

/// Only an unreadable `dir` itself is an error; unreadable entries below
/// it are logged and skipped.
fn walk_dir(dir: &Path, files: &mut Vec<PathBuf>, depth: usize) -> std::io::Result<()> {
    if depth > MAX_WALK_DEPTH {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        if path.is_dir() {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            // KiCad backups and build output
            if name.starts_with('.') || name.ends_with("-backups") || name == "target" {
                continue;
            }
            if let Err(e) = walk_dir(&path, files, depth + 1) {
                warn!("Skipping unreadable directory {}: {}", path.display(), e);
            }
        } else if path.extension().and_then(|e| e.to_str()) == Some(SCHEMATIC_EXTENSION) {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = r##"
(kicad_sch (version 20231120) (generator "eeschema")
  (lib_symbols
    (symbol "power:GND" (power) (pin_names (offset 0))
      (property "Reference" "#PWR" (at 0 0 0))
      (property "Value" "GND" (at 0 0 0)))
    (symbol "power:+3V3" (power)
      (property "Reference" "#PWR" (at 0 0 0))
      (property "Value" "+3V3" (at 0 0 0)))
    (symbol "custom:VMOTOR" (power)
      (property "Value" "VMOTOR" (at 0 0 0)))
    (symbol "Device:R"
      (property "Reference" "R" (at 0 0 0))
      (property "Value" "R" (at 0 0 0))))
  (symbol (lib_id "power:GND") (at 10 10 0) (unit 1)
    (uuid "a1")
    (property "Reference" "#PWR01" (at 0 0 0))
    (property "Value" "GND" (at 0 0 0)))
  (symbol (lib_id "power:+3V3") (at 20 10 0) (unit 1)
    (uuid "a2")
    (property "Reference" "#PWR02" (at 0 0 0))
    (property "Value" "+3V3" (at 0 0 0))
    (instances (project "demo" (path "/root" (reference "#PWR02") (unit 1) (value "+3V3_MCU")))))
  (symbol (lib_id "custom:VMOTOR") (at 30 10 0) (unit 1)
    (uuid "a3")
    (property "Reference" "#PWR03" (at 0 0 0)))
  (symbol (lib_id "Device:R") (at 40 10 0) (unit 1)
    (uuid "a4")
    (property "Reference" "R1" (at 0 0 0))
    (property "Value" "10k" (at 0 0 0))))
"##;

    #[test]
    fn test_harvest_resolves_instance_then_property_then_default() {
        let values = harvest_power_values(SHEET).unwrap();
        let values: Vec<&str> = values.iter().map(|s| s.as_str()).collect();
        // +3V3 overridden by its instance, VMOTOR falls back to the library default
        assert_eq!(values, vec!["+3V3_MCU", "GND", "VMOTOR"]);
    }

    #[test]
    fn test_harvest_ignores_non_power_symbols() {
        let values = harvest_power_values(SHEET).unwrap();
        assert!(!values.contains("10k"));
        assert!(!values.contains("R"));
    }

    #[test]
    fn test_legacy_symbol_instances() {
        let sheet = r##"
(kicad_sch (version 20211123)
  (symbol (lib_id "power:VCC") (uuid "abc")
    (property "Value" "VCC" (id 1) (at 0 0 0)))
  (symbol_instances
    (path "/abc" (reference "#PWR01") (unit 1) (value "VCC_IO") (footprint ""))))
"##;
        let values = harvest_power_values(sheet).unwrap();
        assert!(values.contains("VCC_IO"));
        assert!(!values.contains("VCC"));
    }

    #[test]
    fn test_project_dir_accepts_files_and_dirs() {
        let temp = tempfile::TempDir::new().unwrap();
        let pro = temp.path().join("demo.kicad_pro");
        std::fs::write(&pro, "{}").unwrap();

        assert_eq!(project_dir(temp.path()), temp.path());
        assert_eq!(project_dir(&pro), temp.path());
    }

    #[test]
    fn test_discover_schematics_skips_backups() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("root.kicad_sch"), "").unwrap();
        std::fs::create_dir(temp.path().join("sheets")).unwrap();
        std::fs::write(temp.path().join("sheets").join("power.kicad_sch"), "").unwrap();
        std::fs::create_dir(temp.path().join("demo-backups")).unwrap();
        std::fs::write(temp.path().join("demo-backups").join("old.kicad_sch"), "").unwrap();
        std::fs::write(temp.path().join("notes.txt"), "").unwrap();

        let found = discover_schematics(temp.path()).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| !p.to_string_lossy().contains("backups")));
    }

    #[cfg(unix)]
    #[test]
    fn test_discover_schematics_keeps_sheets_beside_unreadable_dir() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("root.kicad_sch"), "").unwrap();
        let locked = temp.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        let found = discover_schematics(temp.path());
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        let found = found.unwrap();
        assert_eq!(found, vec![temp.path().join("root.kicad_sch")]);
    }

    #[test]
    fn test_discover_schematics_missing_root_is_an_error() {
        assert!(discover_schematics(Path::new("/nonexistent/project")).is_err());
    }
}
