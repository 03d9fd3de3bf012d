//! KiCad netlist reader
//!
//! Reads the `kicadsexpr` netlist that `kicad-cli sch export netlist` writes
//! and turns it into a [`Netlist`]. The relevant parts of the format are:
//!
//! ```text
//! (export (version "E")
//!   (components
//!     (comp (ref "R1") (value "10k") (footprint "...") (description "...")
//!       (libsource (lib "Device") (part "R") (description "Resistor"))
//!       (sheetpath (names "/") (tstamps "/"))))
//!   (libparts
//!     (libpart (lib "Device") (part "R")
//!       (pins (pin (num "1") (name "~") (type "passive")))))
//!   (nets
//!     (net (code "1") (name "GND")
//!       (node (ref "R1") (pin "2") (pinfunction "~") (pintype "passive")))))
//! ```

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::netlist::{ComponentInfo, ElectricalType, Netlist, PinConnection};
use crate::parser::sexp::{parse_document, ParseError, SExp};

/// Substring KiCad uses to name nets attached to a single unconnected pin.
const UNCONNECTED_MARKER: &str = "unconnected";

#[derive(Debug, Error)]
pub enum NetlistParseError {
    #[error("S-expression parse error: {0}")]
    SExp(#[from] ParseError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid netlist format: {0}")]
    InvalidFormat(String),
    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Options for reading a netlist export.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetlistReadOptions {
    /// Keep `unconnected-(R1-Pad1)` style nets instead of dropping them.
    pub include_unconnected_nets: bool,
}

pub struct KicadNetlistParser;

impl KicadNetlistParser {
    pub fn parse_file(path: &Path, options: NetlistReadOptions) -> Result<Netlist, NetlistParseError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_str(&content, options)
    }

    pub fn parse_str(content: &str, options: NetlistReadOptions) -> Result<Netlist, NetlistParseError> {
        let root = parse_document(content)?;

        match root.head() {
            Some("export") => {}
            Some(other) => {
                return Err(NetlistParseError::InvalidFormat(format!(
                    "Expected export root, found {}",
                    other
                )))
            }
            None => {
                return Err(NetlistParseError::InvalidFormat(
                    "Expected export root".to_string(),
                ))
            }
        }

        let pin_types = root
            .child("libparts")
            .map(Self::libpart_pin_types)
            .unwrap_or_default();

        let mut netlist = Netlist::new();
        let mut part_of: HashMap<String, (String, String)> = HashMap::new();

        if let Some(components) = root.child("components") {
            for comp in components.children("comp") {
                let (reference, info) = Self::parse_component(comp)?;
                if let Some((lib, part)) = info.lib_id.split_once(':') {
                    part_of.insert(reference.clone(), (lib.to_string(), part.to_string()));
                }
                netlist.add_component(reference, info);
            }
        }

        if let Some(nets) = root.child("nets") {
            for net in nets.children("net") {
                let name = net
                    .value("name")
                    .ok_or_else(|| NetlistParseError::MissingField("net name".to_string()))?;

                if !options.include_unconnected_nets && name.contains(UNCONNECTED_MARKER) {
                    debug!("Skipping unconnected net {}", name);
                    continue;
                }

                netlist.add_net(name);
                for node in net.children("node") {
                    let component = node
                        .value("ref")
                        .ok_or_else(|| NetlistParseError::MissingField(format!("node ref on net {}", name)))?;
                    let pin = node
                        .value("pin")
                        .ok_or_else(|| NetlistParseError::MissingField(format!("node pin on net {}", name)))?;

                    let electrical_type = match node.value("pintype") {
                        Some(token) => ElectricalType::from_kicad(token),
                        None => part_of
                            .get(component)
                            .and_then(|(lib, part)| {
                                pin_types.get(&(lib.clone(), part.clone(), pin.to_string()))
                            })
                            .copied()
                            .unwrap_or_default(),
                    };

                    netlist.connect(
                        name,
                        PinConnection::new(component, pin).with_type(electrical_type),
                    );
                }
            }
        }

        debug!(
            "Parsed netlist: {} components, {} nets",
            netlist.components.len(),
            netlist.nets.len()
        );

        Ok(netlist)
    }

    fn parse_component(comp: &SExp) -> Result<(String, ComponentInfo), NetlistParseError> {
        let reference = comp
            .value("ref")
            .ok_or_else(|| NetlistParseError::MissingField("comp ref".to_string()))?
            .to_string();

        let libsource = comp.child("libsource");
        let lib = libsource.and_then(|l| l.value("lib")).unwrap_or("");
        let part = libsource.and_then(|l| l.value("part")).unwrap_or("");

        let description = comp
            .value("description")
            .or_else(|| libsource.and_then(|l| l.value("description")))
            .unwrap_or("")
            .to_string();

        let footprint = comp
            .value("footprint")
            .filter(|f| !f.is_empty())
            .map(str::to_string);

        let sheet_names = comp
            .children("sheetpath")
            .into_iter()
            .filter_map(|s| s.value("names"))
            .map(str::to_string)
            .collect();

        let lib_id = if lib.is_empty() && part.is_empty() {
            String::new()
        } else {
            format!("{}:{}", lib, part)
        };

        let info = ComponentInfo {
            lib_id,
            value: comp.value("value").unwrap_or("").to_string(),
            description,
            name: part.to_string(),
            footprint,
            sheet_names,
        };

        Ok((reference, info))
    }

    /// `(lib, part, pin number) -> electrical type` from the `libparts` section.
    fn libpart_pin_types(libparts: &SExp) -> HashMap<(String, String, String), ElectricalType> {
        let mut types = HashMap::new();

        for libpart in libparts.children("libpart") {
            let (Some(lib), Some(part)) = (libpart.value("lib"), libpart.value("part")) else {
                continue;
            };
            let Some(pins) = libpart.child("pins") else {
                continue;
            };
            for pin in pins.children("pin") {
                if let (Some(num), Some(kind)) = (pin.value("num"), pin.value("type")) {
                    types.insert(
                        (lib.to_string(), part.to_string(), num.to_string()),
                        ElectricalType::from_kicad(kind),
                    );
                }
            }
        }

        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
(export (version "E")
  (design (source "/tmp/demo.kicad_sch") (tool "Eeschema 8.0.4"))
  (components
    (comp (ref "C1")
      (value "100n")
      (footprint "Capacitor_SMD:C_0603_1608Metric")
      (libsource (lib "Device") (part "C") (description "Unpolarized capacitor"))
      (sheetpath (names "/") (tstamps "/")))
    (comp (ref "U1")
      (value "LM358")
      (description "Dual op amp")
      (libsource (lib "Amplifier_Operational") (part "LM358") (description "Dual Operational Amplifiers"))
      (sheetpath (names "/amp/") (tstamps "/1234/"))))
  (libparts
    (libpart (lib "Amplifier_Operational") (part "LM358")
      (pins
        (pin (num "4") (name "V-") (type "power_in"))
        (pin (num "8") (name "V+") (type "power_in")))))
  (nets
    (net (code "1") (name "GND")
      (node (ref "C1") (pin "2") (pintype "passive"))
      (node (ref "U1") (pin "4")))
    (net (code "2") (name "unconnected-(U1-Pad1)")
      (node (ref "U1") (pin "1") (pintype "output+no_connect")))
    (net (code "3") (name "+5V")
      (node (ref "U1") (pin "8") (pinfunction "V+") (pintype "power_in"))
      (node (ref "C1") (pin "1") (pintype "passive")))))
"#;

    #[test]
    fn test_parse_components() {
        let netlist = KicadNetlistParser::parse_str(SAMPLE, NetlistReadOptions::default()).unwrap();

        assert_eq!(netlist.components.len(), 2);
        let c1 = &netlist.components["C1"];
        assert_eq!(c1.lib_id, "Device:C");
        assert_eq!(c1.name, "C");
        assert_eq!(c1.value, "100n");
        assert_eq!(c1.description, "Unpolarized capacitor");
        assert_eq!(c1.footprint.as_deref(), Some("Capacitor_SMD:C_0603_1608Metric"));
        assert_eq!(c1.sheet_names, vec!["/".to_string()]);

        // component-level description wins over libsource
        assert_eq!(netlist.components["U1"].description, "Dual op amp");
        assert_eq!(netlist.components["U1"].sheet_names, vec!["/amp/".to_string()]);
    }

    #[test]
    fn test_parse_nets_keeps_order_and_types() {
        let netlist = KicadNetlistParser::parse_str(SAMPLE, NetlistReadOptions::default()).unwrap();

        let names: Vec<&str> = netlist.nets.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["GND", "+5V"]);

        let vcc = &netlist.nets["+5V"];
        assert_eq!(vcc[0].component, "U1");
        assert_eq!(vcc[0].pin, "8");
        assert_eq!(vcc[0].electrical_type, ElectricalType::PowerIn);
        assert_eq!(vcc[1].electrical_type, ElectricalType::Passive);
    }

    #[test]
    fn test_missing_pintype_falls_back_to_libparts() {
        let netlist = KicadNetlistParser::parse_str(SAMPLE, NetlistReadOptions::default()).unwrap();
        assert_eq!(netlist.pin_type("U1", "GND", "4"), Some(ElectricalType::PowerIn));
    }

    #[test]
    fn test_unconnected_nets_optional() {
        let options = NetlistReadOptions {
            include_unconnected_nets: true,
        };
        let netlist = KicadNetlistParser::parse_str(SAMPLE, options).unwrap();
        let unconnected = &netlist.nets["unconnected-(U1-Pad1)"];
        assert_eq!(unconnected.len(), 1);
        assert_eq!(unconnected[0].electrical_type, ElectricalType::Output);
    }

    #[test]
    fn test_rejects_wrong_root() {
        let result = KicadNetlistParser::parse_str("(kicad_sch (version 1))", NetlistReadOptions::default());
        assert!(matches!(result, Err(NetlistParseError::InvalidFormat(_))));
    }

    #[test]
    fn test_empty_export() {
        let netlist = KicadNetlistParser::parse_str("(export (version \"E\"))", NetlistReadOptions::default()).unwrap();
        assert!(netlist.is_empty());
    }
}
