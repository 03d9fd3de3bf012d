//! Structured netlist model
//!
//! This is the shape every netlist provider hands to the graph builder:
//! a map from component reference to its attributes and a map from net
//! name to the ordered pin connections on that net.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Electrical type of a pin, as declared by the symbol library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElectricalType {
    Input,
    Output,
    Bidirectional,
    TriState,
    Passive,
    Free,
    PowerIn,
    PowerOut,
    OpenCollector,
    OpenEmitter,
    NoConnect,
    Unspecified,
}

impl ElectricalType {
    /// Power-in and power-out pins carry supply rather than signal.
    pub fn is_power(&self) -> bool {
        matches!(self, ElectricalType::PowerIn | ElectricalType::PowerOut)
    }

    /// Map a KiCad `pintype`/`type` token. Compound tokens such as
    /// `passive+no_connect` are classified by their first part.
    pub fn from_kicad(token: &str) -> Self {
        let primary = token.split('+').next().unwrap_or("").trim();
        match primary.to_ascii_lowercase().as_str() {
            "input" => ElectricalType::Input,
            "output" => ElectricalType::Output,
            "bidirectional" => ElectricalType::Bidirectional,
            "tri_state" | "3state" => ElectricalType::TriState,
            "passive" => ElectricalType::Passive,
            "free" => ElectricalType::Free,
            "power_in" => ElectricalType::PowerIn,
            "power_out" => ElectricalType::PowerOut,
            "open_collector" => ElectricalType::OpenCollector,
            "open_emitter" => ElectricalType::OpenEmitter,
            "no_connect" => ElectricalType::NoConnect,
            _ => ElectricalType::Unspecified,
        }
    }
}

impl Default for ElectricalType {
    fn default() -> Self {
        ElectricalType::Unspecified
    }
}

impl FromStr for ElectricalType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_kicad(s))
    }
}

impl fmt::Display for ElectricalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElectricalType::Input => write!(f, "Input"),
            ElectricalType::Output => write!(f, "Output"),
            ElectricalType::Bidirectional => write!(f, "Bidirectional"),
            ElectricalType::TriState => write!(f, "Tri-State"),
            ElectricalType::Passive => write!(f, "Passive"),
            ElectricalType::Free => write!(f, "Free"),
            ElectricalType::PowerIn => write!(f, "Power Input"),
            ElectricalType::PowerOut => write!(f, "Power Output"),
            ElectricalType::OpenCollector => write!(f, "Open Collector"),
            ElectricalType::OpenEmitter => write!(f, "Open Emitter"),
            ElectricalType::NoConnect => write!(f, "No Connect"),
            ElectricalType::Unspecified => write!(f, "Unspecified"),
        }
    }
}

/// Attributes of a component, keyed externally by its reference (R1, U3).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentInfo {
    /// `<library>:<part>`, e.g. `Device:R`
    #[serde(default)]
    pub lib_id: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub description: String,
    /// Library part name
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footprint: Option<String>,
    /// Sheet path(s) the component is placed on, e.g. `/` or `/power/`
    #[serde(default)]
    pub sheet_names: Vec<String>,
}

impl ComponentInfo {
    pub fn new(lib_id: impl Into<String>) -> Self {
        let lib_id = lib_id.into();
        let name = lib_id
            .split_once(':')
            .map(|(_, part)| part.to_string())
            .unwrap_or_else(|| lib_id.clone());
        Self {
            lib_id,
            name,
            ..Default::default()
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_footprint(mut self, footprint: impl Into<String>) -> Self {
        self.footprint = Some(footprint.into());
        self
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet_names.push(sheet.into());
        self
    }
}

/// One component pin attached to a net.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PinConnection {
    pub component: String,
    /// Pin designator; not necessarily numeric (`A1`, `EP`, `SH`)
    pub pin: String,
    #[serde(default)]
    pub electrical_type: ElectricalType,
}

impl PinConnection {
    pub fn new(component: impl Into<String>, pin: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            pin: pin.into(),
            electrical_type: ElectricalType::Unspecified,
        }
    }

    pub fn with_type(mut self, electrical_type: ElectricalType) -> Self {
        self.electrical_type = electrical_type;
        self
    }
}

/// Components and nets of one schematic, in source order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Netlist {
    #[serde(default)]
    pub components: IndexMap<String, ComponentInfo>,
    #[serde(default)]
    pub nets: IndexMap<String, Vec<PinConnection>>,
}

impl Netlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_component(&mut self, reference: impl Into<String>, info: ComponentInfo) {
        self.components.insert(reference.into(), info);
    }

    /// Declare a net without connections. Existing connections are kept.
    pub fn add_net(&mut self, name: impl Into<String>) {
        self.nets.entry(name.into()).or_default();
    }

    /// Append a pin connection to a net, declaring the net if needed.
    pub fn connect(&mut self, net: impl Into<String>, connection: PinConnection) {
        self.nets.entry(net.into()).or_default().push(connection);
    }

    pub fn component(&self, reference: &str) -> Option<&ComponentInfo> {
        self.components.get(reference)
    }

    pub fn connections(&self, net: &str) -> &[PinConnection] {
        self.nets.get(net).map(|c| c.as_slice()).unwrap_or(&[])
    }

    /// Electrical type of `component.pin` on `net`, from the source connections.
    pub fn pin_type(&self, component: &str, net: &str, pin: &str) -> Option<ElectricalType> {
        self.connections(net)
            .iter()
            .find(|c| c.component == component && c.pin == pin)
            .map(|c| c.electrical_type)
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty() && self.nets.is_empty()
    }
}
