//! Power Net Classification
//!
//! Decides whether a net is a supply/ground rail so traversals can abstract
//! power wiring away. Three sources are consulted in order:
//! 1. the stock KiCad power-symbol names (exact, case-sensitive)
//! 2. power-symbol values harvested from the project's own sheets (exact)
//! 3. naming-convention substrings (case-insensitive)

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::netlist::ElectricalType;

/// Values of the power symbols shipped in KiCad's `power` library.
pub const KICAD_POWER_SYMBOLS: &[&str] = &[
    "+10V", "+12C", "+12L", "+12LF", "+12P", "+12V", "+12VA", "+15V",
    "+1V0", "+1V1", "+1V2", "+1V35", "+1V5", "+1V8", "+24V", "+28V",
    "+2V5", "+2V8", "+3.3V", "+3.3VA", "+3.3VADC", "+3.3VDAC", "+3.3VP",
    "+36V", "+3V0", "+3V3", "+3V8", "+48V", "+4V", "+5C", "+5F", "+5P",
    "+5V", "+5VA", "+5VD", "+5VL", "+5VP", "+6V", "+7.5V", "+8V", "+9V",
    "+9VA", "+BATT", "+VDC", "+VSW", "-10V", "-12V", "-12VA", "-15V",
    "-24V", "-2V5", "-36V", "-3V3", "-48V", "-5V", "-5VA", "-6V", "-8V",
    "-9V", "-9VA", "-BATT", "-VDC", "-VSW", "AC", "Earth", "Earth_Clean",
    "Earth_Protective", "GND", "GND1", "GND2", "GND3", "GNDA", "GNDD",
    "GNDPWR", "GNDREF", "GNDS", "HT", "LINE", "NEUT", "PRI_HI", "PRI_LO",
    "PRI_MID", "PWR_FLAG", "VAA", "VAC", "VBUS", "VCC", "VCCQ", "VCOM",
    "VD", "VDC", "VDD", "VDDA", "VDDF", "Vdrive", "VEE", "VMEM", "VPP",
    "VS", "VSS", "VSSA",
];

/// Upper-case substrings of common supply/ground net names.
const POWER_NAME_PATTERNS: &[&str] = &[
    "VCC", "VDD", "GND", "+3V3", "+5V", "+12V", "+24V", "+48V",
    "-5V", "-12V", "-24V", "VBUS", "VBAT", "VIN", "VOUT", "PWR", "POWER",
    "VEE", "VSS", "VDDA", "VSSA", "GNDA", "GNDD", "GNDPWR",
];

/// Which rule identified a power net.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerNetSource {
    /// Exact match against the stock KiCad power symbols
    StockSymbol,
    /// Exact match against a power symbol placed in this project
    ProjectSymbol,
    /// Name contains a supply/ground keyword
    Keyword,
}

#[derive(Debug, Clone, Default)]
pub struct PowerClassifier {
    project_symbols: HashSet<String>,
}

impl PowerClassifier {
    /// Classifier using only the stock table and keyword fallback.
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifier that also knows the power-symbol values placed in a project.
    pub fn with_project_symbols<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            project_symbols: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn project_symbols(&self) -> &HashSet<String> {
        &self.project_symbols
    }

    pub fn classify(&self, net_name: &str) -> Option<PowerNetSource> {
        if KICAD_POWER_SYMBOLS.contains(&net_name) {
            return Some(PowerNetSource::StockSymbol);
        }
        if self.project_symbols.contains(net_name) {
            return Some(PowerNetSource::ProjectSymbol);
        }

        let upper = net_name.to_uppercase();
        if POWER_NAME_PATTERNS.iter().any(|p| upper.contains(p)) {
            return Some(PowerNetSource::Keyword);
        }

        None
    }

    pub fn is_power_net(&self, net_name: &str) -> bool {
        self.classify(net_name).is_some()
    }

    /// A pin carries power when it is typed power-in or power-out.
    pub fn is_power_pin(electrical_type: ElectricalType) -> bool {
        electrical_type.is_power()
    }
}
