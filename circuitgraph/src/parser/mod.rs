pub mod netlist;
pub mod power_symbols;
pub mod sexp;

// Re-export for convenience
pub use netlist::{KicadNetlistParser, NetlistParseError, NetlistReadOptions};
pub use power_symbols::{discover_schematics, harvest_power_values, project_dir};
pub use sexp::{parse_document, ParseError, SExp, SExpParser};
