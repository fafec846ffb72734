pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::{Map, Value};

/// Envelope fields that sit next to the flattened result payload.
pub const ENVELOPE_KEYS: [&str; 4] = ["methodology", "assumptions", "warnings", "metadata"];

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// The result fields of an output envelope, without the envelope itself.
pub fn payload(map: &Map<String, Value>) -> impl Iterator<Item = (&String, &Value)> {
    map.iter().filter(|(k, _)| !ENVELOPE_KEYS.contains(&k.as_str()))
}
