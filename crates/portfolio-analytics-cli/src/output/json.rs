use serde_json::Value;
use std::io::{self, Write};

/// Pretty-print JSON to stdout. A closed pipe (`pae ... | head`) is not
/// reported.
pub fn print_json(value: &Value) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let written = serde_json::to_writer_pretty(&mut out, value)
        .and_then(|_| writeln!(out).map_err(serde_json::Error::io));
    if let Err(e) = written {
        if !e.is_io() {
            eprintln!("JSON serialization error: {}", e);
        }
    }
}
