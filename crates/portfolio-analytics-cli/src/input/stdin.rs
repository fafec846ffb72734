use serde_json::Value;
use std::io::{self, Read};

/// Attempt to read a request from stdin if data is being piped.
/// Returns None if stdin is a TTY (interactive) or empty.
///
/// JSON is tried first; anything that does not start like JSON is read as
/// YAML.
pub fn read_stdin() -> Result<Option<Value>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;

    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let value: Value = if trimmed.starts_with('{') || trimmed.starts_with('[') {
        serde_json::from_str(trimmed)?
    } else {
        serde_yaml::from_str(trimmed)?
    };
    Ok(Some(value))
}
