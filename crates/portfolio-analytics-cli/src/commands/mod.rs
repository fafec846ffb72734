pub mod black_litterman;
pub mod optimize;
pub mod simulate;
pub mod stress;

use portfolio_analytics_core::{AnalyticsError, ErrorKind, ErrorResponse};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::input;

/// Global flags applied on top of every request.
pub struct Overrides {
    pub config: Option<String>,
    pub seed: Option<u64>,
    pub threads: Option<usize>,
}

/// Read the request from `--input` or stdin, apply `--config` and `--seed`,
/// and deserialise it.
pub fn load_request<T: DeserializeOwned>(
    path: Option<&str>,
    overrides: &Overrides,
    what: &str,
) -> Result<T, Box<dyn std::error::Error>> {
    let mut request = if let Some(path) = path {
        input::file::read_value(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        data
    } else {
        return Err(format!("--input <file.json|file.yaml> or stdin required for {what}").into());
    };
    apply_overrides(&mut request, overrides)?;
    Ok(serde_json::from_value(request)?)
}

fn apply_overrides(
    request: &mut Value,
    overrides: &Overrides,
) -> Result<(), Box<dyn std::error::Error>> {
    let Value::Object(map) = request else {
        return Err("Request must be a JSON/YAML object".into());
    };
    if let Some(path) = &overrides.config {
        let config = input::file::read_value(path)?;
        debug!(path = %path, "engine config replaced from file");
        map.insert("config".into(), config);
    }
    if let Some(seed) = overrides.seed {
        let config = map
            .entry("config")
            .or_insert_with(|| Value::Object(Default::default()));
        match config {
            Value::Object(c) => {
                c.insert("seed".into(), Value::from(seed));
            }
            _ => return Err("`config` must be an object".into()),
        }
    }
    Ok(())
}

/// Map any command failure onto the engine's error payload.
pub fn error_response(e: &(dyn std::error::Error + 'static)) -> Value {
    let response = if let Some(err) = e.downcast_ref::<AnalyticsError>() {
        ErrorResponse::from(err)
    } else if e.is::<serde_json::Error>() || e.is::<serde_yaml::Error>() {
        ErrorResponse {
            error: e.to_string(),
            kind: ErrorKind::Serialization,
        }
    } else {
        ErrorResponse {
            error: e.to_string(),
            kind: ErrorKind::Validation,
        }
    };
    serde_json::to_value(response).unwrap_or_default()
}
