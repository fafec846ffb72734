use clap::Args;
use serde_json::Value;

use portfolio_analytics_core::stress_testing::replay::{self, StressTestInput};
use portfolio_analytics_core::stress_testing::scenarios::ScenarioEvent;

use super::{load_request, Overrides};

/// Arguments for historical scenario replay
#[derive(Args)]
pub struct StressTestArgs {
    /// Path to JSON/YAML request file
    #[arg(long)]
    pub input: Option<String>,

    /// Comma-separated scenario names (e.g. "gfc2008,covid2020"); all when omitted
    #[arg(long, value_delimiter = ',')]
    pub scenarios: Option<Vec<String>>,

    /// Benchmark ticker, overriding the request's `benchmark`
    #[arg(long)]
    pub benchmark: Option<String>,
}

pub fn run_stress_test(args: StressTestArgs, overrides: &Overrides) -> Result<Value, Box<dyn std::error::Error>> {
    let mut request: StressTestInput =
        load_request(args.input.as_deref(), overrides, "stress test")?;
    if let Some(names) = args.scenarios {
        request.scenarios = names
            .iter()
            .map(|n| parse_scenario(n))
            .collect::<Result<_, _>>()?;
    }
    if args.benchmark.is_some() {
        request.benchmark = args.benchmark;
    }
    let result = replay::run_stress_test(&request)?;
    Ok(serde_json::to_value(result)?)
}

fn parse_scenario(name: &str) -> Result<ScenarioEvent, Box<dyn std::error::Error>> {
    serde_json::from_value(Value::String(name.trim().to_lowercase())).map_err(|_| {
        let known: Vec<String> = ScenarioEvent::ALL
            .iter()
            .filter_map(|e| serde_json::to_value(e).ok())
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        format!("Unknown scenario '{}'. Use one of: {}", name, known.join(", ")).into()
    })
}
