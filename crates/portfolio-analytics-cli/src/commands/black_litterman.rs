use clap::Args;
use serde_json::Value;

use portfolio_analytics_core::black_litterman::engine::{self, BlackLittermanInput};

use super::{load_request, Overrides};

/// Arguments for Black-Litterman allocation
#[derive(Args)]
pub struct BlackLittermanArgs {
    /// Path to JSON/YAML request file
    #[arg(long)]
    pub input: Option<String>,

    /// Amount to allocate, overriding `portfolio_value`
    #[arg(long)]
    pub portfolio_value: Option<f64>,

    /// Ignore dividend history
    #[arg(long)]
    pub no_dividends: bool,
}

pub fn run_black_litterman(
    args: BlackLittermanArgs,
    overrides: &Overrides,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut request: BlackLittermanInput =
        load_request(args.input.as_deref(), overrides, "Black-Litterman allocation")?;
    if let Some(v) = args.portfolio_value {
        request.portfolio_value = v;
    }
    if args.no_dividends {
        request.include_dividends = false;
    }
    let result = engine::run_black_litterman(&request)?;
    Ok(serde_json::to_value(result)?)
}
