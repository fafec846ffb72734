use clap::{Args, ValueEnum};
use serde_json::Value;
use tracing::info;

use portfolio_analytics_core::optimization::analysis::{
    self, FrontierInput, OptimizationInput, PortfolioAnalysisInput,
};
use portfolio_analytics_core::optimization::optimizer::Objective;

use super::{load_request, Overrides};

/// Arguments for a full portfolio analysis
#[derive(Args)]
pub struct AnalyzeArgs {
    /// Path to JSON/YAML request file
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for single-objective optimization
#[derive(Args)]
pub struct OptimizeArgs {
    /// Path to JSON/YAML request file
    #[arg(long)]
    pub input: Option<String>,

    /// Objective, overriding the request's `objective`
    #[arg(long)]
    pub objective: Option<ObjectiveArg>,
}

/// Arguments for efficient frontier sampling
#[derive(Args)]
pub struct FrontierArgs {
    /// Path to JSON/YAML request file
    #[arg(long)]
    pub input: Option<String>,

    /// Number of random portfolios, overriding `config.frontier_samples`
    #[arg(long)]
    pub samples: Option<usize>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ObjectiveArg {
    MaxSharpe,
    MinVol,
}

impl From<ObjectiveArg> for Objective {
    fn from(a: ObjectiveArg) -> Self {
        match a {
            ObjectiveArg::MaxSharpe => Objective::MaxSharpe,
            ObjectiveArg::MinVol => Objective::MinVolatility,
        }
    }
}

pub fn run_analyze(args: AnalyzeArgs, overrides: &Overrides) -> Result<Value, Box<dyn std::error::Error>> {
    let request: PortfolioAnalysisInput =
        load_request(args.input.as_deref(), overrides, "portfolio analysis")?;
    info!(holdings = request.portfolio.stocks.len(), "running portfolio analysis");
    let result = analysis::analyze_portfolio(&request)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_optimize(args: OptimizeArgs, overrides: &Overrides) -> Result<Value, Box<dyn std::error::Error>> {
    let mut request: OptimizationInput =
        load_request(args.input.as_deref(), overrides, "optimization")?;
    if let Some(objective) = args.objective {
        request.objective = objective.into();
    }
    let result = analysis::optimize_portfolio(&request)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_frontier(args: FrontierArgs, overrides: &Overrides) -> Result<Value, Box<dyn std::error::Error>> {
    let mut request: FrontierInput =
        load_request(args.input.as_deref(), overrides, "efficient frontier")?;
    if let Some(samples) = args.samples {
        request.config.frontier_samples = samples;
    }
    let result = analysis::efficient_frontier(&request)?;
    Ok(serde_json::to_value(result)?)
}
