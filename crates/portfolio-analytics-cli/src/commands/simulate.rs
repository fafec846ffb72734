use clap::Args;
use serde_json::Value;
use tracing::info;

use portfolio_analytics_core::simulation::heston::{self, HestonInput};
use portfolio_analytics_core::simulation::monte_carlo::{self, MonteCarloInput};
use portfolio_analytics_core::simulation::runtime::{Budget, SimulationPool};

use super::{load_request, Overrides};

/// Arguments for Monte Carlo simulation
#[derive(Args)]
pub struct MonteCarloArgs {
    /// Path to JSON/YAML request file
    #[arg(long)]
    pub input: Option<String>,

    /// Number of simulated paths, overriding `n_simulations`
    #[arg(long)]
    pub simulations: Option<usize>,

    /// Horizon in trading days, overriding `n_days`
    #[arg(long)]
    pub days: Option<usize>,
}

/// Arguments for Heston simulation
#[derive(Args)]
pub struct HestonArgs {
    /// Path to JSON/YAML request file
    #[arg(long)]
    pub input: Option<String>,

    /// Number of simulated paths, overriding `n_paths`
    #[arg(long)]
    pub paths: Option<usize>,

    /// Horizon in trading days, overriding `n_days`
    #[arg(long)]
    pub days: Option<usize>,

    /// Include sample paths in the output
    #[arg(long)]
    pub include_paths: bool,
}

pub fn run_monte_carlo(args: MonteCarloArgs, overrides: &Overrides) -> Result<Value, Box<dyn std::error::Error>> {
    let mut request: MonteCarloInput =
        load_request(args.input.as_deref(), overrides, "Monte Carlo simulation")?;
    if let Some(n) = args.simulations {
        request.n_simulations = n;
    }
    if let Some(n) = args.days {
        request.n_days = n;
    }

    let pool = SimulationPool::new(overrides.threads)?;
    info!(threads = pool.threads(), paths = request.n_simulations, "submitting Monte Carlo");
    let budget = Budget::with_timeout_ms(request.config.max_duration_ms);
    let result = pool
        .submit(budget, move |b| monte_carlo::run_monte_carlo_with_budget(&request, b))
        .wait()?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_heston(args: HestonArgs, overrides: &Overrides) -> Result<Value, Box<dyn std::error::Error>> {
    let mut request: HestonInput = load_request(args.input.as_deref(), overrides, "Heston simulation")?;
    if let Some(n) = args.paths {
        request.n_paths = n;
    }
    if let Some(n) = args.days {
        request.n_days = n;
    }
    if args.include_paths {
        request.include_paths = true;
    }

    let pool = SimulationPool::new(overrides.threads)?;
    info!(threads = pool.threads(), paths = request.n_paths, "submitting Heston");
    let budget = Budget::with_timeout_ms(request.config.max_duration_ms);
    let result = pool
        .submit(budget, move |b| heston::run_heston_with_budget(&request, b))
        .wait()?;
    Ok(serde_json::to_value(result)?)
}
