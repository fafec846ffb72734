use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{info, warn};

use crate::analytics::metrics::{compute_portfolio_metrics, PortfolioMetrics};
use crate::analytics::returns::{ReturnKind, ReturnsMatrix};
use crate::analytics::statistics::ReturnStatistics;
use crate::config::{EngineConfig, WeightBounds};
use crate::error::AnalyticsError;
use crate::market_data::MarketData;
use crate::optimization::frontier::{sample_frontier, EfficientFrontierPoint, FrontierSample};
use crate::optimization::optimizer::{
    ConstrainedOptimizer, Objective, OptimizationProblem, OptimizedWeights,
};
use crate::random::rng_from_seed;
use crate::types::{
    validate_weights, weight_map, with_metadata, Benchmark, ComputationOutput, Holding,
    PortfolioDefinition, Sector, WeightMap,
};
use crate::AnalyticsResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Full analysis of a user portfolio against optimized alternatives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioAnalysisInput {
    pub portfolio: PortfolioDefinition,
    pub market_data: MarketData,
    #[serde(default, alias = "start_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, alias = "end_date")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub config: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioAnalysis {
    pub current_portfolio: PortfolioMetrics,
    pub max_sharpe_portfolio: PortfolioMetrics,
    pub min_volatility_portfolio: PortfolioMetrics,
    /// Keyed by benchmark ticker.
    pub benchmark_results: BTreeMap<String, PortfolioMetrics>,
    pub efficient_frontier_data: Vec<EfficientFrontierPoint>,
    pub dominant_sector: Option<Sector>,
    pub benchmark_tickers: Vec<String>,
    pub bounds_used: WeightBounds,
    pub data_period: String,
}

/// Stand-alone optimization of a ticker universe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationInput {
    pub tickers: Vec<String>,
    #[serde(alias = "marketData")]
    pub market_data: MarketData,
    #[serde(default = "default_objective")]
    pub objective: Objective,
    #[serde(default, alias = "startDate")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, alias = "endDate")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub config: EngineConfig,
}

fn default_objective() -> Objective {
    Objective::MaxSharpe
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationOutput {
    pub weights: WeightMap,
    pub metrics: PortfolioMetrics,
    pub objective: Objective,
    pub iterations: usize,
    pub converged: bool,
    pub bounds_used: WeightBounds,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierInput {
    pub tickers: Vec<String>,
    #[serde(alias = "marketData")]
    pub market_data: MarketData,
    #[serde(default, alias = "startDate")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, alias = "endDate")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub config: EngineConfig,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Metrics of the current weights, the max-Sharpe and min-volatility
/// portfolios, benchmark metrics and a sampled frontier.
pub fn analyze_portfolio(
    input: &PortfolioAnalysisInput,
) -> AnalyticsResult<ComputationOutput<PortfolioAnalysis>> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    let mut config = input.config.clone();
    if let Some(rf) = input.portfolio.risk_free_rate {
        config.risk_free_rate = rf;
    }
    config.validate()?;
    input.portfolio.validate(config.weight_sum_tolerance)?;

    let tickers = input.portfolio.tickers();
    let returns = input
        .market_data
        .align(&tickers, input.start_date, input.end_date)?
        .returns(ReturnKind::Simple)?;
    let weights = input.portfolio.weights();
    let current_portfolio = compute_portfolio_metrics(&returns, &weights, &config)?;

    let stats = ReturnStatistics::from_returns(&returns, config.periods_per_year());
    let bounds = resolve_bounds(&config, tickers.len(), &mut warnings)?;
    let mut rng = rng_from_seed(config.seed);
    let optimizer = ConstrainedOptimizer::new(config.optimizer.clone());

    let max_sharpe = run_objective(&optimizer, &stats, &config, bounds, Objective::MaxSharpe, &mut rng)?;
    let min_vol = run_objective(&optimizer, &stats, &config, bounds, Objective::MinVolatility, &mut rng)?;
    for r in [&max_sharpe, &min_vol] {
        note_repairs(r, &mut warnings);
    }
    let max_sharpe_portfolio = compute_portfolio_metrics(&returns, &max_sharpe.weights, &config)?;
    let min_volatility_portfolio = compute_portfolio_metrics(&returns, &min_vol.weights, &config)?;

    let dominant = dominant_sector(&input.portfolio.stocks);
    if dominant.is_none() {
        warnings.push("No holding carries a sector; comparing against the market benchmark only".into());
    }
    let benchmarks = benchmarks_for(dominant);
    let mut benchmark_results = BTreeMap::new();
    for b in &benchmarks {
        let ticker = b.ticker();
        if !input.market_data.contains(ticker) {
            warnings.push(format!("Benchmark {ticker} has no price data; skipped"));
            continue;
        }
        match benchmark_metrics(input, ticker, &config) {
            Ok(metrics) => {
                benchmark_results.insert(ticker.to_string(), metrics);
            }
            Err(e) => {
                warn!(%ticker, error = %e, "benchmark skipped");
                warnings.push(format!("Benchmark {ticker} skipped: {e}"));
            }
        }
    }

    let frontier = sample_frontier(
        &stats.expected_returns,
        &stats.covariance,
        config.risk_free_rate,
        &bounds,
        config.frontier_samples,
        &mut rng,
    )?;
    note_frontier_repairs(&frontier, config.frontier_samples, &mut warnings);

    let output = PortfolioAnalysis {
        current_portfolio,
        max_sharpe_portfolio,
        min_volatility_portfolio,
        benchmark_results,
        efficient_frontier_data: frontier.points,
        dominant_sector: dominant,
        benchmark_tickers: benchmarks.iter().map(|b| b.ticker().to_string()).collect(),
        bounds_used: bounds,
        data_period: period_label(&returns),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    info!(assets = tickers.len(), elapsed_us = elapsed, "portfolio analysis complete");
    Ok(with_metadata(
        "Historical mean-variance analysis with constrained optimization",
        &serde_json::json!({
            "tickers": tickers,
            "risk_free_rate": config.risk_free_rate,
            "trading_days_per_year": config.trading_days_per_year,
            "bounds": bounds,
            "solver": config.optimizer.solver,
            "frontier_samples": config.frontier_samples,
            "seed": config.seed,
        }),
        warnings,
        elapsed,
        output,
    ))
}

/// Optimize a ticker universe for a single objective.
pub fn optimize_portfolio(
    input: &OptimizationInput,
) -> AnalyticsResult<ComputationOutput<OptimizationOutput>> {
    let start = Instant::now();
    let mut warnings = Vec::new();
    input.config.validate()?;

    let returns = input
        .market_data
        .align(&input.tickers, input.start_date, input.end_date)?
        .returns(ReturnKind::Simple)?;
    let stats = ReturnStatistics::from_returns(&returns, input.config.periods_per_year());
    let bounds = resolve_bounds(&input.config, input.tickers.len(), &mut warnings)?;
    let mut rng = rng_from_seed(input.config.seed);
    let optimizer = ConstrainedOptimizer::new(input.config.optimizer.clone());

    let result = run_objective(&optimizer, &stats, &input.config, bounds, input.objective, &mut rng)?;
    note_repairs(&result, &mut warnings);
    let metrics = compute_portfolio_metrics(&returns, &result.weights, &input.config)?;

    let output = OptimizationOutput {
        weights: weight_map(returns.tickers(), &result.weights),
        metrics,
        objective: input.objective,
        iterations: result.iterations,
        converged: result.converged,
        bounds_used: bounds,
    };
    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Constrained mean-variance optimization",
        &serde_json::json!({
            "tickers": input.tickers,
            "objective": input.objective,
            "solver": input.config.optimizer.solver,
            "bounds": bounds,
            "risk_free_rate": input.config.risk_free_rate,
        }),
        warnings,
        elapsed,
        output,
    ))
}

/// Random-portfolio scatter of the frontier.
pub fn efficient_frontier(input: &FrontierInput) -> AnalyticsResult<ComputationOutput<FrontierSample>> {
    let start = Instant::now();
    let mut warnings = Vec::new();
    input.config.validate()?;

    let returns = input
        .market_data
        .align(&input.tickers, input.start_date, input.end_date)?
        .returns(ReturnKind::Simple)?;
    let stats = ReturnStatistics::from_returns(&returns, input.config.periods_per_year());
    let bounds = resolve_bounds(&input.config, input.tickers.len(), &mut warnings)?;
    let mut rng = rng_from_seed(input.config.seed);
    let frontier = sample_frontier(
        &stats.expected_returns,
        &stats.covariance,
        input.config.risk_free_rate,
        &bounds,
        input.config.frontier_samples,
        &mut rng,
    )?;
    note_frontier_repairs(&frontier, input.config.frontier_samples, &mut warnings);
    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Efficient frontier scatter approximation",
        &serde_json::json!({
            "tickers": input.tickers,
            "samples": input.config.frontier_samples,
            "bounds": bounds,
        }),
        warnings,
        elapsed,
        frontier,
    ))
}

/// Sector carrying the largest summed weight among holdings with a known
/// sector. Ties resolve to the sector listed first.
pub fn dominant_sector(holdings: &[Holding]) -> Option<Sector> {
    let mut totals: BTreeMap<Sector, f64> = BTreeMap::new();
    for h in holdings {
        if let Some(s) = h.sector {
            *totals.entry(s).or_insert(0.0) += h.weight;
        }
    }
    totals
        .into_iter()
        .fold(None, |best: Option<(Sector, f64)>, (s, w)| match best {
            Some((_, bw)) if bw >= w => best,
            _ => Some((s, w)),
        })
        .map(|(s, _)| s)
}

pub fn benchmarks_for(dominant: Option<Sector>) -> Vec<Benchmark> {
    let mut out = vec![Benchmark::Market];
    if let Some(s) = dominant {
        out.push(Benchmark::Sector(s));
    }
    out
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Configured bounds, or the first feasible rung of the relaxation ladder.
pub fn resolve_bounds(
    config: &EngineConfig,
    n: usize,
    warnings: &mut Vec<String>,
) -> AnalyticsResult<WeightBounds> {
    let configured = config.weight_bounds;
    if configured.is_feasible_for(n) {
        return Ok(configured);
    }
    if !config.relax_infeasible_bounds {
        return Err(AnalyticsError::InfeasibleBounds {
            assets: n,
            min_weight: configured.min_weight,
            max_weight: configured.max_weight,
        });
    }
    let relaxed = configured
        .relaxation_ladder()
        .into_iter()
        .find(|b| b.is_feasible_for(n))
        .ok_or(AnalyticsError::InfeasibleBounds {
            assets: n,
            min_weight: configured.min_weight,
            max_weight: configured.max_weight,
        })?;
    let msg = format!(
        "Bounds [{}, {}] are infeasible for {n} assets; relaxed to [{}, {}]",
        configured.min_weight, configured.max_weight, relaxed.min_weight, relaxed.max_weight
    );
    warn!("{msg}");
    warnings.push(msg);
    Ok(relaxed)
}

fn run_objective<R: rand::Rng + ?Sized>(
    optimizer: &ConstrainedOptimizer,
    stats: &ReturnStatistics,
    config: &EngineConfig,
    bounds: WeightBounds,
    objective: Objective,
    rng: &mut R,
) -> AnalyticsResult<OptimizedWeights> {
    let problem = OptimizationProblem {
        expected_returns: &stats.expected_returns,
        covariance: &stats.covariance,
        risk_free_rate: config.risk_free_rate,
        bounds,
    };
    let result = optimizer.optimize(&problem, objective, rng)?;
    validate_weights(&result.weights, config.weight_sum_tolerance)?;
    Ok(result)
}

fn note_repairs(result: &OptimizedWeights, warnings: &mut Vec<String>) {
    if result.bound_violations_repaired > 0 {
        warnings.push(format!(
            "{:?}: {} of {} search samples left their bounds after renormalization and were projected back",
            result.objective, result.bound_violations_repaired, result.iterations
        ));
    }
}

fn note_frontier_repairs(frontier: &FrontierSample, samples: usize, warnings: &mut Vec<String>) {
    if frontier.repaired_samples > 0 {
        warnings.push(format!(
            "{} of {} frontier samples left their bounds after renormalization and were projected back",
            frontier.repaired_samples, samples
        ));
    }
}

fn benchmark_metrics(
    input: &PortfolioAnalysisInput,
    ticker: &str,
    config: &EngineConfig,
) -> AnalyticsResult<PortfolioMetrics> {
    let returns = input
        .market_data
        .align(&[ticker.to_string()], input.start_date, input.end_date)?
        .returns(ReturnKind::Simple)?;
    compute_portfolio_metrics(&returns, &[1.0], config)
}

fn period_label(returns: &ReturnsMatrix) -> String {
    match (returns.dates().first(), returns.dates().last()) {
        (Some(a), Some(b)) => format!("{a} to {b}"),
        _ => String::new(),
    }
}
