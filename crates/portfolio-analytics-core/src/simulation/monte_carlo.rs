use chrono::NaiveDate;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

use crate::analytics::linalg::{self, Matrix};
use crate::analytics::returns::ReturnKind;
use crate::config::EngineConfig;
use crate::error::AnalyticsError;
use crate::market_data::MarketData;
use crate::random::{resolve_seed, trial_rng};
use crate::simulation::runtime::{run_trials, Budget};
use crate::simulation::stats::{percentile_sorted, sorted};
use crate::types::{validate_weights, with_metadata, ComputationOutput};
use crate::AnalyticsResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloInput {
    pub tickers: Vec<String>,
    pub weights: Vec<f64>,
    #[serde(alias = "marketData")]
    pub market_data: MarketData,
    #[serde(default, alias = "startDate")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, alias = "endDate")]
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_initial_value", alias = "initialValue")]
    pub initial_value: f64,
    #[serde(default = "default_n_simulations", alias = "nSimulations")]
    pub n_simulations: usize,
    #[serde(default = "default_n_days", alias = "nDays")]
    pub n_days: usize,
    /// Ticker shown alongside the holdings in `normalized_prices`.
    #[serde(default = "default_benchmark")]
    pub benchmark: Option<String>,
    #[serde(default)]
    pub config: EngineConfig,
}

pub(crate) fn default_initial_value() -> f64 {
    100_000.0
}

fn default_n_simulations() -> usize {
    10_000
}

pub(crate) fn default_n_days() -> usize {
    252
}

fn default_benchmark() -> Option<String> {
    Some("SPY".to_string())
}

/// Maximum trials × days held in memory by one request.
pub const MAX_PATH_CELLS: usize = 50_000_000;

/// Percentile bands of portfolio value, one entry per simulated day
/// (index 0 is the starting value).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PercentileBands {
    pub p10: Vec<f64>,
    pub p50: Vec<f64>,
    pub p90: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloOutput {
    pub percentiles: PercentileBands,
    pub mean_path: Vec<f64>,
    pub final_distribution: Vec<f64>,
    pub var_5: f64,
    pub mean_final: f64,
    pub probability_of_loss: f64,
    pub correlation_matrix: BTreeMap<String, BTreeMap<String, f64>>,
    pub normalized_prices: BTreeMap<String, Vec<f64>>,
    pub normalized_dates: Vec<NaiveDate>,
    pub return_distributions: BTreeMap<String, Vec<f64>>,
    pub n_simulations: usize,
    pub n_days: usize,
    pub initial_value: f64,
    pub message: String,
}

/// Daily drift and correlated-shock factor of a multi-asset lognormal model.
#[derive(Debug, Clone)]
pub struct GbmModel {
    /// `mean - variance / 2` of daily log returns.
    pub drift: Vec<f64>,
    /// Cholesky factor of the daily log-return covariance.
    pub cholesky: Matrix,
    normal: Normal,
}

impl GbmModel {
    pub fn new(drift: Vec<f64>, cholesky: Matrix) -> AnalyticsResult<Self> {
        if cholesky.len() != drift.len() || cholesky.iter().any(|r| r.len() != drift.len()) {
            return Err(AnalyticsError::validation(
                "cholesky",
                format!("Factor must be {0}x{0}", drift.len()),
            ));
        }
        Ok(GbmModel {
            drift,
            cholesky,
            normal: standard_normal()?,
        })
    }

    /// Estimate from per-asset daily log-return rows.
    pub fn estimate(log_returns: &[Vec<f64>]) -> AnalyticsResult<Self> {
        let cov = crate::analytics::statistics::covariance_matrix(log_returns);
        let drift = log_returns
            .iter()
            .enumerate()
            .map(|(i, r)| crate::analytics::statistics::mean(r) - 0.5 * cov[i][i])
            .collect();
        let cholesky = linalg::cholesky(&cov, "Monte Carlo covariance")?;
        GbmModel::new(drift, cholesky)
    }

    pub fn n_assets(&self) -> usize {
        self.drift.len()
    }
}

// ---------------------------------------------------------------------------
// Path generation
// ---------------------------------------------------------------------------

/// One portfolio value path of `n_days + 1` points starting at `initial_value`.
///
/// Each day draws an independent standard-normal vector z, correlates it as
/// L·z, and multiplies every asset's growth factor by `exp(drift + L·z)`. The
/// portfolio is buy-and-hold: value = initial · Σ wᵢ·Gᵢ / Σ wᵢ.
pub fn simulate_path<R: Rng + ?Sized>(
    model: &GbmModel,
    weights: &[f64],
    initial_value: f64,
    n_days: usize,
    rng: &mut R,
) -> Vec<f64> {
    let n = model.n_assets();
    let normal = &model.normal;
    let weight_sum: f64 = weights.iter().sum();
    let mut growth = vec![1.0_f64; n];
    let mut z = vec![0.0_f64; n];
    let mut path = Vec::with_capacity(n_days + 1);
    path.push(initial_value);

    for _ in 0..n_days {
        for zi in z.iter_mut() {
            *zi = rng.sample(normal);
        }
        for (i, g) in growth.iter_mut().enumerate() {
            let shock: f64 = model.cholesky[i][..=i]
                .iter()
                .zip(&z[..=i])
                .map(|(l, zj)| l * zj)
                .sum();
            *g *= (model.drift[i] + shock).exp();
        }
        let blended: f64 = weights.iter().zip(&growth).map(|(w, g)| w * g).sum();
        path.push(initial_value * (blended / weight_sum));
    }
    path
}

pub(crate) fn standard_normal() -> AnalyticsResult<Normal> {
    Normal::new(0.0, 1.0)
        .map_err(|e| AnalyticsError::Numerical(format!("standard normal: {e}")))
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn run_monte_carlo(input: &MonteCarloInput) -> AnalyticsResult<ComputationOutput<MonteCarloOutput>> {
    run_monte_carlo_with_budget(input, &Budget::with_timeout_ms(input.config.max_duration_ms))
}

/// Correlated multi-asset Monte Carlo of portfolio value.
pub fn run_monte_carlo_with_budget(
    input: &MonteCarloInput,
    budget: &Budget,
) -> AnalyticsResult<ComputationOutput<MonteCarloOutput>> {
    let start = Instant::now();
    let mut warnings = Vec::new();
    validate_input(input)?;

    let prices = input
        .market_data
        .align(&input.tickers, input.start_date, input.end_date)?;
    // A single return gives a zero covariance; paths then follow the drift.
    let log_returns = prices.returns(ReturnKind::Log)?;

    let model = GbmModel::estimate(log_returns.rows())?;
    debug!(drift = ?model.drift, "estimated daily drift");

    let base_seed = resolve_seed(input.config.seed);
    let paths = run_trials(input.n_simulations, budget, "monte_carlo", |i| {
        let mut rng = trial_rng(base_seed, i as u64);
        let path = simulate_path(&model, &input.weights, input.initial_value, input.n_days, &mut rng);
        if path.iter().any(|v| !v.is_finite()) {
            return Err(AnalyticsError::Numerical(format!(
                "trial {i} produced a non-finite portfolio value"
            )));
        }
        Ok(path)
    })?;

    let (percentiles, mean_path) = daily_bands(&paths, input.n_days);
    let final_distribution: Vec<f64> = paths.iter().map(|p| p[input.n_days]).collect();
    let sorted_finals = sorted(&final_distribution);
    let var_5 = percentile_sorted(&sorted_finals, 5.0);
    let mean_final = crate::analytics::statistics::mean(&final_distribution);
    let losses = final_distribution
        .iter()
        .filter(|v| **v < input.initial_value)
        .count();
    let probability_of_loss = losses as f64 / input.n_simulations as f64;

    let corr = log_returns.correlation_matrix();
    let correlation_matrix = nested_matrix(&input.tickers, &corr);
    let return_distributions = input
        .tickers
        .iter()
        .cloned()
        .zip(log_returns.rows().iter().cloned())
        .collect();

    let (normalized_prices, normalized_dates) = normalized_history(input, &mut warnings)?;

    let output = MonteCarloOutput {
        percentiles,
        mean_path,
        final_distribution,
        var_5,
        mean_final,
        probability_of_loss,
        correlation_matrix,
        normalized_prices,
        normalized_dates,
        return_distributions,
        n_simulations: input.n_simulations,
        n_days: input.n_days,
        initial_value: input.initial_value,
        message: "Monte Carlo simulation completed successfully.".into(),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    info!(
        n_simulations = input.n_simulations,
        n_days = input.n_days,
        elapsed_us = elapsed,
        "Monte Carlo simulation complete"
    );
    Ok(with_metadata(
        "Correlated geometric Brownian motion (Cholesky-factored daily log returns)",
        &serde_json::json!({
            "tickers": input.tickers,
            "weights": input.weights,
            "n_simulations": input.n_simulations,
            "n_days": input.n_days,
            "initial_value": input.initial_value,
            "history": prices.period_label(),
            "seed": base_seed,
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn validate_input(input: &MonteCarloInput) -> AnalyticsResult<()> {
    input.config.validate()?;
    if input.tickers.is_empty() {
        return Err(AnalyticsError::validation("tickers", "At least one ticker is required"));
    }
    if input.tickers.len() != input.weights.len() {
        return Err(AnalyticsError::validation(
            "weights",
            format!("{} tickers but {} weights", input.tickers.len(), input.weights.len()),
        ));
    }
    validate_weights(&input.weights, input.config.weight_sum_tolerance)?;
    validate_run_size(input.initial_value, input.n_simulations, input.n_days)
}

pub(crate) fn validate_run_size(initial_value: f64, trials: usize, n_days: usize) -> AnalyticsResult<()> {
    if !(initial_value.is_finite() && initial_value > 0.0) {
        return Err(AnalyticsError::validation(
            "initial_value",
            "Initial value must be positive",
        ));
    }
    if trials == 0 {
        return Err(AnalyticsError::validation("n_simulations", "Must be at least 1"));
    }
    if n_days == 0 {
        return Err(AnalyticsError::validation("n_days", "Must be at least 1"));
    }
    if trials.saturating_mul(n_days + 1) > MAX_PATH_CELLS {
        return Err(AnalyticsError::validation(
            "n_simulations",
            format!("{trials} trials x {n_days} days exceeds the {MAX_PATH_CELLS} value limit"),
        ));
    }
    Ok(())
}

/// Per-day p10/p50/p90 and mean across trials.
fn daily_bands(paths: &[Vec<f64>], n_days: usize) -> (PercentileBands, Vec<f64>) {
    let per_day: Vec<(f64, f64, f64, f64)> = (0..=n_days)
        .into_par_iter()
        .map(|d| {
            let column: Vec<f64> = paths.iter().map(|p| p[d]).collect();
            let s = sorted(&column);
            (
                percentile_sorted(&s, 10.0),
                percentile_sorted(&s, 50.0),
                percentile_sorted(&s, 90.0),
                crate::analytics::statistics::mean(&column),
            )
        })
        .collect();
    let bands = PercentileBands {
        p10: per_day.iter().map(|x| x.0).collect(),
        p50: per_day.iter().map(|x| x.1).collect(),
        p90: per_day.iter().map(|x| x.2).collect(),
    };
    (bands, per_day.iter().map(|x| x.3).collect())
}

pub(crate) fn nested_matrix(tickers: &[String], m: &[Vec<f64>]) -> BTreeMap<String, BTreeMap<String, f64>> {
    tickers
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let row = tickers
                .iter()
                .enumerate()
                .map(|(j, b)| (b.clone(), m[i][j]))
                .collect();
            (a.clone(), row)
        })
        .collect()
}

/// Base-100 history of the holdings plus the benchmark when it has data.
fn normalized_history(
    input: &MonteCarloInput,
    warnings: &mut Vec<String>,
) -> AnalyticsResult<(BTreeMap<String, Vec<f64>>, Vec<NaiveDate>)> {
    let mut tickers = input.tickers.clone();
    if let Some(b) = &input.benchmark {
        if tickers.contains(b) {
            // already displayed
        } else if input.market_data.contains(b) {
            tickers.push(b.clone());
        } else {
            warnings.push(format!("Benchmark {b} has no price data; omitted from normalized prices"));
        }
    }
    let matrix = match input.market_data.align(&tickers, input.start_date, input.end_date) {
        Ok(m) => m,
        Err(e) if tickers.len() > input.tickers.len() => {
            warnings.push(format!("Benchmark could not be aligned with holdings: {e}"));
            input
                .market_data
                .align(&input.tickers, input.start_date, input.end_date)?
        }
        Err(e) => return Err(e),
    };
    Ok((matrix.normalized(100.0), matrix.dates.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::{PricePoint, PriceSeries};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SEED: u64 = 42;

    fn series(ticker: &str, prices: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        PriceSeries::new(
            ticker,
            prices
                .iter()
                .enumerate()
                .map(|(i, p)| PricePoint {
                    date: start + chrono::Duration::days(i as i64),
                    price: *p,
                })
                .collect(),
        )
    }

    fn wavy(n: usize, base: f64, amp: f64, phase: f64) -> Vec<f64> {
        (0..n)
            .map(|i| base * (1.0 + 0.0004 * i as f64) * (1.0 + amp * ((i as f64) * 0.7 + phase).sin()))
            .collect()
    }

    fn input(n_sims: usize) -> MonteCarloInput {
        MonteCarloInput {
            tickers: vec!["AAA".into(), "BBB".into()],
            weights: vec![0.6, 0.4],
            market_data: MarketData::new(vec![
                series("AAA", &wavy(120, 100.0, 0.01, 0.0)),
                series("BBB", &wavy(120, 50.0, 0.02, 1.3)),
                series("SPY", &wavy(120, 400.0, 0.005, 0.4)),
            ]),
            start_date: None,
            end_date: None,
            initial_value: 10_000.0,
            n_simulations: n_sims,
            n_days: 30,
            benchmark: Some("SPY".into()),
            config: EngineConfig {
                seed: Some(SEED),
                ..EngineConfig::default()
            },
        }
    }

    #[test]
    fn test_output_shapes() {
        let out = run_monte_carlo(&input(500)).unwrap().result;
        assert_eq!(out.mean_path.len(), 31);
        assert_eq!(out.percentiles.p10.len(), 31);
        assert_eq!(out.final_distribution.len(), 500);
        assert_eq!(out.mean_path[0], 10_000.0);
        assert!(out.normalized_prices.contains_key("SPY"));
        assert_eq!(out.normalized_prices["AAA"][0], 100.0);
        assert_eq!(out.normalized_dates.len(), 120);
        assert_eq!(out.correlation_matrix["AAA"]["AAA"], 1.0);
        assert_eq!(out.return_distributions["BBB"].len(), 119);
    }

    #[test]
    fn test_return_distributions_are_log_returns() {
        let i = input(200);
        let out = run_monte_carlo(&i).unwrap().result;
        let prices = wavy(120, 100.0, 0.01, 0.0);
        let first = out.return_distributions["AAA"][0];
        assert!(
            (first - (prices[1] / prices[0]).ln()).abs() < 1e-12,
            "expected log return, got {first}"
        );
        assert!((first - (prices[1] / prices[0] - 1.0)).abs() > 1e-6);
    }

    #[test]
    fn test_two_prices_are_enough() {
        let mut i = input(200);
        i.market_data = MarketData::new(vec![
            series("AAA", &[100.0, 101.0]),
            series("BBB", &[50.0, 49.5]),
        ]);
        i.benchmark = None;
        let out = run_monte_carlo(&i).unwrap().result;
        assert_eq!(out.final_distribution.len(), 200);
        assert_eq!(out.return_distributions["AAA"].len(), 1);
        assert!(out.final_distribution.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_bands_ordered() {
        let out = run_monte_carlo(&input(1_000)).unwrap().result;
        for d in 0..=30 {
            assert!(out.percentiles.p10[d] <= out.percentiles.p50[d]);
            assert!(out.percentiles.p50[d] <= out.percentiles.p90[d]);
        }
    }

    #[test]
    fn test_var_is_fifth_percentile() {
        let out = run_monte_carlo(&input(1_000)).unwrap().result;
        let s = sorted(&out.final_distribution);
        assert_eq!(out.var_5, percentile_sorted(&s, 5.0));
        assert!((0.0..=1.0).contains(&out.probability_of_loss));
    }

    #[test]
    fn test_seeded_runs_reproducible() {
        let a = run_monte_carlo(&input(200)).unwrap().result;
        let b = run_monte_carlo(&input(200)).unwrap().result;
        assert_eq!(a.final_distribution, b.final_distribution);
    }

    #[test]
    fn test_weight_mismatch_rejected() {
        let mut i = input(10);
        i.weights = vec![1.0];
        let err = run_monte_carlo(&i).unwrap_err();
        assert!(matches!(err, AnalyticsError::Validation { .. }));
    }

    #[test]
    fn test_unknown_ticker() {
        let mut i = input(10);
        i.tickers[1] = "NOPE".into();
        assert!(matches!(run_monte_carlo(&i), Err(AnalyticsError::UnknownTicker(_))));
    }

    #[test]
    fn test_missing_benchmark_is_warning() {
        let mut i = input(10);
        i.benchmark = Some("QQQ".into());
        let out = run_monte_carlo(&i).unwrap();
        assert!(out.warnings.iter().any(|w| w.contains("QQQ")));
    }

    #[test]
    fn test_simulate_path_correlation_preserved() {
        // Perfectly correlated assets: L has a zero second column.
        let model =
            GbmModel::new(vec![0.0, 0.0], vec![vec![0.01, 0.0], vec![0.02, 0.0]]).unwrap();
        let mut rng = StdRng::seed_from_u64(SEED);
        let a = simulate_path(&model, &[1.0, 0.0], 1.0, 50, &mut rng);
        let mut rng = StdRng::seed_from_u64(SEED);
        let b = simulate_path(&model, &[0.0, 1.0], 1.0, 50, &mut rng);
        for (x, y) in a.iter().zip(&b) {
            // log growth of B is exactly twice that of A
            assert!((y.ln() - 2.0 * x.ln()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_timeout_budget() {
        let i = input(5_000);
        let budget = Budget::unlimited();
        budget.cancel();
        assert!(matches!(
            run_monte_carlo_with_budget(&i, &budget),
            Err(AnalyticsError::Cancelled { .. })
        ));
    }
}
