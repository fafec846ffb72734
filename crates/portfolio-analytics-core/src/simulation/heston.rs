use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::analytics::linalg::{self, Matrix};
use crate::analytics::returns::ReturnKind;
use crate::analytics::statistics::{correlation, mean, sample_standard_deviation, sample_variance};
use crate::config::EngineConfig;
use crate::error::AnalyticsError;
use crate::market_data::MarketData;
use crate::random::{resolve_seed, trial_rng};
use crate::simulation::monte_carlo::{default_initial_value, default_n_days, standard_normal, validate_run_size};
use crate::simulation::runtime::{run_trials, Budget};
use crate::simulation::stats::{percentile_sorted, sorted, tail_risk};
use crate::types::{validate_weights, with_metadata, ComputationOutput};
use crate::AnalyticsResult;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

pub const KAPPA_BOUNDS: (f64, f64) = (0.01, 10.0);
pub const THETA_BOUNDS: (f64, f64) = (0.001, 0.5);
pub const XI_BOUNDS: (f64, f64) = (0.01, 2.0);
pub const RHO_BOUNDS: (f64, f64) = (-0.99, 0.99);

/// Annualized Heston variance dynamics of one asset:
/// `dv = κ(θ - v)dt + ξ√v dW_v`, `corr(dW_v, dW_S) = ρ`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HestonParameters {
    #[serde(default = "default_kappa")]
    pub kappa: f64,
    #[serde(default = "default_theta")]
    pub theta: f64,
    #[serde(default = "default_xi")]
    pub xi: f64,
    #[serde(default = "default_rho")]
    pub rho: f64,
}

fn default_kappa() -> f64 {
    3.0
}
fn default_theta() -> f64 {
    0.04
}
fn default_xi() -> f64 {
    0.5
}
fn default_rho() -> f64 {
    -0.7
}

impl Default for HestonParameters {
    fn default() -> Self {
        HestonParameters {
            kappa: default_kappa(),
            theta: default_theta(),
            xi: default_xi(),
            rho: default_rho(),
        }
    }
}

impl HestonParameters {
    /// Clamp every parameter into its admissible range.
    pub fn clamped(self) -> Self {
        HestonParameters {
            kappa: self.kappa.clamp(KAPPA_BOUNDS.0, KAPPA_BOUNDS.1),
            theta: self.theta.clamp(THETA_BOUNDS.0, THETA_BOUNDS.1),
            xi: self.xi.clamp(XI_BOUNDS.0, XI_BOUNDS.1),
            rho: self.rho.clamp(RHO_BOUNDS.0, RHO_BOUNDS.1),
        }
    }

    pub fn validate(&self) -> AnalyticsResult<()> {
        let checks = [
            ("kappa", self.kappa, KAPPA_BOUNDS),
            ("theta", self.theta, THETA_BOUNDS),
            ("xi", self.xi, XI_BOUNDS),
            ("rho", self.rho, RHO_BOUNDS),
        ];
        for (name, v, (lo, hi)) in checks {
            if !(v.is_finite() && v >= lo && v <= hi) {
                return Err(AnalyticsError::validation(
                    name,
                    format!("{v} outside [{lo}, {hi}]"),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationMethod {
    /// Moments of block-wise realized variance.
    #[default]
    MethodOfMoments,
    /// Use the request's kappa/theta/xi/rho for every asset.
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationSource {
    MethodOfMoments,
    Fixed,
    /// History too short; request parameters with θ set to the sample variance.
    Fallback,
}

/// Parameters used for one asset and where they came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibratedAsset {
    pub parameters: HestonParameters,
    /// Annualized drift of the price process.
    pub mu: f64,
    pub source: CalibrationSource,
    /// Realized-variance blocks the estimate used.
    pub blocks: usize,
}

// ---------------------------------------------------------------------------
// Calibration
// ---------------------------------------------------------------------------

/// Minimum number of realized-variance blocks for a moment estimate.
pub const MIN_CALIBRATION_BLOCKS: usize = 4;

/// Method-of-moments estimate from daily log returns.
///
/// Returns are cut into non-overlapping blocks of `window` days; each block
/// gives an annualized realized variance vₖ. Then
/// - θ = mean(vₖ)
/// - κ = -ln(φ)/Δ, φ the lag-1 autocorrelation of vₖ, Δ = window/periods
/// - ξ = sd(vₖ₊₁ - vₖ - κ(θ - vₖ)Δ) / sqrt(θΔ)
/// - ρ = corr(block return, vₖ₊₁ - vₖ)
///
/// and every value is clamped into its bounds. `None` when fewer than
/// [`MIN_CALIBRATION_BLOCKS`] blocks are available.
pub fn calibrate_method_of_moments(
    log_returns: &[f64],
    window: usize,
    periods_per_year: f64,
) -> Option<(HestonParameters, usize)> {
    if window < 2 {
        return None;
    }
    let blocks: Vec<&[f64]> = log_returns.chunks_exact(window).collect();
    if blocks.len() < MIN_CALIBRATION_BLOCKS {
        return None;
    }
    let v: Vec<f64> = blocks
        .iter()
        .map(|b| sample_variance(b) * periods_per_year)
        .collect();
    let block_returns: Vec<f64> = blocks.iter().map(|b| b.iter().sum()).collect();
    let dt = window as f64 / periods_per_year;

    let theta = mean(&v);
    let phi = correlation(&v[..v.len() - 1], &v[1..]);
    let kappa = if phi <= 0.0 {
        KAPPA_BOUNDS.1
    } else {
        -phi.min(0.999).ln() / dt
    };

    let residuals: Vec<f64> = v
        .windows(2)
        .map(|w| w[1] - w[0] - kappa * (theta - w[0]) * dt)
        .collect();
    let xi = if theta > 0.0 {
        sample_standard_deviation(&residuals) / (theta * dt).sqrt()
    } else {
        XI_BOUNDS.0
    };

    let dv: Vec<f64> = v.windows(2).map(|w| w[1] - w[0]).collect();
    let rho = correlation(&block_returns[1..], &dv);

    let params = HestonParameters {
        kappa,
        theta,
        xi,
        rho,
    };
    let clamped = params.clamped();
    if !(clamped.kappa.is_finite() && clamped.xi.is_finite()) {
        return None;
    }
    Some((clamped, blocks.len()))
}

// ---------------------------------------------------------------------------
// Path simulation
// ---------------------------------------------------------------------------

/// Per-asset dynamics plus the cross-asset correlation factor of the
/// independent price shocks.
#[derive(Debug, Clone)]
pub struct HestonModel {
    pub assets: Vec<CalibratedAsset>,
    pub price_correlation_factor: Matrix,
    /// Step in years.
    pub dt: f64,
    normal: Normal,
}

impl HestonModel {
    pub fn new(assets: Vec<CalibratedAsset>, price_correlation_factor: Matrix, dt: f64) -> AnalyticsResult<Self> {
        let n = assets.len();
        if price_correlation_factor.len() != n || price_correlation_factor.iter().any(|r| r.len() != n) {
            return Err(AnalyticsError::validation(
                "price_correlation_factor",
                format!("Factor must be {n}x{n}"),
            ));
        }
        if !(dt > 0.0 && dt.is_finite()) {
            return Err(AnalyticsError::validation("dt", "Step must be positive"));
        }
        Ok(HestonModel {
            assets,
            price_correlation_factor,
            dt,
            normal: standard_normal()?,
        })
    }
}

/// Full-truncation Euler path of portfolio value (`n_days + 1` points).
///
/// Variance enters drift and diffusion as v⁺ = max(v, 0), so negative
/// excursions of the discretized variance never reach the price. Each asset
/// starts at v₀ = θ. Price shocks are `ρ·Z_v + sqrt(1 - ρ²)·(L·Z_u)` with L
/// the Cholesky factor of the historical return correlation.
pub fn simulate_portfolio_path<R: Rng + ?Sized>(
    model: &HestonModel,
    weights: &[f64],
    initial_value: f64,
    n_days: usize,
    rng: &mut R,
) -> Vec<f64> {
    let n = model.assets.len();
    let dt = model.dt;
    let sqrt_dt = dt.sqrt();
    let weight_sum: f64 = weights.iter().sum();
    let mut variance: Vec<f64> = model.assets.iter().map(|a| a.parameters.theta).collect();
    let mut log_price = vec![0.0_f64; n];
    let mut z_v = vec![0.0_f64; n];
    let mut z_u = vec![0.0_f64; n];
    let mut path = Vec::with_capacity(n_days + 1);
    path.push(initial_value);

    for _ in 0..n_days {
        for i in 0..n {
            z_v[i] = rng.sample(&model.normal);
            z_u[i] = rng.sample(&model.normal);
        }
        for (i, asset) in model.assets.iter().enumerate() {
            let p = &asset.parameters;
            let correlated_u: f64 = model.price_correlation_factor[i][..=i]
                .iter()
                .zip(&z_u[..=i])
                .map(|(l, z)| l * z)
                .sum();
            let z_s = p.rho * z_v[i] + (1.0 - p.rho * p.rho).sqrt() * correlated_u;
            let v_pos = variance[i].max(0.0);
            let vol_step = v_pos.sqrt() * sqrt_dt;
            log_price[i] += (asset.mu - 0.5 * v_pos) * dt + vol_step * z_s;
            variance[i] += p.kappa * (p.theta - v_pos) * dt + p.xi * vol_step * z_v[i];
        }
        let blended: f64 = weights
            .iter()
            .zip(&log_price)
            .map(|(w, lp)| w * lp.exp())
            .sum();
        path.push(initial_value * blended / weight_sum);
    }
    path
}

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HestonInput {
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
    #[serde(default = "default_n_paths", alias = "nPaths")]
    pub n_paths: usize,
    #[serde(default = "default_n_days", alias = "nDays")]
    pub n_days: usize,
    #[serde(default = "default_confidence", alias = "confidenceLevel")]
    pub confidence_level: f64,
    /// Parameters for `Fixed` calibration, and the fallback for assets whose
    /// history is too short to calibrate.
    #[serde(flatten)]
    pub parameters: HestonParameters,
    #[serde(default)]
    pub calibration: CalibrationMethod,
    /// Days per realized-variance block.
    #[serde(default = "default_window", alias = "realizedWindow")]
    pub realized_window: usize,
    #[serde(default, alias = "includePaths")]
    pub include_paths: bool,
    #[serde(default = "default_max_paths", alias = "maxPathsReturned")]
    pub max_paths_returned: usize,
    #[serde(default)]
    pub config: EngineConfig,
}

fn default_n_paths() -> usize {
    10_000
}
fn default_confidence() -> f64 {
    0.90
}
fn default_window() -> usize {
    21
}
fn default_max_paths() -> usize {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HestonOutput {
    pub final_distribution: Vec<f64>,
    pub var_value: f64,
    pub var_dollar: f64,
    pub var_percent: f64,
    pub cvar_value: f64,
    pub cvar_dollar: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub mean_value: f64,
    pub initial_value: f64,
    pub confidence_level: f64,
    pub portfolio_paths: Option<Vec<Vec<f64>>>,
    pub calibrated_parameters: BTreeMap<String, CalibratedAsset>,
    pub n_paths: usize,
    pub n_days: usize,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn run_heston(input: &HestonInput) -> AnalyticsResult<ComputationOutput<HestonOutput>> {
    run_heston_with_budget(input, &Budget::with_timeout_ms(input.config.max_duration_ms))
}

/// Stochastic-volatility simulation of portfolio value with tail risk.
pub fn run_heston_with_budget(
    input: &HestonInput,
    budget: &Budget,
) -> AnalyticsResult<ComputationOutput<HestonOutput>> {
    let start = Instant::now();
    let mut warnings = Vec::new();
    validate_input(input)?;

    let prices = input
        .market_data
        .align(&input.tickers, input.start_date, input.end_date)?;
    let log_returns = prices.returns(ReturnKind::Log)?;
    let periods = input.config.periods_per_year();

    let mut assets = Vec::with_capacity(input.tickers.len());
    let mut calibrated_parameters = BTreeMap::new();
    for (i, ticker) in input.tickers.iter().enumerate() {
        let asset = calibrate_asset(ticker, log_returns.row(i), input, periods, &mut warnings);
        debug!(ticker = %ticker, params = ?asset.parameters, source = ?asset.source, "heston parameters");
        calibrated_parameters.insert(ticker.clone(), asset.clone());
        assets.push(asset);
    }

    let corr = log_returns.correlation_matrix();
    let factor = linalg::cholesky(&corr, "Heston price correlation")?;
    let model = HestonModel::new(assets, factor, 1.0 / periods)?;

    let base_seed = resolve_seed(input.config.seed);
    let keep_paths = if input.include_paths { input.max_paths_returned } else { 0 };
    let trials = run_trials(input.n_paths, budget, "heston", |i| {
        let mut rng = trial_rng(base_seed, i as u64);
        let path = simulate_portfolio_path(&model, &input.weights, input.initial_value, input.n_days, &mut rng);
        let last = path[input.n_days];
        if !last.is_finite() {
            return Err(AnalyticsError::Numerical(format!(
                "Heston path {i} produced a non-finite value"
            )));
        }
        Ok((last, (i < keep_paths).then_some(path)))
    })?;

    let mut final_distribution = Vec::with_capacity(trials.len());
    let mut paths = Vec::new();
    for (last, path) in trials {
        final_distribution.push(last);
        if let Some(p) = path {
            paths.push(p);
        }
    }

    let sorted_finals = sorted(&final_distribution);
    let tail = tail_risk(&sorted_finals, input.initial_value, input.confidence_level);
    let half_alpha = 100.0 * (1.0 - input.confidence_level) / 2.0;

    let output = HestonOutput {
        var_value: tail.var_value,
        var_dollar: tail.var_dollar,
        var_percent: tail.var_percent,
        cvar_value: tail.cvar_value,
        cvar_dollar: tail.cvar_dollar,
        lower_bound: percentile_sorted(&sorted_finals, half_alpha),
        upper_bound: percentile_sorted(&sorted_finals, 100.0 - half_alpha),
        mean_value: mean(&final_distribution),
        final_distribution,
        initial_value: input.initial_value,
        confidence_level: input.confidence_level,
        portfolio_paths: input.include_paths.then_some(paths),
        calibrated_parameters,
        n_paths: input.n_paths,
        n_days: input.n_days,
        message: "Heston simulation completed successfully with calibrated parameters.".into(),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    info!(n_paths = input.n_paths, n_days = input.n_days, elapsed_us = elapsed, "Heston simulation complete");
    Ok(with_metadata(
        "Heston stochastic volatility, full-truncation Euler",
        &serde_json::json!({
            "tickers": input.tickers,
            "weights": input.weights,
            "n_paths": input.n_paths,
            "n_days": input.n_days,
            "confidence_level": input.confidence_level,
            "calibration": input.calibration,
            "realized_window": input.realized_window,
            "dt": 1.0 / periods,
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

fn validate_input(input: &HestonInput) -> AnalyticsResult<()> {
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
    if !(input.confidence_level > 0.0 && input.confidence_level < 1.0) {
        return Err(AnalyticsError::validation(
            "confidence_level",
            "Must lie strictly between 0 and 1",
        ));
    }
    input.parameters.validate()?;
    validate_run_size(input.initial_value, input.n_paths, input.n_days)
}

/// Per-asset parameters. A failed moment estimate falls back to the request
/// parameters with θ replaced by the sample variance, and records a warning.
fn calibrate_asset(
    ticker: &str,
    log_returns: &[f64],
    input: &HestonInput,
    periods: f64,
    warnings: &mut Vec<String>,
) -> CalibratedAsset {
    let sample_var = sample_variance(log_returns) * periods;
    let mu = mean(log_returns) * periods + 0.5 * sample_var;

    if input.calibration == CalibrationMethod::Fixed {
        return CalibratedAsset {
            parameters: input.parameters,
            mu,
            source: CalibrationSource::Fixed,
            blocks: 0,
        };
    }
    match calibrate_method_of_moments(log_returns, input.realized_window, periods) {
        Some((parameters, blocks)) => CalibratedAsset {
            parameters,
            mu,
            source: CalibrationSource::MethodOfMoments,
            blocks,
        },
        None => {
            let msg = format!(
                "{ticker}: {} returns are too few for {} blocks of {} days; using fallback parameters",
                log_returns.len(),
                MIN_CALIBRATION_BLOCKS,
                input.realized_window
            );
            warn!("{msg}");
            warnings.push(msg);
            CalibratedAsset {
                parameters: HestonParameters {
                    theta: sample_var,
                    ..input.parameters
                }
                .clamped(),
                mu,
                source: CalibrationSource::Fallback,
                blocks: 0,
            }
        }
    }
}
