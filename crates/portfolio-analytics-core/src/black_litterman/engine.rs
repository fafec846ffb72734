use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::analytics::linalg::mat_vec;
use crate::analytics::returns::ReturnKind;
use crate::analytics::statistics::{covariance_matrix, portfolio_variance};
use crate::black_litterman::allocation::{
    allocation_summary, comparison_table, key_insights, residual_cash, total_invested, AllocationRow,
    AssetAllocationInput, ComparisonRow,
};
use crate::black_litterman::dividends::{annual_dividend_yield, total_returns};
use crate::black_litterman::model::{
    equilibrium_returns, posterior_returns, view_variance, InvestorView, PickedView,
};
use crate::config::{EngineConfig, WeightBounds};
use crate::error::AnalyticsError;
use crate::market_data::MarketData;
use crate::optimization::optimizer::{ConstrainedOptimizer, Objective, OptimizationProblem};
use crate::random::rng_from_seed;
use crate::types::{with_metadata, ComputationOutput, Money, Rate, Sector, WeightMap};
use crate::AnalyticsResult;

// ---------------------------------------------------------------------------
// Input / output
// ---------------------------------------------------------------------------

/// One asset of the investable universe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniverseAsset {
    pub ticker: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sector: Option<Sector>,
    #[serde(default, alias = "marketCap")]
    pub market_cap: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlackLittermanInput {
    pub assets: Vec<UniverseAsset>,
    #[serde(alias = "marketData")]
    pub market_data: MarketData,
    #[serde(default, alias = "startDate")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, alias = "endDate")]
    pub end_date: Option<NaiveDate>,
    /// Ticker → absolute view. Tickers without a view keep their prior.
    #[serde(default)]
    pub views: BTreeMap<String, InvestorView>,
    #[serde(default = "default_tau")]
    pub tau: f64,
    #[serde(default = "default_risk_aversion", alias = "riskAversion")]
    pub risk_aversion: f64,
    #[serde(default = "default_true", alias = "includeDividends")]
    pub include_dividends: bool,
    /// Annualized covariance to use instead of the historical estimate.
    #[serde(default)]
    pub covariance: Option<Vec<Vec<f64>>>,
    #[serde(default = "default_portfolio_value", alias = "portfolioValue")]
    pub portfolio_value: f64,
    /// Bounds for the re-optimization. Long-only `[0, 1]` when absent.
    #[serde(default)]
    pub bounds: Option<WeightBounds>,
    #[serde(default)]
    pub config: EngineConfig,
}

fn default_tau() -> f64 {
    0.05
}
fn default_risk_aversion() -> f64 {
    3.0
}
fn default_true() -> bool {
    true
}
fn default_portfolio_value() -> f64 {
    100_000.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioStats {
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub portfolio_dividend_yield: f64,
    pub risk_free_rate: Rate,
    /// Sum of the rounded investment amounts.
    pub total_invested: Money,
    pub residual_cash: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelParameters {
    pub tau: f64,
    pub risk_aversion: f64,
    pub data_period: String,
    pub dividend_integration: bool,
    pub number_of_stocks: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlackLittermanOutput {
    pub optimal_weights: WeightMap,
    /// Absolute annual returns (excess posterior plus the risk-free rate).
    pub posterior_returns: BTreeMap<String, f64>,
    /// Absolute market-implied returns, π plus the risk-free rate.
    pub equilibrium_returns: BTreeMap<String, f64>,
    pub market_weights: WeightMap,
    pub dividend_yields: BTreeMap<String, f64>,
    pub portfolio_stats: PortfolioStats,
    pub allocation_summary: Vec<AllocationRow>,
    pub comparison_table: Vec<ComparisonRow>,
    pub key_insights: Vec<String>,
    pub model_parameters: ModelParameters,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Blend market-implied returns with investor views and re-optimize.
pub fn run_black_litterman(
    input: &BlackLittermanInput,
) -> AnalyticsResult<ComputationOutput<BlackLittermanOutput>> {
    let start = Instant::now();
    let mut warnings = Vec::new();
    validate_input(input)?;

    let tickers: Vec<String> = input.assets.iter().map(|a| a.ticker.clone()).collect();
    let n = tickers.len();
    let rf = input.config.risk_free_rate;
    let periods = input.config.periods_per_year();

    let prices = input
        .market_data
        .align(&tickers, input.start_date, input.end_date)?;
    let price_returns = prices.returns(ReturnKind::Simple)?;
    let rows = if input.include_dividends {
        let (rows, applied) = total_returns(&prices, price_returns.rows(), &input.market_data);
        debug!(applied, "dividends folded into returns");
        rows
    } else {
        price_returns.rows().to_vec()
    };

    let covariance = match &input.covariance {
        Some(c) => {
            validate_covariance(c, n)?;
            c.clone()
        }
        None => covariance_matrix(&rows)
            .into_iter()
            .map(|r| r.into_iter().map(|v| v * periods).collect())
            .collect(),
    };

    let market_weights = market_weights(&input.assets, &mut warnings);
    let pi = equilibrium_returns(&covariance, &market_weights, input.risk_aversion);

    let views = pick_views(input, &tickers, &covariance)?;
    let posterior_excess = posterior_returns(&pi, &covariance, input.tau, &views)?;
    let posterior: Vec<f64> = posterior_excess.iter().map(|r| r + rf).collect();
    let equilibrium: Vec<f64> = pi.iter().map(|r| r + rf).collect();

    let bounds = input.bounds.unwrap_or(WeightBounds::LONG_ONLY);
    bounds.validate()?;
    bounds.check_feasible(n)?;
    let problem = OptimizationProblem {
        expected_returns: &posterior,
        covariance: &covariance,
        risk_free_rate: rf,
        bounds,
    };
    let mut rng = rng_from_seed(input.config.seed);
    let optimized = ConstrainedOptimizer::new(input.config.optimizer.clone()).optimize(
        &problem,
        Objective::MaxSharpe,
        &mut rng,
    )?;
    let weights = &optimized.weights;

    let (first, last) = match (prices.dates.first(), prices.dates.last()) {
        (Some(a), Some(b)) => (*a, *b),
        _ => return Err(AnalyticsError::Data("No aligned trading dates".into())),
    };
    let latest = prices.latest_prices();
    let dividend_yields: Vec<f64> = tickers
        .iter()
        .zip(&latest)
        .map(|(t, p)| {
            if input.include_dividends {
                annual_dividend_yield(input.market_data.dividends_for(t), first, last, *p)
            } else {
                0.0
            }
        })
        .collect();
    let portfolio_dividend_yield: f64 = weights.iter().zip(&dividend_yields).map(|(w, y)| w * y).sum();
    let risk_contributions = risk_contributions(weights, &covariance);

    let asset_rows: Vec<AssetAllocationInput<'_>> = input
        .assets
        .iter()
        .enumerate()
        .map(|(i, a)| AssetAllocationInput {
            ticker: &a.ticker,
            name: a.name.as_deref(),
            sector: a.sector,
            final_weight: weights[i],
            market_cap_weight: market_weights[i],
            latest_price: latest[i],
            expected_return: posterior[i],
            equilibrium_return: equilibrium[i],
            dividend_yield: dividend_yields[i],
            risk_contribution: risk_contributions[i],
        })
        .collect();
    let allocation = allocation_summary(&asset_rows, input.portfolio_value)?;
    let invested = total_invested(&allocation);
    let cash = residual_cash(&allocation, input.portfolio_value)?;
    let insights = key_insights(&allocation, portfolio_dividend_yield);
    let comparison = comparison_table(&asset_rows);

    let data_period = prices.period_label();
    let output = BlackLittermanOutput {
        optimal_weights: keyed(&tickers, weights),
        posterior_returns: keyed(&tickers, &posterior),
        equilibrium_returns: keyed(&tickers, &equilibrium),
        market_weights: keyed(&tickers, &market_weights),
        dividend_yields: keyed(&tickers, &dividend_yields),
        portfolio_stats: PortfolioStats {
            expected_return: optimized.expected_return,
            volatility: optimized.volatility,
            sharpe_ratio: optimized.sharpe,
            portfolio_dividend_yield,
            risk_free_rate: rf,
            total_invested: invested,
            residual_cash: cash,
        },
        allocation_summary: allocation,
        comparison_table: comparison,
        key_insights: insights,
        model_parameters: ModelParameters {
            tau: input.tau,
            risk_aversion: input.risk_aversion,
            data_period: data_period.clone(),
            dividend_integration: input.include_dividends,
            number_of_stocks: n,
        },
    };

    let elapsed = start.elapsed().as_micros() as u64;
    info!(assets = n, views = views.len(), elapsed_us = elapsed, "Black-Litterman complete");
    Ok(with_metadata(
        "Black-Litterman posterior returns with max-Sharpe re-optimization",
        &serde_json::json!({
            "tau": input.tau,
            "risk_aversion": input.risk_aversion,
            "risk_free_rate": rf,
            "omega": "(1/confidence - 1) * tau * sigma_ii",
            "bounds": bounds,
            "covariance_source": if input.covariance.is_some() { "supplied" } else { "historical" },
            "include_dividends": input.include_dividends,
            "data_period": data_period,
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn validate_input(input: &BlackLittermanInput) -> AnalyticsResult<()> {
    input.config.validate()?;
    if input.assets.is_empty() {
        return Err(AnalyticsError::validation("assets", "At least one asset is required"));
    }
    let mut seen = std::collections::BTreeSet::new();
    for a in &input.assets {
        if !seen.insert(a.ticker.as_str()) {
            return Err(AnalyticsError::validation(
                "assets",
                format!("Duplicate ticker {}", a.ticker),
            ));
        }
        if let Some(cap) = a.market_cap {
            if !(cap.is_finite() && cap >= 0.0) {
                return Err(AnalyticsError::validation(
                    "market_cap",
                    format!("{}: market cap must be non-negative", a.ticker),
                ));
            }
        }
    }
    if !(input.tau > 0.0 && input.tau.is_finite()) {
        return Err(AnalyticsError::validation("tau", "Must be positive"));
    }
    if !(input.risk_aversion > 0.0 && input.risk_aversion.is_finite()) {
        return Err(AnalyticsError::validation("risk_aversion", "Must be positive"));
    }
    if !(input.portfolio_value > 0.0 && input.portfolio_value.is_finite()) {
        return Err(AnalyticsError::validation(
            "portfolio_value",
            "Portfolio value must be positive",
        ));
    }
    for (ticker, v) in &input.views {
        if !seen.contains(ticker.as_str()) {
            return Err(AnalyticsError::UnknownTicker(ticker.clone()));
        }
        if !(0.0..=1.0).contains(&v.confidence) {
            return Err(AnalyticsError::validation(
                "confidence",
                format!("{ticker}: confidence {} outside [0, 1]", v.confidence),
            ));
        }
        if !v.expected_return.is_finite() {
            return Err(AnalyticsError::validation(
                "expected_return",
                format!("{ticker}: view is not finite"),
            ));
        }
    }
    Ok(())
}

fn validate_covariance(c: &[Vec<f64>], n: usize) -> AnalyticsResult<()> {
    if c.len() != n || c.iter().any(|r| r.len() != n) {
        return Err(AnalyticsError::validation(
            "covariance",
            format!("Expected a {n}x{n} matrix"),
        ));
    }
    if c.iter().flatten().any(|x| !x.is_finite()) {
        return Err(AnalyticsError::validation("covariance", "Non-finite entry"));
    }
    Ok(())
}

/// Normalized market caps, or equal weights when any cap is missing.
fn market_weights(assets: &[UniverseAsset], warnings: &mut Vec<String>) -> Vec<f64> {
    let n = assets.len();
    let caps: Option<Vec<f64>> = assets.iter().map(|a| a.market_cap).collect();
    match caps {
        Some(caps) if caps.iter().sum::<f64>() > 0.0 => {
            let total: f64 = caps.iter().sum();
            caps.iter().map(|c| c / total).collect()
        }
        _ => {
            if assets.iter().any(|a| a.market_cap.is_some()) {
                let msg = "Market caps missing for some assets; using equal prior weights".to_string();
                warn!("{msg}");
                warnings.push(msg);
            }
            vec![1.0 / n as f64; n]
        }
    }
}

fn pick_views(
    input: &BlackLittermanInput,
    tickers: &[String],
    covariance: &[Vec<f64>],
) -> AnalyticsResult<Vec<PickedView>> {
    let rf = input.config.risk_free_rate;
    let mut out = Vec::with_capacity(input.views.len());
    for (ticker, view) in &input.views {
        let asset = tickers
            .iter()
            .position(|t| t == ticker)
            .ok_or_else(|| AnalyticsError::UnknownTicker(ticker.clone()))?;
        let variance = view_variance(view.confidence, input.tau, covariance[asset][asset]);
        debug!(ticker = %ticker, confidence = view.confidence, omega = variance, "view");
        out.push(PickedView {
            asset,
            excess_return: view.expected_return - rf,
            variance,
        });
    }
    Ok(out)
}

fn keyed(tickers: &[String], values: &[f64]) -> BTreeMap<String, f64> {
    tickers.iter().cloned().zip(values.iter().copied()).collect()
}

/// Share of portfolio variance carried by each asset, `wᵢ(Σw)ᵢ / wᵀΣw`.
fn risk_contributions(weights: &[f64], covariance: &[Vec<f64>]) -> Vec<f64> {
    let total = portfolio_variance(weights, covariance);
    if total <= 0.0 {
        return weights.to_vec();
    }
    mat_vec(covariance, weights)
        .iter()
        .zip(weights)
        .map(|(m, w)| w * m / total)
        .collect()
}
