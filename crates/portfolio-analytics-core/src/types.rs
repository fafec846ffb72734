use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::AnalyticsError;
use crate::AnalyticsResult;

/// Dollar amounts handed to the presentation layer (investment sizes).
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = f64;

/// Ticker → weight, serialized in ticker order.
pub type WeightMap = BTreeMap<String, f64>;

/// GICS-style sector of a holding. Every sector maps to exactly one
/// SPDR sector ETF; there is no catch-all variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sector {
    #[serde(alias = "Information Technology")]
    Technology,
    #[serde(rename = "Financial Services", alias = "Financials")]
    FinancialServices,
    #[serde(alias = "Health Care")]
    Healthcare,
    #[serde(rename = "Consumer Cyclical", alias = "Consumer Discretionary")]
    ConsumerCyclical,
    Industrials,
    Energy,
    #[serde(rename = "Consumer Defensive", alias = "Consumer Staples")]
    ConsumerDefensive,
    #[serde(rename = "Real Estate")]
    RealEstate,
    Utilities,
    #[serde(rename = "Basic Materials", alias = "Materials")]
    BasicMaterials,
    #[serde(rename = "Communication Services")]
    CommunicationServices,
}

impl Sector {
    pub fn benchmark_etf(self) -> &'static str {
        match self {
            Sector::Technology => "XLK",
            Sector::FinancialServices => "XLF",
            Sector::Healthcare => "XLV",
            Sector::ConsumerCyclical => "XLY",
            Sector::Industrials => "XLI",
            Sector::Energy => "XLE",
            Sector::ConsumerDefensive => "XLP",
            Sector::RealEstate => "XLRE",
            Sector::Utilities => "XLU",
            Sector::BasicMaterials => "XLB",
            Sector::CommunicationServices => "XLC",
        }
    }
}

/// A benchmark the portfolio is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "sector", rename_all = "snake_case")]
pub enum Benchmark {
    /// Broad US market (S&P 500 tracker).
    Market,
    Sector(Sector),
}

impl Benchmark {
    pub fn ticker(self) -> &'static str {
        match self {
            Benchmark::Market => "SPY",
            Benchmark::Sector(s) => s.benchmark_etf(),
        }
    }
}

/// One position of a user-defined portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub ticker: String,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<Sector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "marketCap")]
    pub market_cap: Option<f64>,
}

/// Portfolio definition as supplied by the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioDefinition {
    pub stocks: Vec<Holding>,
    #[serde(alias = "initial_value")]
    pub initial_value: f64,
    #[serde(default, alias = "risk_free_rate", skip_serializing_if = "Option::is_none")]
    pub risk_free_rate: Option<Rate>,
}

impl PortfolioDefinition {
    pub fn tickers(&self) -> Vec<String> {
        self.stocks.iter().map(|h| h.ticker.clone()).collect()
    }

    pub fn weights(&self) -> Vec<f64> {
        self.stocks.iter().map(|h| h.weight).collect()
    }

    /// Reject empty, duplicated, non-finite or non-normalized portfolios.
    pub fn validate(&self, weight_sum_tolerance: f64) -> AnalyticsResult<()> {
        if self.stocks.is_empty() {
            return Err(AnalyticsError::validation(
                "stocks",
                "At least one holding is required",
            ));
        }
        let mut seen = std::collections::BTreeSet::new();
        for h in &self.stocks {
            if h.ticker.trim().is_empty() {
                return Err(AnalyticsError::validation("stocks", "Empty ticker symbol"));
            }
            if !seen.insert(h.ticker.as_str()) {
                return Err(AnalyticsError::validation(
                    "stocks",
                    format!("Duplicate ticker {}", h.ticker),
                ));
            }
        }
        validate_weights(&self.weights(), weight_sum_tolerance)?;
        if !(self.initial_value.is_finite() && self.initial_value > 0.0) {
            return Err(AnalyticsError::validation(
                "initial_value",
                "Initial value must be positive",
            ));
        }
        Ok(())
    }
}

/// Weights must lie in [0, 1] and sum to 1 within `tolerance`.
pub fn validate_weights(weights: &[f64], tolerance: f64) -> AnalyticsResult<()> {
    if weights.is_empty() {
        return Err(AnalyticsError::validation("weights", "No weights supplied"));
    }
    for (i, w) in weights.iter().enumerate() {
        if !w.is_finite() || *w < 0.0 || *w > 1.0 {
            return Err(AnalyticsError::validation(
                "weights",
                format!("Weight {i} ({w}) must lie in [0, 1]"),
            ));
        }
    }
    let sum: f64 = weights.iter().sum();
    if (sum - 1.0).abs() > tolerance {
        return Err(AnalyticsError::validation(
            "weights",
            format!("Weights sum to {sum:.8}, expected 1"),
        ));
    }
    Ok(())
}

/// Zip tickers and weights into a serializable map.
pub fn weight_map(tickers: &[String], weights: &[f64]) -> WeightMap {
    tickers
        .iter()
        .cloned()
        .zip(weights.iter().copied())
        .collect()
}

/// Standard computation output envelope. The payload is flattened so its
/// field names sit at the top level of the JSON object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T> {
    #[serde(flatten)]
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "ieee754_f64".to_string(),
        },
    }
}
