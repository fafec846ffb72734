use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::analytics::statistics::{max_drawdown, sample_standard_deviation};
use crate::config::EngineConfig;
use crate::error::AnalyticsError;
use crate::market_data::{MarketData, PriceMatrix};
use crate::stress_testing::scenarios::ScenarioEvent;
use crate::types::{validate_weights, with_metadata, ComputationOutput};
use crate::AnalyticsResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressTestInput {
    pub tickers: Vec<String>,
    pub weights: Vec<f64>,
    #[serde(alias = "marketData")]
    pub market_data: MarketData,
    /// Episodes to replay; all of them when empty.
    #[serde(default)]
    pub scenarios: Vec<ScenarioEvent>,
    #[serde(default)]
    pub benchmark: Option<String>,
    #[serde(default)]
    pub config: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorstDay {
    pub date: NaiveDate,
    pub portfolio_return: f64,
}

/// Buy-and-hold replay of one episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario: ScenarioEvent,
    pub label: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub trading_days: usize,
    pub total_return: f64,
    pub max_drawdown: f64,
    pub annualized_volatility: f64,
    pub worst_day: WorstDay,
    /// Trading days from the deepest trough back to the prior peak, `None`
    /// when the window ends underwater.
    pub recovery_days: Option<usize>,
    pub asset_returns: BTreeMap<String, f64>,
    pub benchmark_return: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedScenario {
    pub scenario: ScenarioEvent,
    pub label: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressTestOutput {
    pub results: Vec<ScenarioResult>,
    pub skipped: Vec<SkippedScenario>,
    /// Label of the scenario with the lowest total return.
    pub worst_scenario: Option<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Replay the portfolio through historical episodes.
pub fn run_stress_test(input: &StressTestInput) -> AnalyticsResult<ComputationOutput<StressTestOutput>> {
    let start = Instant::now();
    let mut warnings = Vec::new();
    validate_input(input)?;

    let events: Vec<ScenarioEvent> = if input.scenarios.is_empty() {
        ScenarioEvent::ALL.to_vec()
    } else {
        input.scenarios.clone()
    };

    let benchmark = match &input.benchmark {
        Some(b) if input.market_data.contains(b) => Some(b.clone()),
        Some(b) => {
            let msg = format!("Benchmark {b} not in market data; benchmark returns omitted");
            warn!("{msg}");
            warnings.push(msg);
            None
        }
        None => None,
    };

    let mut results = Vec::new();
    let mut skipped = Vec::new();
    for event in events {
        let (from, to) = event.window();
        match input.market_data.align(&input.tickers, Some(from), Some(to)) {
            Ok(prices) => {
                let mut r = replay(event, &prices, &input.weights, input.config.periods_per_year());
                r.benchmark_return = benchmark
                    .as_ref()
                    .and_then(|b| window_return(&input.market_data, b, from, to));
                debug!(scenario = event.label(), total_return = r.total_return, "scenario replayed");
                results.push(r);
            }
            Err(e @ (AnalyticsError::InsufficientHistory { .. } | AnalyticsError::Data(_))) => {
                skipped.push(SkippedScenario {
                    scenario: event,
                    label: event.label().to_string(),
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    let worst_scenario = results
        .iter()
        .min_by(|a, b| a.total_return.total_cmp(&b.total_return))
        .map(|r| r.label.clone());
    if results.is_empty() {
        warnings.push("No scenario window overlaps the supplied price history".into());
    }

    let output = StressTestOutput {
        results,
        skipped,
        worst_scenario,
    };
    let elapsed = start.elapsed().as_micros() as u64;
    info!(
        replayed = output.results.len(),
        skipped = output.skipped.len(),
        elapsed_us = elapsed,
        "stress test complete"
    );
    Ok(with_metadata(
        "Historical scenario replay, buy-and-hold from window start",
        &serde_json::json!({
            "tickers": input.tickers,
            "weights": input.weights,
            "benchmark": input.benchmark,
            "trading_days_per_year": input.config.trading_days_per_year,
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Internal logic
// ---------------------------------------------------------------------------

fn validate_input(input: &StressTestInput) -> AnalyticsResult<()> {
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
    for t in &input.tickers {
        input.market_data.get(t)?;
    }
    Ok(())
}

/// Replay `prices` (at least two dates) holding the initial allocation.
fn replay(event: ScenarioEvent, prices: &PriceMatrix, weights: &[f64], periods: f64) -> ScenarioResult {
    let n_days = prices.n_observations();
    let weight_sum: f64 = weights.iter().sum();
    let values: Vec<f64> = (0..n_days)
        .map(|t| {
            prices
                .prices
                .iter()
                .zip(weights)
                .map(|(row, w)| w * row[t] / row[0])
                .sum::<f64>()
                / weight_sum
        })
        .collect();
    let daily: Vec<f64> = values.windows(2).map(|v| v[1] / v[0] - 1.0).collect();

    let (worst_idx, worst_ret) = daily
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::INFINITY), |best, (i, r)| if r < best.1 { (i, r) } else { best });

    let asset_returns = prices
        .tickers
        .iter()
        .zip(&prices.prices)
        .map(|(t, row)| (t.clone(), row[n_days - 1] / row[0] - 1.0))
        .collect();

    ScenarioResult {
        scenario: event,
        label: event.label().to_string(),
        start_date: prices.dates[0],
        end_date: prices.dates[n_days - 1],
        trading_days: n_days,
        total_return: values[n_days - 1] - 1.0,
        max_drawdown: max_drawdown(&daily),
        annualized_volatility: sample_standard_deviation(&daily) * periods.sqrt(),
        worst_day: WorstDay {
            date: prices.dates[worst_idx + 1],
            portfolio_return: worst_ret,
        },
        recovery_days: recovery_days(&values),
        asset_returns,
        benchmark_return: None,
    }
}

/// Days from the trough of the deepest drawdown until the value first
/// regains the peak that preceded it.
pub fn recovery_days(values: &[f64]) -> Option<usize> {
    let mut peak = f64::NEG_INFINITY;
    let mut peak_value_at_trough = f64::NEG_INFINITY;
    let mut trough_idx = 0;
    let mut deepest = 0.0_f64;
    for (i, v) in values.iter().enumerate() {
        peak = peak.max(*v);
        let dd = v / peak - 1.0;
        if dd < deepest {
            deepest = dd;
            trough_idx = i;
            peak_value_at_trough = peak;
        }
    }
    if deepest == 0.0 {
        return Some(0);
    }
    values[trough_idx..]
        .iter()
        .position(|v| *v >= peak_value_at_trough)
}

fn window_return(data: &MarketData, ticker: &str, from: NaiveDate, to: NaiveDate) -> Option<f64> {
    let w = data.get(ticker).ok()?.window(Some(from), Some(to));
    match (w.points.first(), w.points.last()) {
        (Some(a), Some(b)) if w.len() >= 2 && a.price > 0.0 => Some(b.price / a.price - 1.0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::{PricePoint, PriceSeries};
    use pretty_assertions::assert_eq;

    fn series(ticker: &str, start: NaiveDate, prices: &[f64]) -> PriceSeries {
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

    fn covid_input() -> StressTestInput {
        let start = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        StressTestInput {
            tickers: vec!["AAA".into(), "BBB".into()],
            weights: vec![0.5, 0.5],
            market_data: MarketData::new(vec![
                series("AAA", start, &[100.0, 90.0, 80.0, 95.0, 100.0, 104.0]),
                series("BBB", start, &[50.0, 50.0, 45.0, 45.0, 48.0, 50.0]),
                series("SPY", start, &[300.0, 280.0, 250.0, 270.0, 285.0, 290.0]),
            ]),
            scenarios: vec![],
            benchmark: Some("SPY".into()),
            config: EngineConfig::default(),
        }
    }

    #[test]
    fn test_covid_replayed_others_skipped() {
        let out = run_stress_test(&covid_input()).unwrap().result;
        assert_eq!(out.results.len(), 1);
        assert_eq!(out.skipped.len(), 9);
        let r = &out.results[0];
        assert_eq!(r.scenario, ScenarioEvent::Covid2020);
        // Final value: 0.5 * 1.04 + 0.5 * 1.0
        assert!((r.total_return - 0.02).abs() < 1e-12);
        assert!((r.asset_returns["AAA"] - 0.04).abs() < 1e-12);
        assert!((r.benchmark_return.unwrap() - (290.0 / 300.0 - 1.0)).abs() < 1e-12);
        assert!(r.max_drawdown < 0.0);
        assert_eq!(out.worst_scenario.as_deref(), Some("COVID Crash 2020"));
    }

    #[test]
    fn test_worst_day_and_recovery() {
        let out = run_stress_test(&covid_input()).unwrap().result;
        let r = &out.results[0];
        // Values: 1.0, 0.95, 0.85, 0.925, 0.98, 1.02
        assert_eq!(r.worst_day.date, NaiveDate::from_ymd_opt(2020, 3, 3).unwrap());
        assert_eq!(r.recovery_days, Some(3));
    }

    #[test]
    fn test_recovery_none_when_underwater() {
        assert_eq!(recovery_days(&[1.0, 0.8, 0.9]), None);
        assert_eq!(recovery_days(&[1.0, 1.1, 1.2]), Some(0));
    }

    #[test]
    fn test_missing_benchmark_warns() {
        let mut i = covid_input();
        i.benchmark = Some("QQQ".into());
        let out = run_stress_test(&i).unwrap();
        assert!(out.warnings.iter().any(|w| w.contains("QQQ")));
        assert!(out.result.results[0].benchmark_return.is_none());
    }

    #[test]
    fn test_selected_scenarios_only() {
        let mut i = covid_input();
        i.scenarios = vec![ScenarioEvent::Gfc2008];
        let out = run_stress_test(&i).unwrap().result;
        assert!(out.results.is_empty());
        assert_eq!(out.skipped.len(), 1);
        assert!(out.worst_scenario.is_none());
    }

    #[test]
    fn test_unknown_ticker_rejected() {
        let mut i = covid_input();
        i.tickers[1] = "ZZZ".into();
        assert!(matches!(run_stress_test(&i), Err(AnalyticsError::UnknownTicker(_))));
    }
}
