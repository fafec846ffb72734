use serde::{Deserialize, Serialize};

use crate::analytics::returns::ReturnsMatrix;
use crate::analytics::statistics::{self, annualize_volatility};
use crate::config::EngineConfig;
use crate::error::AnalyticsError;
use crate::types::{validate_weights, weight_map, WeightMap};
use crate::AnalyticsResult;

/// Risk/return summary of one weight vector over a return history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioMetrics {
    #[serde(rename = "return")]
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub max_drawdown: f64,
    pub risk_index: f64,
    pub weights: WeightMap,
}

/// Annualized metrics of `weights` held against `returns`.
///
/// Return is `w·μ` with μ the mean period return scaled by the periods per
/// year; volatility is `sqrt(wᵗΣw)·√periods` with Σ the sample covariance of
/// period returns. Sortino and drawdown use the weighted period-return series.
pub fn compute_portfolio_metrics(
    returns: &ReturnsMatrix,
    weights: &[f64],
    config: &EngineConfig,
) -> AnalyticsResult<PortfolioMetrics> {
    if weights.len() != returns.n_assets() {
        return Err(AnalyticsError::validation(
            "weights",
            format!(
                "{} weights for {} assets",
                weights.len(),
                returns.n_assets()
            ),
        ));
    }
    validate_weights(weights, config.weight_sum_tolerance)?;

    let periods = config.periods_per_year();
    let mu: Vec<f64> = returns
        .mean_vector()
        .into_iter()
        .map(|m| m * periods)
        .collect();
    let cov = returns.covariance_matrix();

    let expected_return = statistics::portfolio_return(weights, &mu);
    let volatility = annualize_volatility(statistics::portfolio_volatility(weights, &cov), periods);
    let sharpe = statistics::sharpe_ratio(expected_return, volatility, config.risk_free_rate);

    let series = returns.portfolio_returns(weights);
    let sortino = statistics::sortino_ratio(&series, config.risk_free_rate, periods);
    let max_drawdown = statistics::max_drawdown(&series);
    let risk_index = statistics::risk_index(sharpe, volatility, max_drawdown);

    let metrics = PortfolioMetrics {
        expected_return,
        volatility,
        sharpe,
        sortino,
        max_drawdown,
        risk_index,
        weights: weight_map(returns.tickers(), weights),
    };
    metrics.ensure_finite()?;
    Ok(metrics)
}

impl PortfolioMetrics {
    fn ensure_finite(&self) -> AnalyticsResult<()> {
        let fields = [
            ("return", self.expected_return),
            ("volatility", self.volatility),
            ("sharpe", self.sharpe),
            ("sortino", self.sortino),
            ("maxDrawdown", self.max_drawdown),
            ("riskIndex", self.risk_index),
        ];
        match fields.iter().find(|(_, v)| !v.is_finite()) {
            Some((name, v)) => Err(AnalyticsError::Numerical(format!(
                "portfolio metric {name} is not finite ({v})"
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn matrix(rows: Vec<Vec<f64>>) -> ReturnsMatrix {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let n = rows[0].len();
        let dates = (0..n)
            .map(|i| start + chrono::Duration::days(i as i64))
            .collect();
        let tickers = (0..rows.len()).map(|i| format!("T{i}")).collect();
        ReturnsMatrix::new(tickers, dates, rows).unwrap()
    }

    #[test]
    fn test_metrics_json_field_names() {
        let m = matrix(vec![vec![0.01, -0.005, 0.007, 0.002]]);
        let metrics = compute_portfolio_metrics(&m, &[1.0], &EngineConfig::default()).unwrap();
        let v = serde_json::to_value(&metrics).unwrap();
        for key in ["return", "volatility", "sharpe", "sortino", "maxDrawdown", "riskIndex", "weights"] {
            assert!(v.get(key).is_some(), "missing field {key}");
        }
        assert_eq!(v["weights"]["T0"], 1.0);
    }

    #[test]
    fn test_sharpe_consistent_with_return_and_volatility() {
        let m = matrix(vec![
            vec![0.01, -0.005, 0.007, 0.002, -0.01],
            vec![0.003, 0.002, -0.004, 0.006, 0.001],
        ]);
        let cfg = EngineConfig::default();
        let metrics = compute_portfolio_metrics(&m, &[0.5, 0.5], &cfg).unwrap();
        let expected = (metrics.expected_return - 0.02) / metrics.volatility;
        assert!((metrics.sharpe - expected).abs() < 1e-12);
        assert!(metrics.max_drawdown <= 0.0);
    }

    #[test]
    fn test_weight_count_mismatch() {
        let m = matrix(vec![vec![0.01, 0.02], vec![0.0, 0.01]]);
        let err = compute_portfolio_metrics(&m, &[1.0], &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, AnalyticsError::Validation { .. }));
    }

    #[test]
    fn test_constant_series_zero_volatility() {
        let m = matrix(vec![vec![0.0, 0.0, 0.0]]);
        let metrics = compute_portfolio_metrics(&m, &[1.0], &EngineConfig::default()).unwrap();
        assert_eq!(metrics.volatility, 0.0);
        assert_eq!(metrics.sharpe, 0.0);
        assert_eq!(metrics.max_drawdown, 0.0);
    }
}
