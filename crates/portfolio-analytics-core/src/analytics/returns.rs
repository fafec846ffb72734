use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::analytics::statistics;
use crate::error::AnalyticsError;
use crate::market_data::PriceSeries;
use crate::AnalyticsResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnKind {
    /// `(p[t] - p[t-1]) / p[t-1]`
    Simple,
    /// `ln(p[t] / p[t-1])`
    Log,
}

/// Simple returns of an ordered price sequence.
pub fn simple_returns(prices: &[f64]) -> AnalyticsResult<Vec<f64>> {
    compute(prices, ReturnKind::Simple)
}

/// Continuously compounded returns of an ordered price sequence.
pub fn log_returns(prices: &[f64]) -> AnalyticsResult<Vec<f64>> {
    compute(prices, ReturnKind::Log)
}

pub fn compute(prices: &[f64], kind: ReturnKind) -> AnalyticsResult<Vec<f64>> {
    if prices.len() < 2 {
        return Err(AnalyticsError::Data(format!(
            "At least 2 prices are required, got {}",
            prices.len()
        )));
    }
    if let Some(bad) = prices.iter().find(|p| !(p.is_finite() && **p > 0.0)) {
        return Err(AnalyticsError::Data(format!(
            "Prices must be positive, found {bad}"
        )));
    }
    Ok(prices
        .windows(2)
        .map(|w| match kind {
            ReturnKind::Simple => (w[1] - w[0]) / w[0],
            ReturnKind::Log => (w[1] / w[0]).ln(),
        })
        .collect())
}

/// Returns of one ticker, dated by the end of each period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnSeries {
    pub ticker: String,
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

impl ReturnSeries {
    pub fn from_prices(series: &PriceSeries, kind: ReturnKind) -> AnalyticsResult<Self> {
        if series.len() < 2 {
            return Err(AnalyticsError::InsufficientHistory {
                ticker: series.ticker.clone(),
                observations: series.len(),
                required: 2,
            });
        }
        series.validate()?;
        let values = compute(&series.prices(), kind)?;
        Ok(ReturnSeries {
            ticker: series.ticker.clone(),
            dates: series.points[1..].iter().map(|p| p.date).collect(),
            values,
        })
    }
}

/// Assets × periods, every row on the same dates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnsMatrix {
    tickers: Vec<String>,
    dates: Vec<NaiveDate>,
    rows: Vec<Vec<f64>>,
}

impl ReturnsMatrix {
    pub fn new(
        tickers: Vec<String>,
        dates: Vec<NaiveDate>,
        rows: Vec<Vec<f64>>,
    ) -> AnalyticsResult<Self> {
        if tickers.is_empty() || tickers.len() != rows.len() {
            return Err(AnalyticsError::Data(format!(
                "{} tickers for {} return rows",
                tickers.len(),
                rows.len()
            )));
        }
        if let Some((t, r)) = tickers
            .iter()
            .zip(&rows)
            .find(|(_, r)| r.len() != dates.len())
        {
            return Err(AnalyticsError::Data(format!(
                "{t}: {} returns for {} dates",
                r.len(),
                dates.len()
            )));
        }
        if dates.is_empty() {
            return Err(AnalyticsError::Data("Return matrix has no periods".into()));
        }
        Ok(ReturnsMatrix {
            tickers,
            dates,
            rows,
        })
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.rows[i]
    }

    pub fn n_assets(&self) -> usize {
        self.rows.len()
    }

    pub fn n_periods(&self) -> usize {
        self.dates.len()
    }

    /// Per-period mean of each asset.
    pub fn mean_vector(&self) -> Vec<f64> {
        self.rows.iter().map(|r| statistics::mean(r)).collect()
    }

    pub fn covariance_matrix(&self) -> Vec<Vec<f64>> {
        statistics::covariance_matrix(&self.rows)
    }

    pub fn correlation_matrix(&self) -> Vec<Vec<f64>> {
        statistics::correlation_matrix(&self.rows)
    }

    /// Period returns of a portfolio rebalanced to `weights` every period.
    pub fn portfolio_returns(&self, weights: &[f64]) -> Vec<f64> {
        (0..self.n_periods())
            .map(|t| {
                self.rows
                    .iter()
                    .zip(weights)
                    .map(|(row, w)| w * row[t])
                    .sum()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::PricePoint;

    #[test]
    fn test_simple_returns() {
        let r = simple_returns(&[100.0, 110.0, 99.0]).unwrap();
        assert_eq!(r.len(), 2);
        assert!((r[0] - 0.10).abs() < 1e-12);
        assert!((r[1] + 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_log_returns() {
        let r = log_returns(&[100.0, 100.0 * 1.5_f64.exp()]).unwrap();
        assert!((r[0] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_too_few_prices() {
        assert!(matches!(simple_returns(&[100.0]), Err(AnalyticsError::Data(_))));
        assert!(simple_returns(&[]).is_err());
    }

    #[test]
    fn test_non_positive_price() {
        assert!(matches!(
            simple_returns(&[100.0, 0.0, 10.0]),
            Err(AnalyticsError::Data(_))
        ));
        assert!(simple_returns(&[100.0, -5.0]).is_err());
    }

    #[test]
    fn test_return_series_from_prices() {
        let d0 = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let d1 = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let s = PriceSeries::new(
            "AAPL",
            vec![
                PricePoint { date: d0, price: 50.0 },
                PricePoint { date: d1, price: 51.0 },
            ],
        );
        let rs = ReturnSeries::from_prices(&s, ReturnKind::Simple).unwrap();
        assert_eq!(rs.dates, vec![d1]);
        assert!((rs.values[0] - 0.02).abs() < 1e-12);

        let short = PriceSeries::new("X", vec![PricePoint { date: d0, price: 1.0 }]);
        assert!(matches!(
            ReturnSeries::from_prices(&short, ReturnKind::Simple),
            Err(AnalyticsError::InsufficientHistory { .. })
        ));
    }

    #[test]
    fn test_matrix_rejects_ragged_rows() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let err = ReturnsMatrix::new(
            vec!["A".into(), "B".into()],
            vec![d],
            vec![vec![0.01], vec![0.01, 0.02]],
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_portfolio_returns_weighted_sum() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let m = ReturnsMatrix::new(
            vec!["A".into(), "B".into()],
            vec![d, d.succ_opt().unwrap()],
            vec![vec![0.02, -0.01], vec![0.00, 0.03]],
        )
        .unwrap();
        let p = m.portfolio_returns(&[0.5, 0.5]);
        assert!((p[0] - 0.01).abs() < 1e-12);
        assert!((p[1] - 0.01).abs() < 1e-12);
    }
}
