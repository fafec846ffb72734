//! Descriptive statistics and risk ratios over plain numeric slices.
//!
//! Functions taking two series assume equal lengths; any extra tail on the
//! longer one is ignored.

use serde::{Deserialize, Serialize};

use crate::analytics::returns::ReturnsMatrix;

// ---------------------------------------------------------------------------
// Moments
// ---------------------------------------------------------------------------

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    x.iter().sum::<f64>() / x.len() as f64
}

/// Population variance (divides by n).
pub fn variance(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    let m = mean(x);
    x.iter().map(|v| (v - m).powi(2)).sum::<f64>() / x.len() as f64
}

/// Population standard deviation.
pub fn standard_deviation(x: &[f64]) -> f64 {
    variance(x).sqrt()
}

/// Sample covariance, denominator n-1. Zero for fewer than two observations.
pub fn covariance(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let mx = mean(x);
    let my = mean(y);
    x.iter()
        .zip(y)
        .map(|(a, b)| (a - mx) * (b - my))
        .sum::<f64>()
        / (n - 1) as f64
}

/// Sample variance, identical to `covariance(x, x)`.
pub fn sample_variance(x: &[f64]) -> f64 {
    covariance(x, x)
}

pub fn sample_standard_deviation(x: &[f64]) -> f64 {
    sample_variance(x).sqrt()
}

/// Symmetric sample covariance matrix of the given rows.
pub fn covariance_matrix(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = rows.len();
    let mut cov = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in i..n {
            let c = covariance(&rows[i], &rows[j]);
            cov[i][j] = c;
            cov[j][i] = c;
        }
    }
    cov
}

/// Pearson correlation; 0 when either series has zero variance.
pub fn correlation(x: &[f64], y: &[f64]) -> f64 {
    let vx = sample_variance(x);
    let vy = sample_variance(y);
    if vx <= 0.0 || vy <= 0.0 {
        return 0.0;
    }
    (covariance(x, y) / (vx.sqrt() * vy.sqrt())).clamp(-1.0, 1.0)
}

pub fn correlation_matrix(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = rows.len();
    let mut corr = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in i..n {
            let c = if i == j && sample_variance(&rows[i]) > 0.0 {
                1.0
            } else {
                correlation(&rows[i], &rows[j])
            };
            corr[i][j] = c;
            corr[j][i] = c;
        }
    }
    corr
}

// ---------------------------------------------------------------------------
// Portfolio aggregates
// ---------------------------------------------------------------------------

/// `Σ wᵢμᵢ`
pub fn portfolio_return(weights: &[f64], expected_returns: &[f64]) -> f64 {
    weights.iter().zip(expected_returns).map(|(w, m)| w * m).sum()
}

/// `wᵗΣw`
pub fn portfolio_variance(weights: &[f64], cov: &[Vec<f64>]) -> f64 {
    let mut var = 0.0;
    for (i, wi) in weights.iter().enumerate() {
        for (j, wj) in weights.iter().enumerate() {
            var += wi * wj * cov[i][j];
        }
    }
    var
}

/// `sqrt(wᵗΣw)` in the units of `cov`.
pub fn portfolio_volatility(weights: &[f64], cov: &[Vec<f64>]) -> f64 {
    portfolio_variance(weights, cov).max(0.0).sqrt()
}

/// Scale a per-period volatility to annual terms.
pub fn annualize_volatility(vol: f64, periods_per_year: f64) -> f64 {
    vol * periods_per_year.sqrt()
}

// ---------------------------------------------------------------------------
// Ratios
// ---------------------------------------------------------------------------

/// `(return - rf) / volatility`; 0 when volatility is 0.
pub fn sharpe_ratio(annual_return: f64, annual_volatility: f64, risk_free_rate: f64) -> f64 {
    if annual_volatility <= 0.0 || !annual_volatility.is_finite() {
        return 0.0;
    }
    (annual_return - risk_free_rate) / annual_volatility
}

/// Annualized mean excess return over annualized downside deviation, where
/// downside deviation is the RMS of the negative daily excess returns.
/// Returns 0 when no period falls below the risk-free rate.
pub fn sortino_ratio(period_returns: &[f64], risk_free_rate: f64, periods_per_year: f64) -> f64 {
    if period_returns.is_empty() {
        return 0.0;
    }
    let rf_period = risk_free_rate / periods_per_year;
    let excess: Vec<f64> = period_returns.iter().map(|r| r - rf_period).collect();
    let downside: Vec<f64> = excess.iter().copied().filter(|e| *e < 0.0).collect();
    if downside.is_empty() {
        return 0.0;
    }
    let downside_dev = (downside.iter().map(|d| d * d).sum::<f64>() / downside.len() as f64).sqrt();
    if downside_dev <= 0.0 {
        return 0.0;
    }
    (mean(&excess) * periods_per_year) / (downside_dev * periods_per_year.sqrt())
}

/// Largest peak-to-trough decline of the compounded return series, as a
/// non-positive fraction.
pub fn max_drawdown(period_returns: &[f64]) -> f64 {
    let mut value = 1.0_f64;
    let mut peak = 1.0_f64;
    let mut worst = 0.0_f64;
    for r in period_returns {
        value *= 1.0 + r;
        if value > peak {
            peak = value;
        } else if peak > 0.0 {
            worst = worst.max((peak - value) / peak);
        }
    }
    if worst > 0.0 {
        -worst
    } else {
        0.0
    }
}

/// Composite 0-100 score:
/// `0.3·clip(sharpe/3·100) + 0.4·clip((1 - vol/0.5)·100) + 0.3·clip((1 - |mdd|/0.6)·100)`.
pub fn risk_index(sharpe: f64, volatility: f64, max_drawdown: f64) -> f64 {
    fn clip(x: f64) -> f64 {
        if x.is_nan() {
            0.0
        } else {
            x.clamp(0.0, 100.0)
        }
    }
    let sharpe_score = clip(sharpe / 3.0 * 100.0);
    let vol_score = clip((1.0 - volatility / 0.50) * 100.0);
    let dd_score = clip((1.0 - max_drawdown.abs() / 0.60) * 100.0);
    0.3 * sharpe_score + 0.4 * vol_score + 0.3 * dd_score
}

// ---------------------------------------------------------------------------
// Annualized inputs for the optimizers
// ---------------------------------------------------------------------------

/// Annualized expected returns and covariance estimated from period returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnStatistics {
    pub tickers: Vec<String>,
    pub expected_returns: Vec<f64>,
    pub covariance: Vec<Vec<f64>>,
}

impl ReturnStatistics {
    pub fn from_returns(returns: &ReturnsMatrix, periods_per_year: f64) -> Self {
        let expected_returns = returns
            .mean_vector()
            .into_iter()
            .map(|m| m * periods_per_year)
            .collect();
        let covariance = returns
            .covariance_matrix()
            .into_iter()
            .map(|row| row.into_iter().map(|c| c * periods_per_year).collect())
            .collect();
        ReturnStatistics {
            tickers: returns.tickers().to_vec(),
            expected_returns,
            covariance,
        }
    }

    pub fn n_assets(&self) -> usize {
        self.expected_returns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_mean_and_population_std() {
        let x = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&x) - 5.0).abs() < EPS);
        assert!((standard_deviation(&x) - 2.0).abs() < EPS);
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_sample_covariance_denominator() {
        let x = [1.0, 2.0, 3.0];
        let y = [2.0, 4.0, 6.0];
        // deviations (-1,0,1)·(-2,0,2) = 4, / (3-1)
        assert!((covariance(&x, &y) - 2.0).abs() < EPS);
        assert!((sample_variance(&x) - 1.0).abs() < EPS);
        assert_eq!(covariance(&[1.0], &[2.0]), 0.0);
    }

    #[test]
    fn test_covariance_matrix_symmetric_with_variance_diagonal() {
        let rows = vec![
            vec![0.01, -0.02, 0.03, 0.00],
            vec![0.02, 0.01, -0.01, 0.005],
            vec![-0.01, 0.00, 0.02, 0.01],
        ];
        let cov = covariance_matrix(&rows);
        for i in 0..3 {
            assert!((cov[i][i] - sample_variance(&rows[i])).abs() < EPS);
            for j in 0..3 {
                assert_eq!(cov[i][j], cov[j][i], "cov[{i}][{j}] not symmetric");
            }
        }
    }

    #[test]
    fn test_correlation_zero_variance() {
        assert_eq!(correlation(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), 0.0);
        let c = correlation(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]);
        assert!((c + 1.0).abs() < EPS);
    }

    #[test]
    fn test_portfolio_volatility() {
        let cov = vec![vec![0.04, 0.0], vec![0.0, 0.09]];
        let vol = portfolio_volatility(&[0.5, 0.5], &cov);
        // 0.25·0.04 + 0.25·0.09 = 0.0325
        assert!((vol - 0.0325_f64.sqrt()).abs() < EPS);
        assert!((annualize_volatility(0.01, 252.0) - 0.01 * 252.0_f64.sqrt()).abs() < EPS);
    }

    #[test]
    fn test_sharpe_zero_volatility() {
        assert_eq!(sharpe_ratio(0.10, 0.0, 0.02), 0.0);
        assert!((sharpe_ratio(0.10, 0.2, 0.02) - 0.4).abs() < EPS);
    }

    #[test]
    fn test_sortino_no_downside() {
        let r = [0.01, 0.02, 0.005];
        assert_eq!(sortino_ratio(&r, 0.0, 252.0), 0.0);
    }

    #[test]
    fn test_sortino_manual() {
        let r = [0.02, -0.02];
        assert!(sortino_ratio(&r, 0.0, 252.0).abs() < EPS, "zero mean excess");

        let r = [0.02, -0.01];
        let dd = 0.01;
        let expected = (0.005 * 252.0) / (dd * 252.0_f64.sqrt());
        assert!((sortino_ratio(&r, 0.0, 252.0) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_max_drawdown_non_positive() {
        assert_eq!(max_drawdown(&[0.01, 0.0, 0.02]), 0.0);
        let mdd = max_drawdown(&[0.10, -0.50, 0.20]);
        assert!((mdd + 0.5).abs() < EPS, "expected -50%, got {mdd}");
        assert!(max_drawdown(&[-0.1, 0.05, -0.2]) <= 0.0);
    }

    #[test]
    fn test_risk_index_formula() {
        // sharpe 1.5 -> 50, vol 0.25 -> 50, mdd -0.30 -> 50
        let ri = risk_index(1.5, 0.25, -0.30);
        assert!((ri - 50.0).abs() < 1e-9);
        assert!((risk_index(10.0, 0.0, 0.0) - 100.0).abs() < EPS);
        assert_eq!(risk_index(-2.0, 1.0, -0.9), 0.0);
    }
}
