use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::analytics::statistics::{portfolio_return, portfolio_volatility, sharpe_ratio};
use crate::config::WeightBounds;
use crate::error::AnalyticsError;
use crate::optimization::constraints::random_bounded_weights;
use crate::AnalyticsResult;

/// One sampled portfolio in risk/return space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EfficientFrontierPoint {
    pub volatility: f64,
    #[serde(rename = "return")]
    pub expected_return: f64,
    pub sharpe: f64,
}

/// Scatter approximation of the frontier: random bounded portfolios sorted
/// by ascending volatility. The parallel arrays repeat the points column-wise
/// for plotting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierSample {
    pub points: Vec<EfficientFrontierPoint>,
    pub returns: Vec<f64>,
    pub volatilities: Vec<f64>,
    pub sharpe_ratios: Vec<f64>,
    pub repaired_samples: usize,
}

/// Sample `samples` bounded weight vectors and evaluate each one.
pub fn sample_frontier<R: Rng + ?Sized>(
    expected_returns: &[f64],
    covariance: &[Vec<f64>],
    risk_free_rate: f64,
    bounds: &WeightBounds,
    samples: usize,
    rng: &mut R,
) -> AnalyticsResult<FrontierSample> {
    let n = expected_returns.len();
    if n == 0 || covariance.len() != n {
        return Err(AnalyticsError::validation(
            "expected_returns",
            format!("{n} expected returns for a {}x{} covariance", covariance.len(), covariance.len()),
        ));
    }
    if samples == 0 {
        return Err(AnalyticsError::validation(
            "frontier_samples",
            "At least one sample is required",
        ));
    }
    bounds.check_feasible(n)?;

    let mut repaired_samples = 0;
    let mut points: Vec<EfficientFrontierPoint> = (0..samples)
        .map(|_| {
            let s = random_bounded_weights(rng, n, bounds);
            repaired_samples += s.repaired as usize;
            let expected_return = portfolio_return(&s.weights, expected_returns);
            let volatility = portfolio_volatility(&s.weights, covariance);
            EfficientFrontierPoint {
                volatility,
                expected_return,
                sharpe: sharpe_ratio(expected_return, volatility, risk_free_rate),
            }
        })
        .collect();
    points.sort_by(|a, b| a.volatility.total_cmp(&b.volatility));

    Ok(FrontierSample {
        returns: points.iter().map(|p| p.expected_return).collect(),
        volatilities: points.iter().map(|p| p.volatility).collect(),
        sharpe_ratios: points.iter().map(|p| p.sharpe).collect(),
        points,
        repaired_samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SEED: u64 = 42;

    fn inputs() -> (Vec<f64>, Vec<Vec<f64>>) {
        (
            vec![0.08, 0.12, 0.10, 0.06],
            vec![
                vec![0.04, 0.01, 0.00, 0.00],
                vec![0.01, 0.09, 0.02, 0.00],
                vec![0.00, 0.02, 0.06, 0.01],
                vec![0.00, 0.00, 0.01, 0.03],
            ],
        )
    }

    #[test]
    fn test_points_sorted_by_volatility() {
        let (mu, cov) = inputs();
        let mut rng = StdRng::seed_from_u64(SEED);
        let f = sample_frontier(&mu, &cov, 0.02, &WeightBounds::default(), 500, &mut rng).unwrap();
        assert_eq!(f.points.len(), 500);
        assert!(f.points.windows(2).all(|w| w[0].volatility <= w[1].volatility));
        assert_eq!(f.volatilities.len(), f.returns.len());
    }

    #[test]
    fn test_sharpe_per_point() {
        let (mu, cov) = inputs();
        let mut rng = StdRng::seed_from_u64(SEED);
        let f = sample_frontier(&mu, &cov, 0.02, &WeightBounds::LONG_ONLY, 50, &mut rng).unwrap();
        for p in &f.points {
            assert!((p.sharpe - (p.expected_return - 0.02) / p.volatility).abs() < 1e-12);
        }
    }

    #[test]
    fn test_field_names() {
        let p = EfficientFrontierPoint {
            volatility: 0.1,
            expected_return: 0.08,
            sharpe: 0.6,
        };
        let v = serde_json::to_value(p).unwrap();
        assert_eq!(v["return"], 0.08);
    }

    #[test]
    fn test_infeasible_bounds() {
        let (mu, cov) = inputs();
        let mut rng = StdRng::seed_from_u64(SEED);
        let b = WeightBounds::new(0.3, 0.4).unwrap();
        assert!(sample_frontier(&mu, &cov, 0.02, &b, 10, &mut rng).is_err());
    }
}
