//! Equilibrium returns and the Bayesian blend with investor views.
//!
//! All returns here are excess returns over the risk-free rate; callers add
//! the rate back before reporting.

use serde::{Deserialize, Serialize};

use crate::analytics::linalg::{self, mat_vec};
use crate::error::AnalyticsError;
use crate::AnalyticsResult;

/// Smallest view variance; a view held with full confidence would
/// otherwise make Ω singular.
pub const MIN_VIEW_VARIANCE: f64 = 1e-10;

/// An absolute view on one ticker's annual return.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InvestorView {
    #[serde(alias = "expectedReturn")]
    pub expected_return: f64,
    /// 0 (ignore the view) to 1 (certain).
    pub confidence: f64,
}

/// A view resolved against the asset universe: one row of P, one entry of
/// Q and one diagonal entry of Ω.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickedView {
    pub asset: usize,
    pub excess_return: f64,
    pub variance: f64,
}

/// π = δ·Σ·w_mkt
pub fn equilibrium_returns(covariance: &[Vec<f64>], market_weights: &[f64], risk_aversion: f64) -> Vec<f64> {
    mat_vec(covariance, market_weights)
        .into_iter()
        .map(|v| risk_aversion * v)
        .collect()
}

/// Ω_k = (1/c - 1)·τ·(P_k Σ P_kᵀ). With identity pick rows P_k Σ P_kᵀ is
/// the asset's own variance. Zero confidence yields `f64::INFINITY`, a
/// view with no information.
pub fn view_variance(confidence: f64, tau: f64, asset_variance: f64) -> f64 {
    if confidence <= 0.0 {
        return f64::INFINITY;
    }
    ((1.0 / confidence - 1.0) * tau * asset_variance).max(MIN_VIEW_VARIANCE)
}

/// E[R] = [(τΣ)⁻¹ + PᵀΩ⁻¹P]⁻¹ · [(τΣ)⁻¹π + PᵀΩ⁻¹Q]
///
/// P has one identity row per view, so PᵀΩ⁻¹P only adds 1/Ω_k to the
/// diagonal entry of the viewed asset. Views with infinite variance
/// contribute nothing and the result collapses to π.
pub fn posterior_returns(
    equilibrium: &[f64],
    covariance: &[Vec<f64>],
    tau: f64,
    views: &[PickedView],
) -> AnalyticsResult<Vec<f64>> {
    let n = equilibrium.len();
    if covariance.len() != n {
        return Err(AnalyticsError::validation(
            "covariance",
            format!("{}x? covariance for {n} assets", covariance.len()),
        ));
    }
    if !(tau > 0.0 && tau.is_finite()) {
        return Err(AnalyticsError::validation("tau", "Must be positive"));
    }

    let prior_precision = linalg::inverse(&linalg::mat_scale(covariance, tau), "tau * covariance")?;
    let mut precision = prior_precision.clone();
    let mut weighted = mat_vec(&prior_precision, equilibrium);

    for v in views.iter().filter(|v| v.variance.is_finite()) {
        if v.asset >= n {
            return Err(AnalyticsError::validation(
                "views",
                format!("asset index {} out of range", v.asset),
            ));
        }
        precision[v.asset][v.asset] += 1.0 / v.variance;
        weighted[v.asset] += v.excess_return / v.variance;
    }

    let posterior_cov = linalg::inverse(&precision, "posterior precision")?;
    let posterior = mat_vec(&posterior_cov, &weighted);
    if posterior.iter().any(|r| !r.is_finite()) {
        return Err(AnalyticsError::Numerical(
            "posterior returns are not finite".into(),
        ));
    }
    Ok(posterior)
}
