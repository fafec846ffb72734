use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analytics::linalg::{self, is_symmetric};
use crate::analytics::statistics::{portfolio_return, portfolio_volatility, sharpe_ratio};
use crate::config::{OptimizerConfig, SolverKind, WeightBounds};
use crate::error::AnalyticsError;
use crate::optimization::constraints::{
    equal_weights, project_onto_bounded_simplex, random_bounded_weights,
};
use crate::AnalyticsResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Objective {
    #[serde(rename = "maxSharpe", alias = "max_sharpe")]
    MaxSharpe,
    #[serde(rename = "minVol", alias = "min_vol", alias = "minVolatility")]
    MinVolatility,
}

/// Annualized inputs of a single optimization.
#[derive(Debug, Clone, Copy)]
pub struct OptimizationProblem<'a> {
    pub expected_returns: &'a [f64],
    pub covariance: &'a [Vec<f64>],
    pub risk_free_rate: f64,
    pub bounds: WeightBounds,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizedWeights {
    pub weights: Vec<f64>,
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe: f64,
    pub objective: Objective,
    pub solver: SolverKind,
    pub iterations: usize,
    pub converged: bool,
    /// Random-search samples that left their bounds after renormalization.
    pub bound_violations_repaired: usize,
}

/// Finds max-Sharpe or min-volatility weights under per-asset bounds.
#[derive(Debug, Clone, Default)]
pub struct ConstrainedOptimizer {
    config: OptimizerConfig,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

impl ConstrainedOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        ConstrainedOptimizer { config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Solve `problem` for `objective`. Randomness (search trials) comes
    /// from `rng`; the projected-gradient solver does not consume it.
    pub fn optimize<R: Rng + ?Sized>(
        &self,
        problem: &OptimizationProblem<'_>,
        objective: Objective,
        rng: &mut R,
    ) -> AnalyticsResult<OptimizedWeights> {
        validate_problem(problem)?;

        let (weights, iterations, converged, repaired) = match self.config.solver {
            SolverKind::ProjectedGradient => {
                let (w, it, conv) = match objective {
                    Objective::MinVolatility => self.min_volatility_pg(problem),
                    Objective::MaxSharpe => self.max_sharpe_pg(problem),
                };
                (w, it, conv, 0)
            }
            SolverKind::RandomSearch => {
                let (w, repaired) = self.random_search(problem, objective, rng);
                (w, self.config.search_trials, true, repaired)
            }
        };

        if !converged {
            warn!(
                ?objective,
                iterations, "projected gradient stopped at the iteration limit"
            );
        }

        let expected_return = portfolio_return(&weights, problem.expected_returns);
        let volatility = portfolio_volatility(&weights, problem.covariance);
        let sharpe = sharpe_ratio(expected_return, volatility, problem.risk_free_rate);
        if !(expected_return.is_finite() && volatility.is_finite()) {
            return Err(AnalyticsError::Numerical(format!(
                "{objective:?} optimization produced non-finite statistics"
            )));
        }
        debug!(?objective, expected_return, volatility, sharpe, iterations, "optimized");

        Ok(OptimizedWeights {
            weights,
            expected_return,
            volatility,
            sharpe,
            objective,
            solver: self.config.solver,
            iterations,
            converged,
            bound_violations_repaired: repaired,
        })
    }

    // -----------------------------------------------------------------------
    // Projected gradient
    // -----------------------------------------------------------------------

    /// Minimize wᵗΣw with a fixed step 1/L, L = 2·λmax(Σ).
    fn min_volatility_pg(&self, p: &OptimizationProblem<'_>) -> (Vec<f64>, usize, bool) {
        let n = p.expected_returns.len();
        let mut w = project_onto_bounded_simplex(&equal_weights(n), &p.bounds);
        let lipschitz = 2.0 * linalg::largest_eigenvalue(p.covariance, 500);
        if lipschitz <= 0.0 {
            return (w, 0, true);
        }
        let step = 1.0 / lipschitz;

        for it in 1..=self.config.max_iterations {
            let grad = linalg::mat_vec(p.covariance, &w);
            let candidate: Vec<f64> = w
                .iter()
                .zip(&grad)
                .map(|(wi, gi)| wi - step * 2.0 * gi)
                .collect();
            let next = project_onto_bounded_simplex(&candidate, &p.bounds);
            let delta = max_abs_diff(&next, &w);
            w = next;
            if delta < self.config.tolerance {
                return (w, it, true);
            }
        }
        (w, self.config.max_iterations, false)
    }

    /// Maximize the Sharpe ratio by projected gradient ascent with Armijo
    /// backtracking, from several starting points; keeps the best.
    fn max_sharpe_pg(&self, p: &OptimizationProblem<'_>) -> (Vec<f64>, usize, bool) {
        let n = p.expected_returns.len();
        let mut starts = vec![project_onto_bounded_simplex(&equal_weights(n), &p.bounds)];
        starts.push(self.min_volatility_pg(p).0);
        if let Some(best_asset) = argmax(p.expected_returns) {
            let mut tilt = vec![0.0; n];
            tilt[best_asset] = 1.0;
            starts.push(project_onto_bounded_simplex(&tilt, &p.bounds));
        }

        let mut best: Option<(Vec<f64>, f64)> = None;
        let mut total_iterations = 0;
        let mut all_converged = true;
        for start in starts {
            let (w, it, conv) = self.ascend_sharpe(p, start);
            total_iterations += it;
            all_converged &= conv;
            let s = sharpe_of(p, &w);
            if best.as_ref().is_none_or(|(_, bs)| s > *bs) {
                best = Some((w, s));
            }
        }
        let weights = best.map(|(w, _)| w).unwrap_or_else(|| equal_weights(n));
        (weights, total_iterations, all_converged)
    }

    fn ascend_sharpe(&self, p: &OptimizationProblem<'_>, start: Vec<f64>) -> (Vec<f64>, usize, bool) {
        let mut w = start;
        let mut s = sharpe_of(p, &w);
        let mut step = 1.0;

        for it in 1..=self.config.max_iterations {
            let grad = sharpe_gradient(p, &w);
            let mut accepted = None;
            while step > 1e-14 {
                let candidate: Vec<f64> = w.iter().zip(&grad).map(|(wi, gi)| wi + step * gi).collect();
                let next = project_onto_bounded_simplex(&candidate, &p.bounds);
                let s_next = sharpe_of(p, &next);
                let moved: f64 = next.iter().zip(&w).zip(&grad).map(|((a, b), g)| (a - b) * g).sum();
                if s_next >= s + 1e-4 * moved {
                    accepted = Some((next, s_next));
                    break;
                }
                step *= 0.5;
            }
            let Some((next, s_next)) = accepted else {
                return (w, it, true);
            };
            let delta = max_abs_diff(&next, &w);
            let gain = s_next - s;
            w = next;
            s = s_next;
            if delta < self.config.tolerance || gain.abs() < self.config.tolerance * 1e-2 {
                return (w, it, true);
            }
            step = (step * 2.0).min(1.0);
        }
        (w, self.config.max_iterations, false)
    }

    // -----------------------------------------------------------------------
    // Random search
    // -----------------------------------------------------------------------

    fn random_search<R: Rng + ?Sized>(
        &self,
        p: &OptimizationProblem<'_>,
        objective: Objective,
        rng: &mut R,
    ) -> (Vec<f64>, usize) {
        let n = p.expected_returns.len();
        let mut best_w = project_onto_bounded_simplex(&equal_weights(n), &p.bounds);
        let mut best_score = score(p, objective, &best_w);
        let mut repaired = 0;

        for _ in 0..self.config.search_trials {
            let sample = random_bounded_weights(rng, n, &p.bounds);
            repaired += sample.repaired as usize;
            let s = score(p, objective, &sample.weights);
            if s > best_score {
                best_score = s;
                best_w = sample.weights;
            }
        }
        if repaired > 0 {
            debug!(
                repaired,
                trials = self.config.search_trials,
                "random search samples left their bounds after renormalization"
            );
        }
        (best_w, repaired)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn validate_problem(p: &OptimizationProblem<'_>) -> AnalyticsResult<()> {
    let n = p.expected_returns.len();
    if n == 0 {
        return Err(AnalyticsError::validation(
            "expected_returns",
            "At least one asset is required",
        ));
    }
    if p.covariance.len() != n || p.covariance.iter().any(|r| r.len() != n) {
        return Err(AnalyticsError::validation(
            "covariance",
            format!("Covariance must be {n}x{n}"),
        ));
    }
    if p.expected_returns.iter().any(|x| !x.is_finite())
        || p.covariance.iter().flatten().any(|x| !x.is_finite())
    {
        return Err(AnalyticsError::Numerical(
            "Non-finite expected returns or covariance".into(),
        ));
    }
    if !is_symmetric(p.covariance, 1e-10) {
        return Err(AnalyticsError::Numerical("Covariance matrix is not symmetric".into()));
    }
    if (0..n).any(|i| p.covariance[i][i] < 0.0) {
        return Err(AnalyticsError::NotPositiveSemiDefinite {
            context: "optimizer covariance".into(),
        });
    }
    p.bounds.validate()?;
    p.bounds.check_feasible(n)
}

fn sharpe_of(p: &OptimizationProblem<'_>, w: &[f64]) -> f64 {
    let ret = portfolio_return(w, p.expected_returns);
    let vol = portfolio_volatility(w, p.covariance);
    sharpe_ratio(ret, vol, p.risk_free_rate)
}

fn score(p: &OptimizationProblem<'_>, objective: Objective, w: &[f64]) -> f64 {
    match objective {
        Objective::MaxSharpe => sharpe_of(p, w),
        Objective::MinVolatility => -portfolio_volatility(w, p.covariance),
    }
}

/// ∇S = μ/σ − (μᵗw − rf)·Σw/σ³
fn sharpe_gradient(p: &OptimizationProblem<'_>, w: &[f64]) -> Vec<f64> {
    let vol = portfolio_volatility(w, p.covariance);
    if vol <= 0.0 {
        return p.expected_returns.to_vec();
    }
    let excess = portfolio_return(w, p.expected_returns) - p.risk_free_rate;
    let sigma_w = linalg::mat_vec(p.covariance, w);
    p.expected_returns
        .iter()
        .zip(&sigma_w)
        .map(|(mu, sw)| mu / vol - excess * sw / vol.powi(3))
        .collect()
}

fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

fn argmax(x: &[f64]) -> Option<usize> {
    x.iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
