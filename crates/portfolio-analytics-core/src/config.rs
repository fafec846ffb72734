use serde::{Deserialize, Serialize};

use crate::error::AnalyticsError;
use crate::types::Rate;
use crate::AnalyticsResult;

/// Market and engine assumptions passed explicitly into every operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: Rate,
    #[serde(default = "default_trading_days")]
    pub trading_days_per_year: u32,
    #[serde(default)]
    pub weight_bounds: WeightBounds,
    /// Fall back to progressively looser bounds when the configured
    /// bounds cannot be satisfied by the requested asset count.
    #[serde(default = "default_true")]
    pub relax_infeasible_bounds: bool,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    #[serde(default = "default_frontier_samples")]
    pub frontier_samples: usize,
    /// Fixed seed for every random draw of the request. `None` draws from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Wall-clock budget for simulations.
    #[serde(default)]
    pub max_duration_ms: Option<u64>,
    #[serde(default = "default_weight_sum_tolerance")]
    pub weight_sum_tolerance: f64,
}

fn default_risk_free_rate() -> Rate {
    0.02
}

fn default_trading_days() -> u32 {
    252
}

fn default_true() -> bool {
    true
}

fn default_frontier_samples() -> usize {
    2_000
}

fn default_weight_sum_tolerance() -> f64 {
    1e-6
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            risk_free_rate: default_risk_free_rate(),
            trading_days_per_year: default_trading_days(),
            weight_bounds: WeightBounds::default(),
            relax_infeasible_bounds: true,
            optimizer: OptimizerConfig::default(),
            frontier_samples: default_frontier_samples(),
            seed: None,
            max_duration_ms: None,
            weight_sum_tolerance: default_weight_sum_tolerance(),
        }
    }
}

impl EngineConfig {
    /// Number of periods used to annualize daily statistics.
    pub fn periods_per_year(&self) -> f64 {
        self.trading_days_per_year as f64
    }

    pub fn daily_risk_free_rate(&self) -> f64 {
        self.risk_free_rate / self.periods_per_year()
    }

    pub fn validate(&self) -> AnalyticsResult<()> {
        if !self.risk_free_rate.is_finite() {
            return Err(AnalyticsError::validation(
                "risk_free_rate",
                "Risk-free rate must be finite",
            ));
        }
        if self.trading_days_per_year == 0 {
            return Err(AnalyticsError::validation(
                "trading_days_per_year",
                "Must be positive",
            ));
        }
        if !(self.weight_sum_tolerance > 0.0 && self.weight_sum_tolerance < 0.1) {
            return Err(AnalyticsError::validation(
                "weight_sum_tolerance",
                "Must lie in (0, 0.1)",
            ));
        }
        self.weight_bounds.validate()?;
        self.optimizer.validate()
    }
}

/// Per-asset weight bounds shared by every asset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightBounds {
    pub min_weight: f64,
    pub max_weight: f64,
}

impl Default for WeightBounds {
    fn default() -> Self {
        WeightBounds {
            min_weight: 0.01,
            max_weight: 0.30,
        }
    }
}

impl WeightBounds {
    pub const LONG_ONLY: WeightBounds = WeightBounds {
        min_weight: 0.0,
        max_weight: 1.0,
    };

    pub fn new(min_weight: f64, max_weight: f64) -> AnalyticsResult<Self> {
        let b = WeightBounds {
            min_weight,
            max_weight,
        };
        b.validate()?;
        Ok(b)
    }

    pub fn validate(&self) -> AnalyticsResult<()> {
        if !(self.min_weight.is_finite() && self.max_weight.is_finite()) {
            return Err(AnalyticsError::validation(
                "weight_bounds",
                "Bounds must be finite",
            ));
        }
        if self.min_weight < 0.0 || self.max_weight > 1.0 || self.min_weight > self.max_weight {
            return Err(AnalyticsError::validation(
                "weight_bounds",
                format!(
                    "Require 0 <= min ({}) <= max ({}) <= 1",
                    self.min_weight, self.max_weight
                ),
            ));
        }
        Ok(())
    }

    /// A weight vector of `n` assets summing to 1 exists iff n·min <= 1 <= n·max.
    pub fn is_feasible_for(&self, n: usize) -> bool {
        let n = n as f64;
        n > 0.0 && n * self.min_weight <= 1.0 + 1e-12 && n * self.max_weight >= 1.0 - 1e-12
    }

    pub fn check_feasible(&self, n: usize) -> AnalyticsResult<()> {
        if self.is_feasible_for(n) {
            Ok(())
        } else {
            Err(AnalyticsError::InfeasibleBounds {
                assets: n,
                min_weight: self.min_weight,
                max_weight: self.max_weight,
            })
        }
    }

    /// Bound sets tried in order when the configured bounds are infeasible.
    pub fn relaxation_ladder(&self) -> Vec<WeightBounds> {
        let mut ladder = vec![*self];
        for (lo, hi) in [(0.01, 0.5), (0.01, 0.7), (0.01, 1.0), (0.0, 1.0)] {
            let b = WeightBounds {
                min_weight: lo,
                max_weight: hi,
            };
            if !ladder.contains(&b) {
                ladder.push(b);
            }
        }
        ladder
    }
}

/// Which algorithm the constrained optimizer runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverKind {
    /// Projected gradient on the bounded simplex.
    #[default]
    ProjectedGradient,
    /// Clip-and-renormalize random search, kept as a reference fallback.
    RandomSearch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    #[serde(default)]
    pub solver: SolverKind,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_search_trials")]
    pub search_trials: usize,
}

fn default_max_iterations() -> usize {
    10_000
}

fn default_tolerance() -> f64 {
    1e-10
}

fn default_search_trials() -> usize {
    10_000
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            solver: SolverKind::default(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            search_trials: default_search_trials(),
        }
    }
}

impl OptimizerConfig {
    pub fn validate(&self) -> AnalyticsResult<()> {
        if self.max_iterations == 0 {
            return Err(AnalyticsError::validation(
                "optimizer.max_iterations",
                "Must be positive",
            ));
        }
        if !(self.tolerance > 0.0) {
            return Err(AnalyticsError::validation(
                "optimizer.tolerance",
                "Must be positive",
            ));
        }
        if self.search_trials == 0 {
            return Err(AnalyticsError::validation(
                "optimizer.search_trials",
                "Must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let cfg: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.risk_free_rate, 0.02);
        assert_eq!(cfg.trading_days_per_year, 252);
        assert_eq!(cfg.weight_bounds, WeightBounds::default());
        assert_eq!(cfg.optimizer.solver, SolverKind::ProjectedGradient);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_feasibility() {
        let b = WeightBounds::default();
        assert!(!b.is_feasible_for(3), "3 x 0.30 < 1");
        assert!(b.is_feasible_for(4));
        assert!(b.is_feasible_for(100));
        assert!(!b.is_feasible_for(101), "101 x 0.01 > 1");
        assert!(matches!(
            b.check_feasible(2),
            Err(AnalyticsError::InfeasibleBounds { assets: 2, .. })
        ));
    }

    #[test]
    fn test_relaxation_ladder_ends_long_only() {
        let ladder = WeightBounds::default().relaxation_ladder();
        assert_eq!(ladder.first(), Some(&WeightBounds::default()));
        assert_eq!(ladder.last(), Some(&WeightBounds::LONG_ONLY));
        assert_eq!(ladder.len(), 5);
    }

    #[test]
    fn test_invalid_bounds() {
        assert!(WeightBounds::new(0.5, 0.4).is_err());
        assert!(WeightBounds::new(-0.1, 0.4).is_err());
        assert!(WeightBounds::new(0.0, 1.0).is_ok());
    }
}
