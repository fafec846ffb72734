use serde::{Deserialize, Serialize};

/// Sort a copy of `values` ascending (NaNs last).
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.total_cmp(b));
    v
}

/// Compute the percentile value from a **sorted** slice using linear interpolation.
/// `p` is in percent (0-100). Returns NaN for an empty slice.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] + (sorted[upper] - sorted[lower]) * frac
    }
}

/// Value-at-risk and expected-shortfall summary of a terminal-value
/// distribution, both as portfolio levels and as dollar losses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TailRisk {
    /// Portfolio value at the `(1 - confidence)` quantile.
    pub var_value: f64,
    /// `initial - var_value`
    pub var_dollar: f64,
    /// `var_dollar / initial`
    pub var_percent: f64,
    /// Mean of the values at or below `var_value`.
    pub cvar_value: f64,
    pub cvar_dollar: f64,
}

/// Tail statistics at `confidence` (e.g. 0.90 reads the 10th percentile).
pub fn tail_risk(sorted_values: &[f64], initial_value: f64, confidence: f64) -> TailRisk {
    let var_value = percentile_sorted(sorted_values, 100.0 * (1.0 - confidence));
    let tail: Vec<f64> = sorted_values
        .iter()
        .copied()
        .take_while(|v| *v <= var_value)
        .collect();
    // Linear interpolation never falls below the minimum, so the tail is
    // non-empty whenever the distribution is.
    let cvar_value = if tail.is_empty() {
        var_value
    } else {
        (tail.iter().sum::<f64>() / tail.len() as f64).min(var_value)
    };
    let var_dollar = initial_value - var_value;
    TailRisk {
        var_value,
        var_dollar,
        var_percent: if initial_value != 0.0 { var_dollar / initial_value } else { 0.0 },
        cvar_value,
        cvar_dollar: initial_value - cvar_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_interpolates() {
        let v: Vec<f64> = (1..=5).map(f64::from).collect();
        assert_eq!(percentile_sorted(&v, 0.0), 1.0);
        assert_eq!(percentile_sorted(&v, 50.0), 3.0);
        assert_eq!(percentile_sorted(&v, 100.0), 5.0);
        assert!((percentile_sorted(&v, 10.0) - 1.4).abs() < 1e-12);
        assert!(percentile_sorted(&[], 50.0).is_nan());
    }

    #[test]
    fn test_tail_risk_ordering() {
        let v: Vec<f64> = (0..100).map(|i| 90.0 + i as f64 * 0.2).collect();
        let t = tail_risk(&v, 100.0, 0.90);
        assert!(t.cvar_value <= t.var_value);
        assert!(t.cvar_dollar >= t.var_dollar);
        assert!((t.var_percent - t.var_dollar / 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_tail_risk_degenerate() {
        let v = vec![100.0; 10];
        let t = tail_risk(&v, 100.0, 0.95);
        assert_eq!(t.var_value, 100.0);
        assert_eq!(t.cvar_value, 100.0);
        assert_eq!(t.var_dollar, 0.0);
    }
}
