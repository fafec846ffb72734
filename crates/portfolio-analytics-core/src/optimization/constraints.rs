//! Feasible-set helpers for long-only weight vectors with per-asset bounds.

use rand::Rng;

use crate::config::WeightBounds;

/// Tolerance used when checking a vector against its bounds.
pub const BOUND_TOLERANCE: f64 = 1e-9;

/// Equal weights for n assets.
pub fn equal_weights(n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    vec![1.0 / n as f64; n]
}

pub fn satisfies_bounds(w: &[f64], bounds: &WeightBounds, tol: f64) -> bool {
    let sum: f64 = w.iter().sum();
    (sum - 1.0).abs() <= tol
        && w
            .iter()
            .all(|x| *x >= bounds.min_weight - tol && *x <= bounds.max_weight + tol)
}

/// Euclidean projection of `v` onto `{w : Σw = 1, min ≤ wᵢ ≤ max}`.
///
/// The projection is `wᵢ = clamp(vᵢ - τ, min, max)` for the unique shift τ
/// making the sum 1, found by bisection. The bound set must be feasible.
pub fn project_onto_bounded_simplex(v: &[f64], bounds: &WeightBounds) -> Vec<f64> {
    let (lo, hi) = (bounds.min_weight, bounds.max_weight);
    let clamped_sum = |tau: f64| -> f64 { v.iter().map(|x| (x - tau).clamp(lo, hi)).sum() };

    let vmax = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let vmin = v.iter().copied().fold(f64::INFINITY, f64::min);
    // clamped_sum is non-increasing in tau: n·hi at tau_lo, n·lo at tau_hi.
    let mut tau_lo = vmin - hi;
    let mut tau_hi = vmax - lo;
    for _ in 0..200 {
        let mid = 0.5 * (tau_lo + tau_hi);
        if clamped_sum(mid) > 1.0 {
            tau_lo = mid;
        } else {
            tau_hi = mid;
        }
        if tau_hi - tau_lo < 1e-15 {
            break;
        }
    }
    let tau = 0.5 * (tau_lo + tau_hi);
    let mut w: Vec<f64> = v.iter().map(|x| (x - tau).clamp(lo, hi)).collect();

    // Spread the residual of the bisection over coordinates with slack.
    let residual = 1.0 - w.iter().sum::<f64>();
    if residual != 0.0 {
        for x in w.iter_mut() {
            let room = if residual > 0.0 { hi - *x } else { *x - lo };
            if room >= residual.abs() {
                *x += residual;
                break;
            }
        }
    }
    w
}

/// One random bounded weight vector.
#[derive(Debug, Clone)]
pub struct SampledWeights {
    pub weights: Vec<f64>,
    /// The clip-then-renormalize draw left its bounds and was projected back.
    pub repaired: bool,
}

/// Draw a positive vector, normalize it, clip to bounds and renormalize.
///
/// The second normalization can push components back outside the bounds.
/// When that happens the vector is projected onto the feasible set and the
/// sample is marked as repaired so callers can report how often it occurs.
pub fn random_bounded_weights<R: Rng + ?Sized>(
    rng: &mut R,
    n: usize,
    bounds: &WeightBounds,
) -> SampledWeights {
    let raw: Vec<f64> = (0..n).map(|_| 1.0 - rng.gen::<f64>()).collect();
    let total: f64 = raw.iter().sum();
    let clipped: Vec<f64> = raw
        .iter()
        .map(|x| (x / total).clamp(bounds.min_weight, bounds.max_weight))
        .collect();
    let clipped_total: f64 = clipped.iter().sum();
    let weights: Vec<f64> = clipped.iter().map(|x| x / clipped_total).collect();

    if satisfies_bounds(&weights, bounds, BOUND_TOLERANCE) {
        SampledWeights {
            weights,
            repaired: false,
        }
    } else {
        SampledWeights {
            weights: project_onto_bounded_simplex(&weights, bounds),
            repaired: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SEED: u64 = 42;

    #[test]
    fn test_projection_hits_simplex() {
        let b = WeightBounds::LONG_ONLY;
        let w = project_onto_bounded_simplex(&[0.8, 0.6, -0.2], &b);
        assert!(satisfies_bounds(&w, &b, 1e-12), "{w:?}");
        // Known answer: tau = 0.2 -> (0.6, 0.4, 0)
        assert!((w[0] - 0.6).abs() < 1e-9);
        assert!((w[1] - 0.4).abs() < 1e-9);
        assert!(w[2].abs() < 1e-12);
    }

    #[test]
    fn test_projection_respects_caps() {
        let b = WeightBounds::new(0.05, 0.30).unwrap();
        let w = project_onto_bounded_simplex(&[5.0, 0.0, 0.0, 0.0, 0.0], &b);
        assert!(satisfies_bounds(&w, &b, 1e-12), "{w:?}");
        assert!((w[0] - 0.30).abs() < 1e-9);
    }

    #[test]
    fn test_projection_of_feasible_point_is_identity() {
        let b = WeightBounds::new(0.1, 0.5).unwrap();
        let v = [0.2, 0.3, 0.5];
        let w = project_onto_bounded_simplex(&v, &b);
        for (a, e) in w.iter().zip(v) {
            assert!((a - e).abs() < 1e-12);
        }
    }

    #[test]
    fn test_random_weights_always_feasible() {
        let mut rng = StdRng::seed_from_u64(SEED);
        let b = WeightBounds::default();
        let mut repaired = 0;
        for _ in 0..2_000 {
            let s = random_bounded_weights(&mut rng, 5, &b);
            assert!(satisfies_bounds(&s.weights, &b, BOUND_TOLERANCE), "{:?}", s.weights);
            repaired += s.repaired as usize;
        }
        // With 5 assets capped at 30% renormalization regularly overshoots.
        assert!(repaired > 0, "expected some repaired samples");
    }

    #[test]
    fn test_equal_weights() {
        assert_eq!(equal_weights(4), vec![0.25; 4]);
        assert!(equal_weights(0).is_empty());
    }
}
