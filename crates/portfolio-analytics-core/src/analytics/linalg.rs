//! Dense linear algebra on small row-major `Vec<Vec<f64>>` matrices.

use crate::error::AnalyticsError;
use crate::AnalyticsResult;

pub type Matrix = Vec<Vec<f64>>;

pub fn identity(n: usize) -> Matrix {
    let mut m = vec![vec![0.0; n]; n];
    for (i, row) in m.iter_mut().enumerate() {
        row[i] = 1.0;
    }
    m
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn mat_vec(m: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    m.iter().map(|row| dot(row, v)).collect()
}

pub fn mat_mul(a: &[Vec<f64>], b: &[Vec<f64>]) -> Matrix {
    let cols = b.first().map_or(0, Vec::len);
    a.iter()
        .map(|row| {
            (0..cols)
                .map(|j| row.iter().zip(b).map(|(x, brow)| x * brow[j]).sum())
                .collect()
        })
        .collect()
}

pub fn transpose(m: &[Vec<f64>]) -> Matrix {
    let cols = m.first().map_or(0, Vec::len);
    (0..cols)
        .map(|j| m.iter().map(|row| row[j]).collect())
        .collect()
}

pub fn mat_scale(m: &[Vec<f64>], s: f64) -> Matrix {
    m.iter()
        .map(|row| row.iter().map(|x| x * s).collect())
        .collect()
}

pub fn is_symmetric(m: &[Vec<f64>], tol: f64) -> bool {
    let n = m.len();
    m.iter().all(|row| row.len() == n)
        && (0..n).all(|i| (0..i).all(|j| (m[i][j] - m[j][i]).abs() <= tol))
}

/// Gauss-Jordan inverse with partial pivoting.
pub fn inverse(m: &[Vec<f64>], context: &str) -> AnalyticsResult<Matrix> {
    let n = m.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    let scale = m
        .iter()
        .flat_map(|r| r.iter())
        .fold(0.0_f64, |acc, x| acc.max(x.abs()));
    if scale == 0.0 || !scale.is_finite() {
        return Err(AnalyticsError::SingularMatrix {
            context: context.to_string(),
        });
    }

    let mut aug: Matrix = m
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut r = Vec::with_capacity(2 * n);
            r.extend_from_slice(row);
            r.extend((0..n).map(|j| if i == j { 1.0 } else { 0.0 }));
            r
        })
        .collect();

    for col in 0..n {
        let (pivot_row, pivot_abs) = (col..n)
            .map(|r| (r, aug[r][col].abs()))
            .fold((col, -1.0), |best, cur| if cur.1 > best.1 { cur } else { best });
        if pivot_abs <= scale * 1e-14 {
            return Err(AnalyticsError::SingularMatrix {
                context: context.to_string(),
            });
        }
        aug.swap(col, pivot_row);

        let pivot = aug[col][col];
        for cell in aug[col].iter_mut() {
            *cell /= pivot;
        }
        let pivot_vals = aug[col].clone();
        for (r, row) in aug.iter_mut().enumerate() {
            if r == col {
                continue;
            }
            let factor = row[col];
            if factor != 0.0 {
                for (cell, pv) in row.iter_mut().zip(&pivot_vals) {
                    *cell -= factor * pv;
                }
            }
        }
    }

    let inv: Matrix = aug.into_iter().map(|row| row[n..].to_vec()).collect();
    if inv.iter().flatten().any(|x| !x.is_finite()) {
        return Err(AnalyticsError::SingularMatrix {
            context: context.to_string(),
        });
    }
    Ok(inv)
}

/// Lower-triangular `L` with `L·Lᵗ = m` for a positive semi-definite `m`.
///
/// Pivots that vanish (relative to the largest diagonal entry) get a zero
/// column, so degenerate inputs such as a zero-variance asset still
/// factorize. A clearly negative pivot is an error.
pub fn cholesky(m: &[Vec<f64>], context: &str) -> AnalyticsResult<Matrix> {
    let n = m.len();
    if !is_symmetric(m, 1e-10 * m.iter().flatten().fold(1.0_f64, |a, x| a.max(x.abs()))) {
        return Err(AnalyticsError::Numerical(format!(
            "{context}: covariance matrix is not symmetric"
        )));
    }
    let max_diag = (0..n).fold(0.0_f64, |acc, i| acc.max(m[i][i]));
    let zero_tol = max_diag * 1e-12;
    let mut l = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[i][k] * l[j][k]).sum();
            if i == j {
                let pivot = m[i][i] - sum;
                if pivot < -zero_tol.max(1e-300) * 1e4 {
                    return Err(AnalyticsError::NotPositiveSemiDefinite {
                        context: context.to_string(),
                    });
                }
                l[i][i] = if pivot <= zero_tol { 0.0 } else { pivot.sqrt() };
            } else if l[j][j] > 0.0 {
                l[i][j] = (m[i][j] - sum) / l[j][j];
            }
        }
    }

    if l.iter().flatten().any(|x| !x.is_finite()) {
        return Err(AnalyticsError::Numerical(format!(
            "{context}: non-finite Cholesky factor"
        )));
    }
    Ok(l)
}

/// Largest eigenvalue of a symmetric PSD matrix by power iteration.
pub fn largest_eigenvalue(m: &[Vec<f64>], iterations: usize) -> f64 {
    let n = m.len();
    if n == 0 {
        return 0.0;
    }
    let mut v = vec![1.0 / (n as f64).sqrt(); n];
    let mut lambda = 0.0;
    for _ in 0..iterations {
        let w = mat_vec(m, &v);
        let norm = dot(&w, &w).sqrt();
        if norm == 0.0 {
            return 0.0;
        }
        lambda = dot(&v, &w);
        v = w.into_iter().map(|x| x / norm).collect();
    }
    lambda.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: &[Vec<f64>], b: &[Vec<f64>], tol: f64) -> bool {
        a.iter()
            .flatten()
            .zip(b.iter().flatten())
            .all(|(x, y)| (x - y).abs() < tol)
    }

    #[test]
    fn test_inverse_round_trip() {
        let m = vec![vec![4.0, 1.0, 0.5], vec![1.0, 3.0, 0.2], vec![0.5, 0.2, 2.0]];
        let inv = inverse(&m, "test").unwrap();
        assert!(close(&mat_mul(&m, &inv), &identity(3), 1e-12));
    }

    #[test]
    fn test_inverse_singular() {
        let m = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert!(matches!(
            inverse(&m, "test"),
            Err(AnalyticsError::SingularMatrix { .. })
        ));
    }

    #[test]
    fn test_cholesky_reconstructs() {
        let m = vec![vec![0.04, 0.006], vec![0.006, 0.09]];
        let l = cholesky(&m, "test").unwrap();
        assert_eq!(l[0][1], 0.0);
        assert!(close(&mat_mul(&l, &transpose(&l)), &m, 1e-15));
    }

    #[test]
    fn test_cholesky_zero_matrix() {
        let l = cholesky(&[vec![0.0]], "test").unwrap();
        assert_eq!(l, vec![vec![0.0]]);
    }

    #[test]
    fn test_cholesky_rejects_indefinite() {
        let m = vec![vec![1.0, 2.0], vec![2.0, 1.0]];
        assert!(matches!(
            cholesky(&m, "test"),
            Err(AnalyticsError::NotPositiveSemiDefinite { .. })
        ));
    }

    #[test]
    fn test_largest_eigenvalue_diagonal() {
        let m = vec![vec![3.0, 0.0], vec![0.0, 1.0]];
        assert!((largest_eigenvalue(&m, 200) - 3.0).abs() < 1e-9);
    }
}
