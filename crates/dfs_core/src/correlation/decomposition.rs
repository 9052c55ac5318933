//! Cholesky factorization with diagonal repair.
//!
//! A matrix that fails to factor gets `jitter` added to its diagonal
//! (rescaled back to unit diagonal) and is retried once. If that also fails
//! the factor is the identity and the result is flagged as degraded to
//! independence.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use super::CorrelationMatrix;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DecompositionStatus {
    /// Factored as built
    Exact,
    /// Factored after shrinking toward the identity by `jitter`
    Repaired { jitter: f64 },
    /// Could not be factored; sampling treats players as independent
    Independent,
}

/// Lower-triangular factor `L` with `L·Lᵀ` equal to the sampling matrix.
#[derive(Debug, Clone)]
pub struct CholeskyFactor {
    lower: DMatrix<f64>,
    status: DecompositionStatus,
}

impl CholeskyFactor {
    pub fn identity(n: usize) -> Self {
        Self { lower: DMatrix::identity(n, n), status: DecompositionStatus::Independent }
    }

    pub fn dim(&self) -> usize {
        self.lower.nrows()
    }

    pub fn status(&self) -> DecompositionStatus {
        self.status
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.status, DecompositionStatus::Independent)
    }

    pub fn lower(&self) -> &DMatrix<f64> {
        &self.lower
    }

    /// `out = L · z` for a vector of independent standard normals.
    #[inline]
    pub fn correlate(&self, z: &[f64], out: &mut [f64]) {
        let n = self.dim();
        debug_assert_eq!(z.len(), n);
        debug_assert_eq!(out.len(), n);
        if matches!(self.status, DecompositionStatus::Independent) {
            out.copy_from_slice(z);
            return;
        }
        for i in 0..n {
            let mut acc = 0.0;
            for j in 0..=i {
                acc += self.lower[(i, j)] * z[j];
            }
            out[i] = acc;
        }
    }

    /// The matrix actually used for sampling, `L · Lᵀ`.
    pub fn sampling_matrix(&self) -> DMatrix<f64> {
        &self.lower * self.lower.transpose()
    }
}

/// Factor a correlation matrix, repairing it once with a fixed jitter.
pub fn decompose(matrix: &CorrelationMatrix, jitter: f64) -> CholeskyFactor {
    let n = matrix.size();
    if n == 0 {
        return CholeskyFactor { lower: DMatrix::zeros(0, 0), status: DecompositionStatus::Exact };
    }

    let dense = matrix.to_dmatrix();
    if let Some(chol) = dense.clone().cholesky() {
        return CholeskyFactor { lower: chol.l(), status: DecompositionStatus::Exact };
    }
    repair(dense, jitter)
}

/// Like [`decompose`], but sizes the jitter from the smallest eigenvalue.
///
/// The jitter is at least `min_jitter` and just large enough to lift the
/// spectrum above zero, so a single jittered retry is enough. When that
/// would exceed `max_jitter` the retry is skipped: any jitter within bounds
/// would leave the retry failing, so the result is the same identity factor
/// a failed retry produces and sampling degrades to independence.
pub fn decompose_bounded(matrix: &CorrelationMatrix, min_jitter: f64, max_jitter: f64) -> CholeskyFactor {
    let n = matrix.size();
    if n == 0 {
        return CholeskyFactor { lower: DMatrix::zeros(0, 0), status: DecompositionStatus::Exact };
    }

    let dense = matrix.to_dmatrix();
    if let Some(chol) = dense.clone().cholesky() {
        return CholeskyFactor { lower: chol.l(), status: DecompositionStatus::Exact };
    }

    let min_eig = dense.clone().symmetric_eigen().eigenvalues.iter().copied().fold(f64::INFINITY, f64::min);
    let needed = if min_eig.is_finite() { (-min_eig + 1e-6).max(min_jitter) } else { f64::INFINITY };
    if needed > max_jitter {
        tracing::warn!(
            "Correlation matrix ({}x{}) needs jitter {:.4} > {:.4}; sampling players independently",
            n,
            n,
            needed,
            max_jitter
        );
        return CholeskyFactor::identity(n);
    }
    repair(dense, needed)
}

fn repair(dense: DMatrix<f64>, jitter: f64) -> CholeskyFactor {
    let n = dense.nrows();
    let jitter = jitter.max(f64::EPSILON);
    let repaired = (dense + DMatrix::identity(n, n) * jitter) / (1.0 + jitter);
    if let Some(chol) = repaired.cholesky() {
        tracing::info!("Correlation matrix ({}x{}) repaired with diagonal jitter {}", n, n, jitter);
        return CholeskyFactor { lower: chol.l(), status: DecompositionStatus::Repaired { jitter } };
    }

    tracing::warn!(
        "Correlation matrix ({}x{}) is not positive definite after repair; sampling players independently",
        n,
        n
    );
    CholeskyFactor::identity(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inconsistent() -> CorrelationMatrix {
        // a~b and b~c strongly, but a and c strongly opposed: not PSD
        let mut m = CorrelationMatrix::identity(3);
        m.set(0, 1, 0.9);
        m.set(1, 2, 0.9);
        m.set(0, 2, -0.9);
        m
    }

    fn min_eigenvalue(m: &DMatrix<f64>) -> f64 {
        m.clone().symmetric_eigen().eigenvalues.iter().copied().fold(f64::INFINITY, f64::min)
    }

    #[test]
    fn test_valid_matrix_factors_exactly() {
        let mut m = CorrelationMatrix::identity(3);
        m.set(0, 1, 0.5);
        m.set(1, 2, 0.3);
        let factor = decompose(&m, 0.05);
        assert_eq!(factor.status(), DecompositionStatus::Exact);
        let back = factor.sampling_matrix();
        assert!((back[(0, 1)] - 0.5).abs() < 1e-9);
        assert!((back[(1, 2)] - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_small_jitter_degrades_to_independence() {
        let factor = decompose(&inconsistent(), 0.05);
        assert!(factor.is_degraded());
        assert_eq!(factor.sampling_matrix(), DMatrix::identity(3, 3));
    }

    #[test]
    fn test_large_jitter_repairs_to_psd_unit_diagonal() {
        let factor = decompose(&inconsistent(), 1.0);
        assert!(matches!(factor.status(), DecompositionStatus::Repaired { .. }));
        let sampling = factor.sampling_matrix();
        assert!(min_eigenvalue(&sampling) >= -1e-9);
        for i in 0..3 {
            assert!((sampling[(i, i)] - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_bounded_repair_sizes_jitter_from_spectrum() {
        let mut m = CorrelationMatrix::identity(3);
        m.set(0, 1, 0.8);
        m.set(1, 2, 0.8);
        m.set(0, 2, 0.0);
        // smallest eigenvalue is 1 - 0.8·√2 ≈ -0.131
        let factor = decompose_bounded(&m, 0.01, 0.5);
        match factor.status() {
            DecompositionStatus::Repaired { jitter } => assert!(jitter > 0.13 && jitter < 0.14),
            other => panic!("expected repair, got {:?}", other),
        }
        assert!(min_eigenvalue(&factor.sampling_matrix()) >= -1e-9);

        assert!(decompose_bounded(&inconsistent(), 0.01, 0.5).is_degraded());
    }

    #[test]
    fn test_correlate_identity_passthrough() {
        let factor = CholeskyFactor::identity(2);
        let mut out = [0.0; 2];
        factor.correlate(&[0.3, -1.2], &mut out);
        assert_eq!(out, [0.3, -1.2]);
    }
}
