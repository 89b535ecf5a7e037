//! Linear solve step.

use super::matrix::{LinearSystem, SparseMatrix};
use super::SINGULAR_PIVOT;
use crate::error::{PnflowError, Result};

/// Black-box solver for A·x = b.
pub trait LinearSolver {
    /// Solve the system, failing with [`PnflowError::SingularMatrix`] when it
    /// is not well posed.
    fn solve(&mut self, system: &LinearSystem) -> Result<Vec<f64>>;
}

/// Banded LU decomposition with partial pivoting.
///
/// The band is taken from the matrix pattern, so a lattice numbered layer by
/// layer factors in O(n·kl·(kl+ku)) instead of O(n³). Rows are equilibrated
/// to unit max-norm first; pore conductances are often tiny (1e-15 and
/// below) and an absolute pivot threshold would otherwise reject them.
#[derive(Debug, Default)]
pub struct BandedLu {
    /// Matrix dimension
    size: usize,
    /// Lower bandwidth
    lower: usize,
    /// Upper bandwidth
    upper: usize,
    /// Band rows, `2*lower + upper + 1` wide to hold pivoting fill-in
    band: Vec<f64>,
    /// Gauss multipliers, `lower` per elimination step
    multipliers: Vec<f64>,
    /// Pivot row chosen at each step
    pivots: Vec<usize>,
    /// Row equilibration factors
    scale: Vec<f64>,
}

impl BandedLu {
    /// Create a new solver.
    pub fn new() -> Self {
        Self::default()
    }

    fn width(&self) -> usize {
        2 * self.lower + self.upper + 1
    }

    fn idx(&self, row: usize, col: usize) -> usize {
        row * self.width() + (col + self.lower - row)
    }

    /// Perform the LU decomposition of `a`.
    pub fn factor(&mut self, a: &SparseMatrix) -> Result<()> {
        let n = a.size();
        let (lower, upper) = a.bandwidths();
        self.size = n;
        self.lower = lower;
        self.upper = upper;

        self.scale.clear();
        for i in 0..n {
            let max = a.row(i).fold(0.0f64, |m, (_, v)| m.max(v.abs()));
            if max == 0.0 || !max.is_finite() {
                return Err(PnflowError::SingularMatrix { row: i });
            }
            self.scale.push(1.0 / max);
        }

        let width = self.width();
        self.band.clear();
        self.band.resize(n * width, 0.0);
        for i in 0..n {
            for (j, value) in a.row(i).filter(|&(_, v)| v != 0.0) {
                let k = self.idx(i, j);
                self.band[k] = value * self.scale[i];
            }
        }
        self.multipliers.clear();
        self.multipliers.resize(n * lower, 0.0);
        self.pivots.clear();
        self.pivots.resize(n, 0);

        for k in 0..n {
            let last = (k + lower).min(n - 1);
            let right = (k + lower + upper).min(n - 1);

            // Find pivot
            let mut max_val = self.band[self.idx(k, k)].abs();
            let mut max_row = k;
            for i in (k + 1)..=last {
                let val = self.band[self.idx(i, k)].abs();
                if val > max_val {
                    max_val = val;
                    max_row = i;
                }
            }

            if max_val < SINGULAR_PIVOT {
                return Err(PnflowError::SingularMatrix { row: k });
            }
            self.pivots[k] = max_row;

            // Swap rows if needed
            if max_row != k {
                for j in k..=right {
                    let (a_idx, b_idx) = (self.idx(k, j), self.idx(max_row, j));
                    self.band.swap(a_idx, b_idx);
                }
            }

            // Eliminate
            let pivot = self.band[self.idx(k, k)];
            for i in (k + 1)..=last {
                let ik = self.idx(i, k);
                let factor = self.band[ik] / pivot;
                self.multipliers[k * lower + (i - k - 1)] = factor;
                self.band[ik] = 0.0;
                if factor != 0.0 {
                    for j in (k + 1)..=right {
                        let kj = self.band[self.idx(k, j)];
                        let ij = self.idx(i, j);
                        self.band[ij] -= factor * kj;
                    }
                }
            }
        }

        Ok(())
    }

    /// Solve using the pre-computed decomposition.
    pub fn solve_factored(&self, b: &[f64]) -> Vec<f64> {
        let n = self.size;
        let lower = self.lower;

        // Apply scaling, pivots and L (forward substitution)
        let mut y: Vec<f64> = b.iter().zip(&self.scale).map(|(v, s)| v * s).collect();
        for k in 0..n {
            let p = self.pivots[k];
            if p != k {
                y.swap(k, p);
            }
            let yk = y[k];
            for i in (k + 1)..=(k + lower).min(n - 1) {
                y[i] -= self.multipliers[k * lower + (i - k - 1)] * yk;
            }
        }

        // Back substitution (U * x = y)
        let mut x = vec![0.0; n];
        for i in (0..n).rev() {
            let mut sum = y[i];
            for j in (i + 1)..=(i + lower + self.upper).min(n - 1) {
                sum -= self.band[self.idx(i, j)] * x[j];
            }
            x[i] = sum / self.band[self.idx(i, i)];
        }
        x
    }
}

impl LinearSolver for BandedLu {
    fn solve(&mut self, system: &LinearSystem) -> Result<Vec<f64>> {
        if system.size() == 0 {
            return Ok(Vec::new());
        }
        self.factor(&system.a)?;
        Ok(self.solve_factored(&system.b))
    }
}
