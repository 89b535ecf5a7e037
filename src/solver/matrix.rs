//! Sparse linear system storage.

use std::collections::BTreeMap;

/// Row-wise sparse matrix.
///
/// Each row keeps its nonzeros ordered by column, so row operations (zeroing
/// a Dirichlet row, reading the diagonal) stay cheap and iteration order is
/// deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    rows: Vec<BTreeMap<usize, f64>>,
}

impl SparseMatrix {
    /// Create an empty square matrix.
    pub fn new(size: usize) -> Self {
        Self {
            rows: vec![BTreeMap::new(); size],
        }
    }

    /// Matrix dimension.
    pub fn size(&self) -> usize {
        self.rows.len()
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.rows.iter().map(BTreeMap::len).sum()
    }

    /// Get matrix element at (row, col).
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.rows[row].get(&col).copied().unwrap_or(0.0)
    }

    /// Set matrix element at (row, col).
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.rows[row].insert(col, value);
    }

    /// Add to matrix element at (row, col).
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        *self.rows[row].entry(col).or_insert(0.0) += value;
    }

    /// Diagonal element of a row.
    pub fn diagonal(&self, row: usize) -> f64 {
        self.get(row, row)
    }

    /// Stored entries of a row as (column, value), ordered by column.
    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.rows[row].iter().map(|(&col, &value)| (col, value))
    }

    /// Replace a row by a single diagonal entry.
    pub fn set_identity_row(&mut self, row: usize) {
        self.rows[row].clear();
        self.rows[row].insert(row, 1.0);
    }

    /// Stamp a conductance between two pores.
    /// For a conductance G between pores i and j:
    ///   A[i,i] += G
    ///   A[j,j] += G
    ///   A[i,j] -= G
    ///   A[j,i] -= G
    pub fn stamp_conductance(&mut self, i: usize, j: usize, g: f64) {
        self.add(i, i, g);
        self.add(j, j, g);
        self.add(i, j, -g);
        self.add(j, i, -g);
    }

    /// Matrix-vector product A·x.
    pub fn mul_vec(&self, x: &[f64]) -> Vec<f64> {
        self.rows
            .iter()
            .map(|row| row.iter().map(|(&col, &value)| value * x[col]).sum::<f64>())
            .collect()
    }

    /// Lower and upper bandwidth of the nonzero pattern.
    pub fn bandwidths(&self) -> (usize, usize) {
        let mut lower = 0;
        let mut upper = 0;
        for (i, row) in self.rows.iter().enumerate() {
            if let Some((&first, _)) = row.iter().find(|&(_, &v)| v != 0.0) {
                lower = lower.max(i.saturating_sub(first));
            }
            if let Some((&last, _)) = row.iter().rev().find(|&(_, &v)| v != 0.0) {
                upper = upper.max(last.saturating_sub(i));
            }
        }
        (lower, upper)
    }
}

/// Linear system A·x = b for one iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSystem {
    /// Coefficient matrix
    pub a: SparseMatrix,
    /// Right-hand side
    pub b: Vec<f64>,
}

impl LinearSystem {
    /// Create a zero system of the given size.
    pub fn new(size: usize) -> Self {
        Self {
            a: SparseMatrix::new(size),
            b: vec![0.0; size],
        }
    }

    /// System dimension.
    pub fn size(&self) -> usize {
        self.b.len()
    }

    /// Add to right-hand side element.
    pub fn add_source(&mut self, row: usize, value: f64) {
        self.b[row] += value;
    }

    /// Max-norm of the equation imbalance ‖A·x − b‖∞.
    pub fn residual(&self, x: &[f64]) -> f64 {
        self.a
            .mul_vec(x)
            .iter()
            .zip(&self.b)
            .map(|(ax, b)| (ax - b).abs())
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamp_conductance_is_symmetric() {
        let mut m = SparseMatrix::new(3);
        m.stamp_conductance(0, 1, 2.0);
        m.stamp_conductance(1, 2, 3.0);
        assert_eq!(m.get(0, 0), 2.0);
        assert_eq!(m.get(1, 1), 5.0);
        assert_eq!(m.get(2, 2), 3.0);
        assert_eq!(m.get(0, 1), -2.0);
        assert_eq!(m.get(1, 0), -2.0);
        assert_eq!(m.get(2, 1), -3.0);
        assert_eq!(m.get(0, 2), 0.0);
        // Rows of a Laplacian sum to zero
        assert_eq!(m.mul_vec(&[1.0, 1.0, 1.0]), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_identity_row() {
        let mut m = SparseMatrix::new(2);
        m.stamp_conductance(0, 1, 4.0);
        m.set_identity_row(1);
        assert_eq!(m.row(1).collect::<Vec<_>>(), vec![(1, 1.0)]);
        assert_eq!(m.get(0, 1), -4.0);
        assert_eq!(m.nnz(), 3);
        assert_eq!(m.diagonal(0), 4.0);
        assert_eq!(m.diagonal(1), 1.0);
    }

    #[test]
    fn test_bandwidths() {
        let mut m = SparseMatrix::new(5);
        m.stamp_conductance(0, 3, 1.0);
        m.stamp_conductance(1, 2, 1.0);
        assert_eq!(m.bandwidths(), (3, 3));
        m.set_identity_row(3);
        assert_eq!(m.bandwidths(), (1, 3));
    }

    #[test]
    fn test_residual() {
        let mut sys = LinearSystem::new(2);
        sys.a.stamp_conductance(0, 1, 1.0);
        sys.add_source(0, 1.0);
        sys.add_source(1, -1.0);
        assert_eq!(sys.residual(&[1.0, 0.0]), 0.0);
        assert_eq!(sys.residual(&[0.0, 0.0]), 1.0);
    }
}
