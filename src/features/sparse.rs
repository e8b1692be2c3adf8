//! Sparse row vectors and matrices for TF-IDF features.

use serde::{Deserialize, Serialize};

/// A sparse vector with strictly increasing column indices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f64>,
}

impl SparseVector {
    /// Build from `(index, value)` pairs. Pairs are sorted and zeros dropped;
    /// duplicate indices are summed.
    pub fn from_pairs(mut pairs: Vec<(u32, f64)>) -> Self {
        pairs.sort_unstable_by_key(|(i, _)| *i);
        let mut indices: Vec<u32> = Vec::with_capacity(pairs.len());
        let mut values: Vec<f64> = Vec::with_capacity(pairs.len());
        for (i, v) in pairs {
            if indices.last() == Some(&i) {
                if let Some(last) = values.last_mut() {
                    *last += v;
                }
            } else {
                indices.push(i);
                values.push(v);
            }
        }
        let mut out = Self { indices, values };
        out.drop_zeros();
        out
    }

    fn drop_zeros(&mut self) {
        if self.values.iter().all(|v| *v != 0.0) {
            return;
        }
        let (indices, values) = self
            .indices
            .iter()
            .zip(&self.values)
            .filter(|(_, v)| **v != 0.0)
            .map(|(i, v)| (*i, *v))
            .unzip();
        self.indices = indices;
        self.values = values;
    }

    /// Number of stored (non-zero) entries.
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Iterate `(index, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    /// Value at `index` (zero when absent).
    pub fn get(&self, index: u32) -> f64 {
        self.indices
            .binary_search(&index)
            .map(|pos| self.values[pos])
            .unwrap_or(0.0)
    }

    pub fn squared_norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum()
    }

    /// Scale in place so the L2 norm is 1. All-zero vectors are left alone.
    pub fn l2_normalize(&mut self) {
        let norm = self.squared_norm().sqrt();
        if norm > 0.0 {
            for v in &mut self.values {
                *v /= norm;
            }
        }
    }

    /// Sparse-sparse dot product (merge join).
    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (mut a, mut b) = (0, 0);
        let mut sum = 0.0;
        while a < self.indices.len() && b < other.indices.len() {
            match self.indices[a].cmp(&other.indices[b]) {
                std::cmp::Ordering::Less => a += 1,
                std::cmp::Ordering::Greater => b += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.values[a] * other.values[b];
                    a += 1;
                    b += 1;
                }
            }
        }
        sum
    }

    /// Dot product against a dense weight vector. Indices beyond the
    /// weights are treated as zero weight.
    pub fn dot_dense(&self, weights: &[f64]) -> f64 {
        self.iter()
            .filter_map(|(i, v)| weights.get(i as usize).map(|w| w * v))
            .sum()
    }

    /// Squared euclidean distance.
    pub fn squared_euclidean(&self, other: &SparseVector) -> f64 {
        (self.squared_norm() + other.squared_norm() - 2.0 * self.dot(other)).max(0.0)
    }

    pub fn euclidean(&self, other: &SparseVector) -> f64 {
        self.squared_euclidean(other).sqrt()
    }

    /// L1 (manhattan) distance.
    pub fn manhattan(&self, other: &SparseVector) -> f64 {
        let (mut a, mut b) = (0, 0);
        let mut sum = 0.0;
        while a < self.indices.len() || b < other.indices.len() {
            let ia = self.indices.get(a).copied().unwrap_or(u32::MAX);
            let ib = other.indices.get(b).copied().unwrap_or(u32::MAX);
            match ia.cmp(&ib) {
                std::cmp::Ordering::Less => {
                    sum += self.values[a].abs();
                    a += 1;
                }
                std::cmp::Ordering::Greater => {
                    sum += other.values[b].abs();
                    b += 1;
                }
                std::cmp::Ordering::Equal => {
                    sum += (self.values[a] - other.values[b]).abs();
                    a += 1;
                    b += 1;
                }
            }
        }
        sum
    }
}

/// Row-major sparse matrix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseMatrix {
    pub rows: Vec<SparseVector>,
    pub n_features: usize,
}

impl SparseMatrix {
    pub fn new(rows: Vec<SparseVector>, n_features: usize) -> Self {
        Self { rows, n_features }
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, i: usize) -> &SparseVector {
        &self.rows[i]
    }

    /// Copy the given rows (in order, duplicates allowed) into a new matrix.
    pub fn select(&self, indices: &[usize]) -> SparseMatrix {
        SparseMatrix {
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
            n_features: self.n_features,
        }
    }

    /// Total stored entries.
    pub fn nnz(&self) -> usize {
        self.rows.iter().map(SparseVector::nnz).sum()
    }

    /// Variance over every cell of the dense matrix, zeros included.
    pub fn variance(&self) -> f64 {
        let cells = (self.n_rows() * self.n_features) as f64;
        if cells == 0.0 {
            return 0.0;
        }
        let (sum, sum_sq) = self
            .rows
            .iter()
            .flat_map(|r| r.values.iter())
            .fold((0.0, 0.0), |(s, sq), v| (s + v, sq + v * v));
        let mean = sum / cells;
        (sum_sq / cells - mean * mean).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vec_of(pairs: &[(u32, f64)]) -> SparseVector {
        SparseVector::from_pairs(pairs.to_vec())
    }

    #[test]
    fn from_pairs_sorts_merges_and_drops_zeros() {
        let v = vec_of(&[(5, 1.0), (1, 2.0), (5, 0.5), (3, 0.0)]);
        assert_eq!(v.indices, vec![1, 5]);
        assert_eq!(v.values, vec![2.0, 1.5]);
    }

    #[test]
    fn get_returns_zero_for_missing() {
        let v = vec_of(&[(2, 4.0)]);
        assert_eq!(v.get(2), 4.0);
        assert_eq!(v.get(3), 0.0);
    }

    #[test]
    fn dot_products() {
        let a = vec_of(&[(0, 1.0), (2, 2.0), (4, 3.0)]);
        let b = vec_of(&[(2, 5.0), (3, 1.0), (4, 1.0)]);
        assert_eq!(a.dot(&b), 13.0);
        assert_eq!(a.dot_dense(&[1.0, 1.0, 1.0]), 3.0);
    }

    #[test]
    fn distances() {
        let a = vec_of(&[(0, 3.0)]);
        let b = vec_of(&[(1, 4.0)]);
        assert!((a.euclidean(&b) - 5.0).abs() < 1e-12);
        assert!((a.manhattan(&b) - 7.0).abs() < 1e-12);
        assert_eq!(a.euclidean(&a), 0.0);
        assert_eq!(a.manhattan(&a), 0.0);
    }

    #[test]
    fn l2_normalize_unit_length() {
        let mut v = vec_of(&[(0, 3.0), (1, 4.0)]);
        v.l2_normalize();
        assert!((v.squared_norm() - 1.0).abs() < 1e-12);

        let mut empty = SparseVector::default();
        empty.l2_normalize();
        assert!(empty.is_empty());
    }

    #[test]
    fn matrix_variance_counts_zero_cells() {
        // Dense: [[1, 0], [0, 1]] -> mean 0.5, var 0.25
        let m = SparseMatrix::new(vec![vec_of(&[(0, 1.0)]), vec_of(&[(1, 1.0)])], 2);
        assert!((m.variance() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn select_allows_duplicates() {
        let m = SparseMatrix::new(vec![vec_of(&[(0, 1.0)]), vec_of(&[(1, 1.0)])], 2);
        let s = m.select(&[1, 1, 0]);
        assert_eq!(s.n_rows(), 3);
        assert_eq!(s.row(0), s.row(1));
        assert_eq!(s.n_features, 2);
    }
}
