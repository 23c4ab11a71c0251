//! Compressed sparse row matrices
//!
//! One-hot blocks are mostly zeros, so the assembled feature matrix is kept in
//! CSR form: `indptr[i]..indptr[i + 1]` indexes the stored entries of row `i`,
//! with column indices strictly increasing inside each row.

use crate::error::{FeatureError, Result};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Sparse matrix in compressed-row format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsrMatrix {
    n_rows: usize,
    n_cols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
}

impl CsrMatrix {
    /// An all-zero matrix of the given shape
    pub fn zeros(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            indptr: vec![0; n_rows + 1],
            indices: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Convert a dense block, storing only nonzero entries
    pub fn from_dense(dense: ArrayView2<f64>) -> Self {
        let (n_rows, n_cols) = dense.dim();
        let mut indptr = Vec::with_capacity(n_rows + 1);
        let mut indices = Vec::new();
        let mut data = Vec::new();
        indptr.push(0);

        for row in dense.rows() {
            for (j, &v) in row.iter().enumerate() {
                if v != 0.0 {
                    indices.push(j);
                    data.push(v);
                }
            }
            indptr.push(indices.len());
        }

        Self {
            n_rows,
            n_cols,
            indptr,
            indices,
            data,
        }
    }

    /// Build from `(row, col, value)` triplets.
    ///
    /// Triplets may come in any order; duplicates are summed and zeros dropped.
    pub fn from_triplets(
        n_rows: usize,
        n_cols: usize,
        triplets: &[(usize, usize, f64)],
    ) -> Result<Self> {
        let mut per_row: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n_rows];
        for &(i, j, v) in triplets {
            if i >= n_rows || j >= n_cols {
                return Err(FeatureError::shape(
                    format!("entry inside {}x{}", n_rows, n_cols),
                    format!("entry at ({}, {})", i, j),
                ));
            }
            per_row[i].push((j, v));
        }

        let mut indptr = Vec::with_capacity(n_rows + 1);
        let mut indices = Vec::with_capacity(triplets.len());
        let mut data = Vec::with_capacity(triplets.len());
        indptr.push(0);

        for mut row in per_row {
            row.sort_by_key(|&(j, _)| j);
            let mut merged: Vec<(usize, f64)> = Vec::with_capacity(row.len());
            for (j, v) in row {
                match merged.last_mut() {
                    Some(last) if last.0 == j => last.1 += v,
                    _ => merged.push((j, v)),
                }
            }
            for (j, v) in merged.into_iter().filter(|&(_, v)| v != 0.0) {
                indices.push(j);
                data.push(v);
            }
            indptr.push(indices.len());
        }

        Ok(Self {
            n_rows,
            n_cols,
            indptr,
            indices,
            data,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.n_cols)
    }

    /// Number of stored entries
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Stored `(column, value)` pairs of row `i`, in column order
    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.indptr[i]..self.indptr[i + 1];
        self.indices[range.clone()]
            .iter()
            .copied()
            .zip(self.data[range].iter().copied())
    }

    /// Value at `(i, j)`, zero when not stored
    pub fn get(&self, i: usize, j: usize) -> f64 {
        if i >= self.n_rows {
            return 0.0;
        }
        let range = self.indptr[i]..self.indptr[i + 1];
        match self.indices[range.clone()].binary_search(&j) {
            Ok(pos) => self.data[range.start + pos],
            Err(_) => 0.0,
        }
    }

    /// Horizontally concatenate `self` (left) and `right`.
    ///
    /// Column indices of `right` are shifted by `self.n_cols()`.
    pub fn hstack(&self, right: &CsrMatrix) -> Result<CsrMatrix> {
        if self.n_rows != right.n_rows {
            return Err(FeatureError::shape(
                format!("{} rows", self.n_rows),
                format!("{} rows", right.n_rows),
            ));
        }

        let offset = self.n_cols;
        let mut indptr = Vec::with_capacity(self.n_rows + 1);
        let mut indices = Vec::with_capacity(self.nnz() + right.nnz());
        let mut data = Vec::with_capacity(self.nnz() + right.nnz());
        indptr.push(0);

        for i in 0..self.n_rows {
            for (j, v) in self.row(i) {
                indices.push(j);
                data.push(v);
            }
            for (j, v) in right.row(i) {
                indices.push(j + offset);
                data.push(v);
            }
            indptr.push(indices.len());
        }

        Ok(CsrMatrix {
            n_rows: self.n_rows,
            n_cols: self.n_cols + right.n_cols,
            indptr,
            indices,
            data,
        })
    }

    /// Copy out the rows in `range`, keeping their order
    pub fn slice_rows(&self, range: Range<usize>) -> Result<CsrMatrix> {
        if range.start > range.end || range.end > self.n_rows {
            return Err(FeatureError::shape(
                format!("row range within 0..{}", self.n_rows),
                format!("{}..{}", range.start, range.end),
            ));
        }

        let lo = self.indptr[range.start];
        let hi = self.indptr[range.end];
        let indptr = self.indptr[range.start..=range.end]
            .iter()
            .map(|&p| p - lo)
            .collect();

        Ok(CsrMatrix {
            n_rows: range.end - range.start,
            n_cols: self.n_cols,
            indptr,
            indices: self.indices[lo..hi].to_vec(),
            data: self.data[lo..hi].to_vec(),
        })
    }

    /// Expand into a dense array
    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::zeros((self.n_rows, self.n_cols));
        for i in 0..self.n_rows {
            for (j, v) in self.row(i) {
                dense[[i, j]] = v;
            }
        }
        dense
    }
}
