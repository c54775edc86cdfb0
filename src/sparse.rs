//! Compressed sparse row matrices keyed by segment positions.
//!
//! Summing and mapping matrices between hierarchy levels have one nonzero per
//! finer-level segment, so storing them densely wastes `O(n * m)` memory for
//! hierarchies with thousands of segments. Entries are kept explicitly even when
//! their value is `0.0` or `NaN`: the *support* of a matrix is the set of stored
//! positions, not the set of nonzero values.
//!
//! ```text
//! row_ptrs:    [0, 2, 4]            row i lives at col_indices[row_ptrs[i]..row_ptrs[i + 1]]
//! col_indices: [0, 1, 2, 3]
//! values:      [1.0, 1.0, 1.0, 1.0]
//! ```

use crate::error::{Error, Result};
use faer::Mat;

/// A CSR matrix of `f64` values.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    nrows: usize,
    ncols: usize,
    row_ptrs: Vec<usize>,
    col_indices: Vec<usize>,
    values: Vec<f64>,
}

impl SparseMatrix {
    /// Build from unsorted `(row, col, value)` triplets. O(nnz log nnz).
    ///
    /// Repeated positions are summed.
    pub fn from_triplets(
        nrows: usize,
        ncols: usize,
        mut triplets: Vec<(usize, usize, f64)>,
    ) -> Result<Self> {
        if let Some(&(row, col, _)) = triplets.iter().find(|(r, c, _)| *r >= nrows || *c >= ncols)
        {
            return Err(Error::ShapeMismatch {
                expected: format!("indices within {nrows}x{ncols}"),
                actual: format!("entry at ({row}, {col})"),
            });
        }

        triplets.sort_by_key(|&(row, col, _)| (row, col));

        let mut row_ptrs = vec![0usize; nrows + 1];
        let mut col_indices: Vec<usize> = Vec::with_capacity(triplets.len());
        let mut values: Vec<f64> = Vec::with_capacity(triplets.len());
        let mut last: Option<(usize, usize)> = None;

        for (row, col, value) in triplets {
            if last == Some((row, col)) {
                if let Some(v) = values.last_mut() {
                    *v += value;
                }
                continue;
            }
            last = Some((row, col));
            row_ptrs[row + 1] += 1;
            col_indices.push(col);
            values.push(value);
        }
        for i in 0..nrows {
            row_ptrs[i + 1] += row_ptrs[i];
        }

        Ok(Self {
            nrows,
            ncols,
            row_ptrs,
            col_indices,
            values,
        })
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of columns.
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Stored value at `(row, col)`, if any. O(log row_nnz).
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.nrows {
            return None;
        }
        let range = self.row_ptrs[row]..self.row_ptrs[row + 1];
        let cols = &self.col_indices[range.clone()];
        cols.binary_search(&col)
            .ok()
            .map(|offset| self.values[range.start + offset])
    }

    /// Stored `(col, value)` pairs of one row, in column order.
    ///
    /// A row outside the matrix has no stored entries.
    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = if row < self.nrows {
            self.row_ptrs[row]..self.row_ptrs[row + 1]
        } else {
            0..0
        };
        self.col_indices[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    /// All stored `(row, col, value)` triplets in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.nrows).flat_map(move |row| self.row(row).map(move |(col, v)| (row, col, v)))
    }

    /// Stored positions in row-major order.
    pub fn support(&self) -> Vec<(usize, usize)> {
        self.iter().map(|(row, col, _)| (row, col)).collect()
    }

    /// Number of stored entries in each row.
    pub fn row_counts(&self) -> Vec<usize> {
        self.row_ptrs.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Number of stored entries in each column.
    pub fn col_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.ncols];
        for &col in &self.col_indices {
            counts[col] += 1;
        }
        counts
    }

    /// Transposed copy.
    pub fn transpose(&self) -> Self {
        let mut row_ptrs = vec![0usize; self.ncols + 1];
        for &col in &self.col_indices {
            row_ptrs[col + 1] += 1;
        }
        for i in 0..self.ncols {
            row_ptrs[i + 1] += row_ptrs[i];
        }

        let mut next = row_ptrs.clone();
        let mut col_indices = vec![0usize; self.nnz()];
        let mut values = vec![0.0f64; self.nnz()];
        for (row, col, value) in self.iter() {
            let slot = next[col];
            col_indices[slot] = row;
            values[slot] = value;
            next[col] += 1;
        }

        Self {
            nrows: self.ncols,
            ncols: self.nrows,
            row_ptrs,
            col_indices,
            values,
        }
    }

    /// Dense copy.
    pub fn to_dense(&self) -> Mat<f64> {
        let mut mat = Mat::<f64>::zeros(self.nrows, self.ncols);
        for (row, col, value) in self.iter() {
            mat[(row, col)] = value;
        }
        mat
    }

    /// Compute $X \cdot A^T$ for a dense `X` with one row per timestamp.
    ///
    /// `values` is `T x ncols`; the result is `T x nrows`. Each output column `i`
    /// is the weighted sum of the input columns stored in row `i`.
    pub fn apply(&self, values: &Mat<f64>) -> Result<Mat<f64>> {
        if values.ncols() != self.ncols {
            return Err(Error::ShapeMismatch {
                expected: format!("{} columns", self.ncols),
                actual: format!("{} columns", values.ncols()),
            });
        }

        let n_steps = values.nrows();
        let mut out = Mat::<f64>::zeros(n_steps, self.nrows);
        for (row, col, weight) in self.iter() {
            for t in 0..n_steps {
                out[(t, row)] += weight * values[(t, col)];
            }
        }
        Ok(out)
    }
}
