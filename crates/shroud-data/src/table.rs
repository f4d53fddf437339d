//! Row-major encoded table.
//!
//! The table stores dense `ValueId`s only; `N * C * 4` bytes dominate the
//! engine's memory footprint, so the layout is a single flat buffer.

use shroud_error::{Result, ShroudError};
use shroud_types::{RowId, ValueId};

/// A fixed `N x C` matrix of value ids, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedTable {
    data: Vec<ValueId>,
    rows: usize,
    cols: usize,
}

impl EncodedTable {
    /// Build from per-row vectors, validating that every row has the same
    /// number of columns.
    pub fn from_rows(rows: Vec<Vec<ValueId>>, cols: usize) -> Result<Self> {
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(ShroudError::input(format!(
                    "row {i} has {} columns, expected {cols}",
                    row.len()
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            data,
            rows: rows.len(),
            cols,
        })
    }

    /// An empty table with a fixed column count (used for absent
    /// sub-tables, e.g. when no column is sensitive).
    #[must_use]
    pub fn empty(rows: usize, cols: usize) -> Self {
        debug_assert!(cols == 0 || rows == 0);
        Self {
            data: Vec::new(),
            rows,
            cols,
        }
    }

    /// Number of rows.
    #[inline]
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[inline]
    #[must_use]
    pub fn num_cols(&self) -> usize {
        self.cols
    }

    /// Returns `true` if the table holds no cells.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// One row as a slice.
    ///
    /// # Panics
    ///
    /// Panics if `row` is out of bounds.
    #[inline]
    #[must_use]
    pub fn row(&self, row: RowId) -> &[ValueId] {
        let start = row as usize * self.cols;
        &self.data[start..start + self.cols]
    }

    /// One cell.
    ///
    /// # Panics
    ///
    /// Panics if `row` or `col` is out of bounds.
    #[inline]
    #[must_use]
    pub fn value(&self, row: RowId, col: usize) -> ValueId {
        debug_assert!(col < self.cols);
        self.data[row as usize * self.cols + col]
    }

    /// A new table containing only the given columns, in the given order.
    ///
    /// # Panics
    ///
    /// Panics if any index in `cols` is out of bounds.
    #[must_use]
    pub fn project(&self, cols: &[usize]) -> Self {
        let mut data = Vec::with_capacity(self.rows * cols.len());
        for r in 0..self.rows {
            let row = &self.data[r * self.cols..(r + 1) * self.cols];
            for &c in cols {
                data.push(row[c]);
            }
        }
        Self {
            data,
            rows: self.rows,
            cols: cols.len(),
        }
    }
}
