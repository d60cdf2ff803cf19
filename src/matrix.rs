use core::fmt;
use core::ops::Range;

use faer_core::sparse::{SparseColMatRef, SymbolicSparseColMatRef};

use crate::sort::insertion_sort_by_keys;

/// Column-compressed sparse matrix in canonical form.
///
/// Indices are zero-based; within each column the row indices are strictly
/// increasing, so entries are unique. Instances are never mutated in place,
/// transformations produce new matrices.
#[derive(Debug, Clone)]
pub struct SparseMatrix {
    nrows: usize,
    ncols: usize,
    col_ptrs: Vec<usize>,
    row_indices: Vec<usize>,
    values: Vec<f64>,
}

/// Validation errors for a SparseMatrix.
#[derive(Debug, Clone)]
pub enum MatrixError {
    /// col_ptrs length is not ncols + 1.
    ColPtrLen { expected: usize, actual: usize },
    /// col_ptrs[0] is not 0.
    ColPtrStart { value: usize },
    /// col_ptrs is not non-decreasing.
    ColPtrNotMonotonic { col: usize, prev: usize, next: usize },
    /// col_ptrs[ncols] does not match row_indices length.
    ColPtrOutOfBounds { last: usize, row_indices_len: usize },
    /// values and row_indices lengths differ.
    ValuesLen { values: usize, row_indices: usize },
    /// A row index is >= nrows.
    RowIndexOutOfBounds { col: usize, row: usize, nrows: usize },
    /// Row indices in a column are not strictly increasing.
    RowIndexNotSorted { col: usize, prev: usize, next: usize },
    /// A triplet column index is >= ncols.
    ColIndexOutOfBounds { col: usize, ncols: usize },
}

impl fmt::Display for MatrixError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ColPtrLen { expected, actual } => {
                write!(f, "col_ptrs length {actual} does not match expected {expected}")
            }
            Self::ColPtrStart { value } => {
                write!(f, "col_ptrs must start at 0 (got {value})")
            }
            Self::ColPtrNotMonotonic { col, prev, next } => {
                write!(f, "col_ptrs not monotonic at col {col}: {prev} > {next}")
            }
            Self::ColPtrOutOfBounds {
                last,
                row_indices_len,
            } => {
                write!(
                    f,
                    "col_ptrs end {last} does not match row_indices length {row_indices_len}"
                )
            }
            Self::ValuesLen {
                values,
                row_indices,
            } => {
                write!(
                    f,
                    "values length {values} does not match row_indices length {row_indices}"
                )
            }
            Self::RowIndexOutOfBounds { col, row, nrows } => {
                write!(f, "row index {row} in col {col} exceeds nrows {nrows}")
            }
            Self::RowIndexNotSorted { col, prev, next } => {
                write!(f, "row indices not sorted in col {col}: {prev} >= {next}")
            }
            Self::ColIndexOutOfBounds { col, ncols } => {
                write!(f, "column index {col} exceeds ncols {ncols}")
            }
        }
    }
}

impl std::error::Error for MatrixError {}

impl SparseMatrix {
    /// Creates a validated matrix from raw compressed-column parts.
    ///
    /// Requirements:
    /// - `col_ptrs.len() == ncols + 1`
    /// - `col_ptrs` is non-decreasing and starts at `0`
    /// - `col_ptrs[ncols] == row_indices.len() == values.len()`
    /// - row indices are strictly increasing and `< nrows` within each column
    pub fn new(
        nrows: usize,
        ncols: usize,
        col_ptrs: Vec<usize>,
        row_indices: Vec<usize>,
        values: Vec<f64>,
    ) -> Result<Self, MatrixError> {
        let expected = ncols + 1;
        if col_ptrs.len() != expected {
            return Err(MatrixError::ColPtrLen {
                expected,
                actual: col_ptrs.len(),
            });
        }
        if col_ptrs.first().copied().unwrap_or(0) != 0 {
            return Err(MatrixError::ColPtrStart { value: col_ptrs[0] });
        }
        for col in 0..ncols {
            let prev = col_ptrs[col];
            let next = col_ptrs[col + 1];
            if prev > next {
                return Err(MatrixError::ColPtrNotMonotonic { col, prev, next });
            }
        }
        let last = col_ptrs[ncols];
        if last != row_indices.len() {
            return Err(MatrixError::ColPtrOutOfBounds {
                last,
                row_indices_len: row_indices.len(),
            });
        }
        if values.len() != row_indices.len() {
            return Err(MatrixError::ValuesLen {
                values: values.len(),
                row_indices: row_indices.len(),
            });
        }

        for col in 0..ncols {
            let start = col_ptrs[col];
            let end = col_ptrs[col + 1];
            if start == end {
                continue;
            }
            let mut prev = row_indices[start];
            if prev >= nrows {
                return Err(MatrixError::RowIndexOutOfBounds {
                    col,
                    row: prev,
                    nrows,
                });
            }
            for &row in &row_indices[start + 1..end] {
                if prev >= row {
                    return Err(MatrixError::RowIndexNotSorted {
                        col,
                        prev,
                        next: row,
                    });
                }
                if row >= nrows {
                    return Err(MatrixError::RowIndexOutOfBounds { col, row, nrows });
                }
                prev = row;
            }
        }

        Ok(Self {
            nrows,
            ncols,
            col_ptrs,
            row_indices,
            values,
        })
    }

    /// Builds a canonical matrix from `(row, col, value)` triplets.
    ///
    /// Triplets may arrive in any order; duplicates of the same `(row, col)`
    /// are summed. Column pointers come from a per-column count and prefix
    /// sum, then each column is canonicalized with the two-key index sort:
    /// primary key the row index, secondary key the insertion position, so
    /// duplicate entries always sum in the order they were supplied.
    pub fn from_triplets(
        nrows: usize,
        ncols: usize,
        triplets: &[(usize, usize, f64)],
    ) -> Result<Self, MatrixError> {
        let mut counts = vec![0usize; ncols];
        for &(row, col, _) in triplets {
            if col >= ncols {
                return Err(MatrixError::ColIndexOutOfBounds { col, ncols });
            }
            if row >= nrows {
                return Err(MatrixError::RowIndexOutOfBounds { col, row, nrows });
            }
            counts[col] += 1;
        }

        let mut col_ptrs = vec![0usize; ncols + 1];
        for col in 0..ncols {
            col_ptrs[col + 1] = col_ptrs[col] + counts[col];
        }

        // Scatter into column buckets, keeping the supplied order per column.
        let nnz = triplets.len();
        let mut bucket_rows = vec![0usize; nnz];
        let mut bucket_vals = vec![0.0f64; nnz];
        let mut bucket_pos = vec![0usize; nnz];
        let mut cursor = col_ptrs.clone();
        for (pos, &(row, col, value)) in triplets.iter().enumerate() {
            let slot = cursor[col];
            cursor[col] += 1;
            bucket_rows[slot] = row;
            bucket_vals[slot] = value;
            bucket_pos[slot] = pos;
        }

        let mut out_ptrs = vec![0usize; ncols + 1];
        let mut row_indices = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);
        let mut order = Vec::new();
        for col in 0..ncols {
            let start = col_ptrs[col];
            let end = col_ptrs[col + 1];
            order.clear();
            order.extend(0..end - start);
            insertion_sort_by_keys(
                &mut order,
                &bucket_rows[start..end],
                &bucket_pos[start..end],
            );

            let col_start = row_indices.len();
            for &k in &order {
                let row = bucket_rows[start + k];
                let value = bucket_vals[start + k];
                let len = row_indices.len();
                if len > col_start && row_indices[len - 1] == row {
                    values[len - 1] += value;
                } else {
                    row_indices.push(row);
                    values.push(value);
                }
            }
            out_ptrs[col + 1] = row_indices.len();
        }

        Ok(Self {
            nrows,
            ncols,
            col_ptrs: out_ptrs,
            row_indices,
            values,
        })
    }

    /// Constructs without validating; the caller guarantees canonical form.
    pub(crate) fn from_parts_unchecked(
        nrows: usize,
        ncols: usize,
        col_ptrs: Vec<usize>,
        row_indices: Vec<usize>,
        values: Vec<f64>,
    ) -> Self {
        debug_assert_eq!(col_ptrs.len(), ncols + 1);
        debug_assert_eq!(row_indices.len(), values.len());
        Self {
            nrows,
            ncols,
            col_ptrs,
            row_indices,
            values,
        }
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of columns.
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Number of stored non-zeros.
    pub fn nnz(&self) -> usize {
        self.row_indices.len()
    }

    /// Column pointer array in CSC format.
    pub fn col_ptrs(&self) -> &[usize] {
        &self.col_ptrs
    }

    /// Row index array in CSC format.
    pub fn row_indices(&self) -> &[usize] {
        &self.row_indices
    }

    /// Non-zero values, column-major.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Index range in row_indices/values for the given column.
    pub fn col_range(&self, col: usize) -> Range<usize> {
        self.col_ptrs[col]..self.col_ptrs[col + 1]
    }

    /// Sorted row indices of the given column.
    pub fn rows_of_col(&self, col: usize) -> &[usize] {
        let range = self.col_range(col);
        &self.row_indices[range]
    }

    /// Values of the given column, aligned with `rows_of_col`.
    pub fn values_of_col(&self, col: usize) -> &[f64] {
        let range = self.col_range(col);
        &self.values[range]
    }

    pub(crate) fn as_symbolic(&self) -> SymbolicSparseColMatRef<'_, usize> {
        // Invariants are established at construction.
        unsafe {
            SymbolicSparseColMatRef::new_unchecked(
                self.nrows,
                self.ncols,
                &self.col_ptrs,
                None,
                &self.row_indices,
            )
        }
    }

    pub(crate) fn as_faer(&self) -> SparseColMatRef<'_, usize, f64> {
        SparseColMatRef::new(self.as_symbolic(), &self.values[..])
    }
}
