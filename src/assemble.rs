use core::fmt;

use crate::matrix::SparseMatrix;

/// Errors while assembling sparse matrices.
#[derive(Debug, Clone)]
pub enum AssembleError {
    /// The operands have different column counts.
    ColumnCountMismatch { top: usize, bottom: usize },
}

impl fmt::Display for AssembleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ColumnCountMismatch { top, bottom } => {
                write!(
                    f,
                    "cannot stack matrices with {top} and {bottom} columns"
                )
            }
        }
    }
}

impl std::error::Error for AssembleError {}

/// Vertically concatenates two matrices with equal column counts.
///
/// The result has `top.nrows() + bottom.nrows()` rows; each column holds the
/// top operand's entries followed by the bottom operand's with row indices
/// offset by `top.nrows()`. Every offset bottom index exceeds every top index,
/// so each column stays strictly increasing without a re-sort, and no entry
/// is dropped or duplicated.
pub fn vstack(top: &SparseMatrix, bottom: &SparseMatrix) -> Result<SparseMatrix, AssembleError> {
    if top.ncols() != bottom.ncols() {
        return Err(AssembleError::ColumnCountMismatch {
            top: top.ncols(),
            bottom: bottom.ncols(),
        });
    }

    let ncols = top.ncols();
    let nrows = top.nrows() + bottom.nrows();
    let nnz = top.nnz() + bottom.nnz();

    let mut col_ptrs = Vec::with_capacity(ncols + 1);
    let mut row_indices = Vec::with_capacity(nnz);
    let mut values = Vec::with_capacity(nnz);
    col_ptrs.push(0);
    for col in 0..ncols {
        let top_range = top.col_range(col);
        row_indices.extend_from_slice(&top.row_indices()[top_range.clone()]);
        values.extend_from_slice(&top.values()[top_range]);

        let bottom_range = bottom.col_range(col);
        for &row in &bottom.row_indices()[bottom_range.clone()] {
            row_indices.push(top.nrows() + row);
        }
        values.extend_from_slice(&bottom.values()[bottom_range]);

        col_ptrs.push(row_indices.len());
    }

    Ok(SparseMatrix::from_parts_unchecked(
        nrows,
        ncols,
        col_ptrs,
        row_indices,
        values,
    ))
}
