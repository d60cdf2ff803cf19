//! Sparse least-squares core: CSC assembly and an iterated QR solve.
//!
//! This crate assembles canonical compressed sparse column (CSC) matrices
//! and solves `A x = b` in the least-squares sense with sparse QR plus
//! iterative refinement. The QR factorization itself comes from
//! `faer-sparse`; this crate owns the assembly and canonicalization around
//! it and the refinement loop on top.
//!
//! How a solve runs:
//! - Build `A` from triplets or raw CSC parts, optionally stacking two
//!   coefficient blocks with [`vstack`] (or [`solve_stacked`] directly).
//! - Factorize with sparse QR and solve for an initial `x`.
//! - Refine: solve `A dx = b - A x` against the same factorization until the
//!   residual meets the tolerance or the iteration bound is hit.
//! - Inspect [`SolveResult`]: rank-deficient and slow-converging systems come
//!   back flagged in [`SolveResult::status`], not as errors.
//!
//! Example:
//! ```rust,no_run
//! use iterqr::{solve_iteratively, SolveStatus, SolverOptions, SparseMatrix};
//!
//! let a = SparseMatrix::from_triplets(
//!     3,
//!     3,
//!     &[(0, 0, 2.0), (1, 1, 2.0), (2, 2, 2.0), (0, 1, 1.0)],
//! )
//! .unwrap();
//! let b = vec![5.0, 2.0, 8.0];
//! let result = solve_iteratively(&a, &b, &SolverOptions::default(), None).unwrap();
//! assert_eq!(result.status, SolveStatus::Converged);
//! ```

mod assemble;
mod matrix;
mod report;
mod solver;
mod sort;

pub use assemble::{AssembleError, vstack};
pub use matrix::{MatrixError, SparseMatrix};
pub use report::{RefinementReport, Reporter, StdoutReporter};
pub use solver::{
    SolveResult, SolveStatus, SolverError, SolverOptions, solve_iteratively, solve_stacked,
};
pub use sort::{insertion_sort, insertion_sort_by_keys};
