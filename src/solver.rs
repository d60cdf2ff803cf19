use core::fmt;

use dyn_stack::{GlobalPodBuffer, PodStack, ReborrowMut};
use faer_core::mat;
use faer_core::{Conj, Parallelism};
use faer_sparse::qr::{factorize_symbolic_qr, QrSymbolicParams};

use crate::assemble::{vstack, AssembleError};
use crate::matrix::SparseMatrix;
use crate::report::{RefinementReport, Reporter, StdoutReporter};

/// Errors while setting up or factorizing a solve.
///
/// Numerical difficulties (rank deficiency, slow convergence) are not errors;
/// they come back as [`SolveStatus`] flags on a successful result.
#[derive(Debug)]
pub enum SolverError {
    /// The matrix has zero rows or columns.
    EmptyMatrix { nrows: usize, ncols: usize },
    /// The right-hand side length does not match the matrix row count.
    RhsLength { expected: usize, actual: usize },
    /// The coefficient blocks could not be assembled.
    Assemble(AssembleError),
    /// faer reported an error during factorization.
    Faer(faer_sparse::FaerError),
    /// Workspace requirement overflowed.
    WorkspaceOverflow,
    /// Workspace allocation failed.
    WorkspaceAlloc,
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyMatrix { nrows, ncols } => {
                write!(f, "cannot factorize an empty matrix: {nrows}x{ncols}")
            }
            Self::RhsLength { expected, actual } => {
                write!(f, "rhs length {actual} does not match expected {expected}")
            }
            Self::Assemble(err) => write!(f, "assembly failed: {err}"),
            Self::Faer(err) => write!(f, "faer error: {err:?}"),
            Self::WorkspaceOverflow => write!(f, "workspace size overflow"),
            Self::WorkspaceAlloc => write!(f, "workspace allocation failed"),
        }
    }
}

impl std::error::Error for SolverError {}

impl From<AssembleError> for SolverError {
    fn from(err: AssembleError) -> Self {
        Self::Assemble(err)
    }
}

/// Terminal state of an iterated solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// The residual met the tolerance.
    Converged,
    /// The iteration bound was hit; the best iterate is returned.
    MaxIterationsReached,
    /// The system was rank deficient; a minimum-norm-style solution from a
    /// damped augmented system is returned.
    RankDeficient,
}

/// Solution of `A x = b` with its achieved residual.
#[derive(Debug, Clone)]
pub struct SolveResult {
    /// Best solution found, length `A.ncols()`.
    pub x: Vec<f64>,
    /// `||b - A x||_2` for the returned `x`, measured against the original
    /// system even on the rank-deficient path.
    pub residual_norm: f64,
    /// Refinement iterations performed after the initial solve.
    pub iterations: usize,
    pub status: SolveStatus,
}

/// Options controlling the iterated QR solve.
#[derive(Debug, Clone)]
pub struct SolverOptions {
    /// Maximum number of refinement iterations after the initial solve.
    pub max_iterations: usize,
    /// Converge when `||b - A x||_2 <= tolerance * ||b||_2`, or below
    /// `tolerance` absolutely when `b` is all zeros.
    pub tolerance: f64,
    /// Parallelism handed to the factorization.
    pub parallelism: Parallelism,
    /// Emit per-iteration diagnostics to stdout by default.
    pub verbose: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iterations: 4,
            tolerance: 1e-10,
            parallelism: Parallelism::None,
            verbose: false,
        }
    }
}

enum ReporterSlot<'a> {
    External(&'a mut dyn Reporter),
    Local(StdoutReporter),
    None,
}

impl<'a> ReporterSlot<'a> {
    fn new(reporter: Option<&'a mut dyn Reporter>, verbose: bool) -> Self {
        match reporter {
            Some(r) => Self::External(r),
            None if verbose => Self::Local(StdoutReporter::new()),
            None => Self::None,
        }
    }

    fn as_mut(&mut self) -> Option<&mut dyn Reporter> {
        match self {
            Self::External(r) => Some(*r),
            Self::Local(r) => Some(r),
            Self::None => None,
        }
    }
}

/// Solves `A x = b` in the least-squares sense with sparse QR and iterative
/// refinement.
///
/// The factorization is built once per call and every solve of the refinement
/// loop reuses it; all factorization resources are released when the call
/// returns, on every exit path. Structurally deficient systems (an empty
/// column, or fewer rows than columns) and numerically deficient ones (a
/// non-finite solution or residual from the plain factorization) are re-solved
/// through a damped augmented system and flagged
/// [`SolveStatus::RankDeficient`] instead of failing.
pub fn solve_iteratively(
    a: &SparseMatrix,
    b: &[f64],
    options: &SolverOptions,
    reporter: Option<&mut dyn Reporter>,
) -> Result<SolveResult, SolverError> {
    if a.nrows() == 0 || a.ncols() == 0 {
        return Err(SolverError::EmptyMatrix {
            nrows: a.nrows(),
            ncols: a.ncols(),
        });
    }
    if b.len() != a.nrows() {
        return Err(SolverError::RhsLength {
            expected: a.nrows(),
            actual: b.len(),
        });
    }

    let mut reporter = ReporterSlot::new(reporter, options.verbose);

    let result = if a.nrows() < a.ncols() || has_empty_column(a) {
        ridge_solve(a, b, options, &mut reporter)?
    } else {
        let refined = refine(a, b, options, &mut reporter)?;
        if refined.finite {
            let status = if refined.converged {
                SolveStatus::Converged
            } else {
                SolveStatus::MaxIterationsReached
            };
            SolveResult {
                x: refined.x,
                residual_norm: refined.residual_norm,
                iterations: refined.iterations,
                status,
            }
        } else {
            ridge_solve(a, b, options, &mut reporter)?
        }
    };

    if let Some(reporter) = reporter.as_mut() {
        reporter.on_finish();
    }
    Ok(result)
}

/// Stacks two coefficient blocks and their right-hand sides, then solves the
/// combined system with [`solve_iteratively`].
pub fn solve_stacked(
    a_top: &SparseMatrix,
    b_top: &[f64],
    a_bottom: &SparseMatrix,
    b_bottom: &[f64],
    options: &SolverOptions,
    reporter: Option<&mut dyn Reporter>,
) -> Result<SolveResult, SolverError> {
    if b_top.len() != a_top.nrows() {
        return Err(SolverError::RhsLength {
            expected: a_top.nrows(),
            actual: b_top.len(),
        });
    }
    if b_bottom.len() != a_bottom.nrows() {
        return Err(SolverError::RhsLength {
            expected: a_bottom.nrows(),
            actual: b_bottom.len(),
        });
    }

    let a = vstack(a_top, a_bottom)?;
    let mut b = Vec::with_capacity(a.nrows());
    b.extend_from_slice(b_top);
    b.extend_from_slice(b_bottom);
    solve_iteratively(&a, &b, options, reporter)
}

struct Refined {
    x: Vec<f64>,
    residual_norm: f64,
    iterations: usize,
    converged: bool,
    finite: bool,
}

fn refine(
    a: &SparseMatrix,
    b: &[f64],
    options: &SolverOptions,
    reporter: &mut ReporterSlot<'_>,
) -> Result<Refined, SolverError> {
    let m = a.nrows();
    let n = a.ncols();

    let symbolic_qr = factorize_symbolic_qr(a.as_symbolic(), QrSymbolicParams::default())
        .map_err(SolverError::Faer)?;

    let factor_req = symbolic_qr
        .factorize_numeric_qr_req::<f64>(options.parallelism)
        .map_err(|_| SolverError::WorkspaceOverflow)?;
    let solve_req = symbolic_qr
        .solve_in_place_req::<f64>(1, options.parallelism)
        .map_err(|_| SolverError::WorkspaceOverflow)?;
    let req = factor_req
        .try_or(solve_req)
        .map_err(|_| SolverError::WorkspaceOverflow)?;
    let mut qr_stack = GlobalPodBuffer::try_new(req).map_err(|_| SolverError::WorkspaceAlloc)?;
    let mut qr_indices = vec![0usize; symbolic_qr.len_indices()];
    let mut qr_values = vec![0.0f64; symbolic_qr.len_values()];

    let mut stack = PodStack::new(&mut qr_stack);
    let qr = symbolic_qr.factorize_numeric_qr::<f64>(
        &mut qr_indices,
        &mut qr_values,
        a.as_faer(),
        options.parallelism,
        stack.rb_mut(),
    );

    let bnorm = l2_norm(b);
    let target = if bnorm > 0.0 {
        options.tolerance * bnorm
    } else {
        options.tolerance
    };

    // Initial solve: the factorization writes the solution into the leading
    // n entries of the m-length right-hand side.
    let mut rhs = b.to_vec();
    {
        let mut rhs_mat = mat::from_column_major_slice_mut::<f64>(&mut rhs, m, 1);
        let mut stack = PodStack::new(&mut qr_stack);
        qr.solve_in_place_with_conj(
            Conj::No,
            rhs_mat.rb_mut(),
            options.parallelism,
            stack.rb_mut(),
        );
    }
    let mut x = rhs[..n].to_vec();
    let mut residual = vec![0.0f64; m];
    residual_into(a, &x, b, &mut residual);
    let mut rnorm = l2_norm(&residual);

    if !all_finite(&x) || !rnorm.is_finite() {
        return Ok(Refined {
            x,
            residual_norm: rnorm,
            iterations: 0,
            converged: false,
            finite: false,
        });
    }

    let mut best_x = x.clone();
    let mut best_norm = rnorm;
    let mut iterations = 0;

    while rnorm > target && iterations < options.max_iterations {
        rhs[..m].copy_from_slice(&residual);
        {
            let mut rhs_mat = mat::from_column_major_slice_mut::<f64>(&mut rhs, m, 1);
            let mut stack = PodStack::new(&mut qr_stack);
            qr.solve_in_place_with_conj(
                Conj::No,
                rhs_mat.rb_mut(),
                options.parallelism,
                stack.rb_mut(),
            );
        }
        let correction_norm = l2_norm(&rhs[..n]);
        for (xi, dxi) in x.iter_mut().zip(&rhs[..n]) {
            *xi += dxi;
        }
        residual_into(a, &x, b, &mut residual);
        rnorm = l2_norm(&residual);
        iterations += 1;

        if let Some(reporter) = reporter.as_mut() {
            reporter.on_iteration(&RefinementReport {
                iteration: iterations,
                residual_norm: rnorm,
                relative_residual: if bnorm > 0.0 { rnorm / bnorm } else { rnorm },
                correction_norm,
            });
        }

        if !all_finite(&x) || !rnorm.is_finite() {
            return Ok(Refined {
                x,
                residual_norm: rnorm,
                iterations,
                converged: false,
                finite: false,
            });
        }
        if rnorm < best_norm {
            best_norm = rnorm;
            best_x.copy_from_slice(&x);
        }
    }

    if rnorm <= target {
        Ok(Refined {
            x,
            residual_norm: rnorm,
            iterations,
            converged: true,
            finite: true,
        })
    } else {
        Ok(Refined {
            x: best_x,
            residual_norm: best_norm,
            iterations,
            converged: false,
            finite: true,
        })
    }
}

/// Re-solves through `[A; delta I] x = [b; 0]`, which is full column rank for
/// any input and whose least-squares answer approaches the minimum-norm
/// solution as `delta` shrinks.
fn ridge_solve(
    a: &SparseMatrix,
    b: &[f64],
    options: &SolverOptions,
    reporter: &mut ReporterSlot<'_>,
) -> Result<SolveResult, SolverError> {
    let ridge = scaled_identity(a.ncols(), ridge_damping(a));
    let stacked = vstack(a, &ridge)?;

    let mut rhs = vec![0.0f64; stacked.nrows()];
    rhs[..b.len()].copy_from_slice(b);
    let refined = refine(&stacked, &rhs, options, reporter)?;

    // Report the residual of the caller's system, not the augmented one.
    let mut residual = vec![0.0f64; a.nrows()];
    residual_into(a, &refined.x, b, &mut residual);
    Ok(SolveResult {
        residual_norm: l2_norm(&residual),
        x: refined.x,
        iterations: refined.iterations,
        status: SolveStatus::RankDeficient,
    })
}

fn has_empty_column(a: &SparseMatrix) -> bool {
    (0..a.ncols()).any(|col| a.col_range(col).is_empty())
}

fn ridge_damping(a: &SparseMatrix) -> f64 {
    let largest = a.values().iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    if largest > 0.0 {
        f64::EPSILON.sqrt() * largest
    } else {
        f64::EPSILON.sqrt()
    }
}

fn scaled_identity(n: usize, scale: f64) -> SparseMatrix {
    let col_ptrs = (0..=n).collect();
    let row_indices = (0..n).collect();
    let values = vec![scale; n];
    SparseMatrix::from_parts_unchecked(n, n, col_ptrs, row_indices, values)
}

/// out = b - A x, by column-major sparse matrix-vector product.
fn residual_into(a: &SparseMatrix, x: &[f64], b: &[f64], out: &mut [f64]) {
    out.copy_from_slice(b);
    for col in 0..a.ncols() {
        let xj = x[col];
        if xj == 0.0 {
            continue;
        }
        for (&row, &value) in a.rows_of_col(col).iter().zip(a.values_of_col(col)) {
            out[row] -= value * xj;
        }
    }
}

fn all_finite(xs: &[f64]) -> bool {
    xs.iter().all(|v| v.is_finite())
}

fn l2_norm(xs: &[f64]) -> f64 {
    let mut sum = 0.0;
    for &v in xs {
        sum += v * v;
    }
    sum.sqrt()
}
