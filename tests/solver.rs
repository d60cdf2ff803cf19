use iterqr::{
    insertion_sort, insertion_sort_by_keys, solve_iteratively, solve_stacked, vstack,
    AssembleError, RefinementReport, Reporter, SolveStatus, SolverError, SolverOptions,
    SparseMatrix,
};

fn matrix_from_triplets(nrows: usize, ncols: usize, entries: &[(usize, usize, f64)]) -> SparseMatrix {
    SparseMatrix::from_triplets(nrows, ncols, entries).unwrap()
}

fn solver_options() -> SolverOptions {
    SolverOptions {
        verbose: false,
        ..SolverOptions::default()
    }
}

fn assert_close(actual: &[f64], expected: &[f64], tol: f64) {
    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() <= tol,
            "component {i}: {a} vs expected {e}"
        );
    }
}

struct CollectingReporter {
    iterations: Vec<RefinementReport>,
    finished: usize,
}

impl Reporter for CollectingReporter {
    fn on_iteration(&mut self, report: &RefinementReport) {
        self.iterations.push(report.clone());
    }

    fn on_finish(&mut self) {
        self.finished += 1;
    }
}

#[test]
fn vstack_preserves_counts_and_order() {
    let top = matrix_from_triplets(2, 2, &[(0, 0, 1.0), (1, 0, 2.0), (1, 1, 3.0)]);
    let bottom = matrix_from_triplets(3, 2, &[(0, 1, 4.0), (2, 0, 5.0), (1, 1, 6.0)]);
    let stacked = vstack(&top, &bottom).unwrap();

    assert_eq!(stacked.nrows(), top.nrows() + bottom.nrows());
    assert_eq!(stacked.ncols(), top.ncols());
    assert_eq!(stacked.nnz(), top.nnz() + bottom.nnz());
    for col in 0..stacked.ncols() {
        let rows = stacked.rows_of_col(col);
        assert!(
            rows.windows(2).all(|pair| pair[0] < pair[1]),
            "column {col} rows not strictly increasing: {rows:?}"
        );
    }
    assert_eq!(stacked.rows_of_col(0), &[0, 1, 4]);
    assert_eq!(stacked.rows_of_col(1), &[1, 2, 3]);
}

#[test]
fn vstack_rejects_mismatched_column_counts() {
    let three = matrix_from_triplets(2, 3, &[(0, 0, 1.0)]);
    let four = matrix_from_triplets(2, 4, &[(0, 0, 1.0)]);
    let err = vstack(&three, &four).unwrap_err();
    assert!(matches!(
        err,
        AssembleError::ColumnCountMismatch { top: 3, bottom: 4 }
    ));
}

#[test]
fn natural_sort_is_idempotent_permutation() {
    let original = vec![5usize, 3, 8, 3, 1, 9, 0];
    let mut xs = original.clone();
    insertion_sort(&mut xs);
    let once = xs.clone();
    insertion_sort(&mut xs);
    assert_eq!(xs, once, "sorting a sorted range must not change it");

    let mut expected = original;
    expected.sort_unstable();
    assert_eq!(xs, expected, "sorted output must be a permutation");
}

#[test]
fn comparator_sort_orders_lexicographically() {
    let primary = vec![3usize, 1, 3, 0, 1, 0];
    let secondary = vec![2usize, 9, 1, 4, 3, 4];
    let mut order: Vec<usize> = (0..primary.len()).collect();
    insertion_sort_by_keys(&mut order, &primary, &secondary);

    for pair in order.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        assert!(
            primary[a] < primary[b] || (primary[a] == primary[b] && secondary[a] <= secondary[b]),
            "adjacent pair ({a}, {b}) out of order"
        );
    }
}

#[test]
fn identity_system_converges_immediately() {
    let a = matrix_from_triplets(4, 4, &[(0, 0, 1.0), (1, 1, 1.0), (2, 2, 1.0), (3, 3, 1.0)]);
    let b = vec![2.0, -7.0, 0.0, 11.5];
    let result = solve_iteratively(&a, &b, &solver_options(), None).unwrap();

    assert_eq!(result.status, SolveStatus::Converged);
    assert!(result.iterations <= 2);
    assert!(result.residual_norm <= 1e-10 * l2(&b));
    assert_close(&result.x, &b, 1e-12);
}

#[test]
fn tall_consistent_system_recovers_solution() {
    // b = A x* with x* = [1, -2].
    let a = matrix_from_triplets(
        3,
        2,
        &[(0, 0, 1.0), (1, 0, 1.0), (1, 1, 1.0), (2, 1, 2.0)],
    );
    let b = vec![1.0, -1.0, -4.0];
    let result = solve_iteratively(&a, &b, &solver_options(), None).unwrap();

    assert_eq!(result.status, SolveStatus::Converged);
    assert_close(&result.x, &[1.0, -2.0], 1e-8);
}

#[test]
fn zero_column_reports_rank_deficient() {
    let a = matrix_from_triplets(3, 3, &[(0, 0, 1.0), (1, 1, 2.0)]);
    let b = vec![1.0, 4.0, 0.0];
    let result = solve_iteratively(&a, &b, &solver_options(), None).unwrap();

    assert_eq!(result.status, SolveStatus::RankDeficient);
    assert!(result.x.iter().all(|v| v.is_finite()));
    // The determined components still solve their equations.
    assert!((result.x[0] - 1.0).abs() <= 1e-6);
    assert!((result.x[1] - 2.0).abs() <= 1e-6);
}

#[test]
fn inconsistent_system_hits_iteration_bound() {
    // Two incompatible equations for one unknown: the least-squares residual
    // cannot approach zero, so refinement runs to its bound and the flag,
    // not an error, reports it.
    let a = matrix_from_triplets(2, 1, &[(0, 0, 1.0), (1, 0, 1.0)]);
    let b = vec![0.0, 1.0];
    let result = solve_iteratively(&a, &b, &solver_options(), None).unwrap();

    assert_eq!(result.status, SolveStatus::MaxIterationsReached);
    assert!((result.x[0] - 0.5).abs() <= 1e-8);
    assert!((result.residual_norm - 0.5f64.sqrt()).abs() <= 1e-8);
}

#[test]
fn stacked_round_trip_matches_block_solves() {
    // A1 (2x2) and A2 (3x2) share the solution x* = [1, -2].
    let a1 = matrix_from_triplets(2, 2, &[(0, 0, 2.0), (0, 1, 1.0), (1, 1, 3.0)]);
    let b1 = vec![0.0, -6.0];
    let a2 = matrix_from_triplets(
        3,
        2,
        &[(0, 0, 1.0), (1, 0, 1.0), (1, 1, 1.0), (2, 1, 2.0)],
    );
    let b2 = vec![1.0, -1.0, -4.0];

    let block1 = solve_iteratively(&a1, &b1, &solver_options(), None).unwrap();
    let block2 = solve_iteratively(&a2, &b2, &solver_options(), None).unwrap();
    let stacked = solve_stacked(&a1, &b1, &a2, &b2, &solver_options(), None).unwrap();

    assert_eq!(block1.status, SolveStatus::Converged);
    assert_eq!(block2.status, SolveStatus::Converged);
    assert_eq!(stacked.status, SolveStatus::Converged);
    assert_close(&block1.x, &[1.0, -2.0], 1e-8);
    assert_close(&block2.x, &[1.0, -2.0], 1e-8);
    assert_close(&stacked.x, &block1.x, 1e-8);
    assert_close(&stacked.x, &block2.x, 1e-8);
}

#[test]
fn solve_stacked_equals_manual_assembly() {
    let a1 = matrix_from_triplets(2, 2, &[(0, 0, 3.0), (1, 1, 4.0)]);
    let b1 = vec![3.0, -8.0];
    let a2 = matrix_from_triplets(2, 2, &[(0, 0, 1.0), (0, 1, 1.0), (1, 1, 1.0)]);
    let b2 = vec![-1.0, -2.0];

    let combined = vstack(&a1, &a2).unwrap();
    let mut b = b1.clone();
    b.extend_from_slice(&b2);

    let manual = solve_iteratively(&combined, &b, &solver_options(), None).unwrap();
    let stacked = solve_stacked(&a1, &b1, &a2, &b2, &solver_options(), None).unwrap();

    assert_eq!(manual.status, stacked.status);
    assert_close(&stacked.x, &manual.x, 1e-12);
}

#[test]
fn rhs_length_mismatch_is_an_error() {
    let a = matrix_from_triplets(3, 3, &[(0, 0, 1.0), (1, 1, 1.0), (2, 2, 1.0)]);
    let err = solve_iteratively(&a, &[1.0, 2.0], &solver_options(), None).unwrap_err();
    assert!(matches!(
        err,
        SolverError::RhsLength {
            expected: 3,
            actual: 2
        }
    ));
}

#[test]
fn reporter_receives_finish() {
    let a = matrix_from_triplets(2, 1, &[(0, 0, 1.0), (1, 0, 1.0)]);
    let b = vec![0.0, 1.0];
    let mut reporter = CollectingReporter {
        iterations: Vec::new(),
        finished: 0,
    };
    let result = solve_iteratively(&a, &b, &solver_options(), Some(&mut reporter)).unwrap();

    assert_eq!(result.status, SolveStatus::MaxIterationsReached);
    assert_eq!(reporter.finished, 1);
    assert_eq!(reporter.iterations.len(), result.iterations);
    for report in &reporter.iterations {
        assert!(report.residual_norm.is_finite());
        assert!(report.correction_norm.is_finite());
    }
}

fn l2(xs: &[f64]) -> f64 {
    xs.iter().map(|v| v * v).sum::<f64>().sqrt()
}
