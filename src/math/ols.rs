//! Least squares solver used as the fallback step solver.
//!
//! The Levenberg–Marquardt step solves a small `k × k` damped normal system
//! (`k ≤ 3` here). Cholesky handles the well-conditioned case; when the system is
//! numerically singular (e.g. duplicated time stamps in a kinematic fit) we fall
//! back to an SVD solve, which also accepts tall, non-square systems.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Solve a symmetric positive (semi-)definite system `a · x = b`.
///
/// Cholesky first; SVD least squares when the factorization fails.
pub fn solve_normal_equations(a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    if let Some(chol) = a.clone().cholesky() {
        let x = chol.solve(b);
        if x.iter().all(|v| v.is_finite()) {
            return Some(x);
        }
    }
    solve_least_squares(a, b)
}
