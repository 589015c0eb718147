//! Linear least squares solver.
//!
//! Each Levenberg–Marquardt iteration solves a small linear problem of the form:
//!
//! ```text
//! minimize ‖A δ - rhs‖²
//! ```
//!
//! where `A` stacks the residual Jacobian on top of the damping rows. We use SVD
//! so tall systems (more rows than columns) and nearly collinear columns are
//! handled without panicking. (Nalgebra's `QR::solve` is intended for square
//! systems.) The parameter dimension is 3, so SVD cost is negligible.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    if x.nrows() != y.len() || x.ncols() == 0 {
        return None;
    }
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if a strict solve fails.
    for &tol in &[1e-14, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}
