//! Nonlinear least-squares fit of one side's psychometric curve.
//!
//! Given:
//! - SOAs `x_i`
//! - observed sync rates `y_i`
//! - a starting point `(a, b, c)`
//!
//! we minimize `Σ (predict(x_i) - y_i)²` with Levenberg–Marquardt. Each
//! iteration solves the damped Gauss–Newton system as a stacked linear
//! least-squares problem:
//!
//! ```text
//! [ J                 ]       [ -r ]
//! [ sqrt(λ·diag(JᵀJ)) ] δ  =  [  0 ]
//! ```
//!
//! Marquardt's diagonal scaling matters here: `b` is O(0.01) while `c` is
//! O(100), so an unscaled damping term would stall one of them.

use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector};

use crate::domain::{FitQuality, RateTable, Side, SideFit, SigmoidParams};
use crate::error::AppError;
use crate::fit::start::start_sequence;
use crate::math::solve_least_squares;
use crate::models::{fill_jacobian_row, predict};

/// Minimum number of distinct SOAs needed to identify three parameters.
pub const MIN_DISTINCT_SOAS: usize = 3;

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e16;
const LAMBDA_FACTOR: f64 = 10.0;
/// Floor for the Marquardt scaling of a flat Jacobian column.
const DIAG_FLOOR: f64 = 1e-12;
/// Absolute SSE below which the data is reproduced exactly.
const SSE_FLOOR: f64 = 1e-24;
/// Relative SSE reduction below which an accepted step ends the search.
const FTOL: f64 = 1e-12;
/// Relative parameter change below which an accepted step ends the search.
const XTOL: f64 = 1e-10;
/// Orthogonality between residuals and Jacobian columns accepted as stationary.
const GTOL: f64 = 1e-6;

/// Options that affect how each side is fitted.
#[derive(Debug, Clone)]
pub struct FitOptions {
    /// Iteration cap per attempt (accepted and rejected steps both count).
    pub max_iterations: usize,
    /// Perturbed restarts allowed after the primary start fails.
    pub retries: usize,
    /// Seed for the perturbed restarts.
    pub seed: u64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            retries: 8,
            seed: 42,
        }
    }
}

/// Result of fitting arbitrary `(x, y)` data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SigmoidFit {
    pub params: SigmoidParams,
    pub start: SigmoidParams,
    pub quality: FitQuality,
}

#[derive(Debug, Clone, Copy)]
struct Attempt {
    params: SigmoidParams,
    sse: f64,
    iterations: usize,
}

/// Fit one side of the rate table.
///
/// Errors carry the side and stage, e.g. `left side / fit: ...`.
pub fn fit_side(side: Side, table: &RateTable, opts: &FitOptions) -> Result<SideFit, AppError> {
    let (x, y) = table.side_xy(side);
    let starts = start_sequence(side, opts.retries, opts.seed);

    let fit = fit_sigmoid(&x, &y, &starts, opts.max_iterations)
        .map_err(|e| e.at(format!("{side} side / fit")))?;

    info!(
        "{side} fit: a={:.6} b={:.6} c={:.3} (sse={:.3e}, n={}, iterations={}, attempts={})",
        fit.params.a,
        fit.params.b,
        fit.params.c,
        fit.quality.sse,
        fit.quality.n,
        fit.quality.iterations,
        fit.quality.attempts,
    );

    Ok(SideFit {
        side,
        params: fit.params,
        start: fit.start,
        quality: fit.quality,
    })
}

/// Fit `rate = a / (1 + exp(-b (x - c)))` to `(x, y)`.
///
/// `starts` are tried in order; the first attempt that converges wins.
pub fn fit_sigmoid(
    x: &[f64],
    y: &[f64],
    starts: &[SigmoidParams],
    max_iterations: usize,
) -> Result<SigmoidFit, AppError> {
    validate_data(x, y)?;
    if starts.is_empty() {
        return Err(AppError::fit("No starting points supplied."));
    }

    let mut last_failure = String::new();
    for (idx, start) in starts.iter().enumerate() {
        match levenberg_marquardt(x, y, *start, max_iterations) {
            Ok(attempt) => {
                let n = x.len();
                return Ok(SigmoidFit {
                    params: attempt.params,
                    start: *start,
                    quality: FitQuality {
                        sse: attempt.sse,
                        rmse: (attempt.sse / n as f64).sqrt(),
                        n,
                        iterations: attempt.iterations,
                        attempts: idx + 1,
                    },
                });
            }
            Err(reason) => {
                warn!(
                    "fit attempt {}/{} from a={:.3} b={:.4} c={:.1} failed: {reason}",
                    idx + 1,
                    starts.len(),
                    start.a,
                    start.b,
                    start.c
                );
                last_failure = reason;
            }
        }
    }

    Err(AppError::fit(format!(
        "minimizer did not converge after {} attempt(s); last failure: {last_failure}",
        starts.len()
    )))
}

fn validate_data(x: &[f64], y: &[f64]) -> Result<(), AppError> {
    if x.len() != y.len() {
        return Err(AppError::fit(format!(
            "x/y length mismatch ({} vs {}).",
            x.len(),
            y.len()
        )));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(AppError::fit("Non-finite SOA or rate value."));
    }

    let mut distinct = x.to_vec();
    distinct.sort_by(|a, b| a.total_cmp(b));
    distinct.dedup_by(|a, b| a == b);
    if distinct.len() < MIN_DISTINCT_SOAS {
        return Err(AppError::fit(format!(
            "Insufficient data: {} distinct SOA value(s), need at least {MIN_DISTINCT_SOAS}.",
            distinct.len()
        )));
    }

    let y_min = y.iter().copied().fold(f64::INFINITY, f64::min);
    let y_max = y.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if y_max - y_min <= 1e-12 {
        return Err(AppError::fit(format!(
            "Sync rate is constant ({y_min:.3}) across SOAs; the curve is not identifiable."
        )));
    }

    Ok(())
}

fn levenberg_marquardt(
    x: &[f64],
    y: &[f64],
    start: SigmoidParams,
    max_iterations: usize,
) -> Result<Attempt, String> {
    let mut theta = start;
    let mut r = residuals(&theta, x, y);
    let mut sse = sum_sq(&r);
    if !sse.is_finite() {
        return Err("non-finite residuals at the starting point".to_string());
    }
    if sse < SSE_FLOOR {
        return Ok(Attempt {
            params: theta,
            sse,
            iterations: 0,
        });
    }

    let mut lambda = LAMBDA_INIT;
    let mut jac = jacobian(&theta, x);

    for iteration in 1..=max_iterations {
        let accepted = damped_step(&jac, &r, lambda).and_then(|step| {
            let candidate = SigmoidParams::new(theta.a + step[0], theta.b + step[1], theta.c + step[2]);
            let r_new = residuals(&candidate, x, y);
            let sse_new = sum_sq(&r_new);
            (candidate.is_finite() && sse_new.is_finite() && sse_new < sse)
                .then_some((candidate, r_new, sse_new, step))
        });

        let Some((candidate, r_new, sse_new, step)) = accepted else {
            lambda *= LAMBDA_FACTOR;
            if lambda > LAMBDA_MAX {
                let ortho = orthogonality(&jac, &r);
                if ortho < GTOL {
                    return Ok(Attempt {
                        params: theta,
                        sse,
                        iterations: iteration,
                    });
                }
                return Err(format!(
                    "damping diverged without reaching a stationary point (orthogonality {ortho:.2e})"
                ));
            }
            continue;
        };

        let reduction = (sse - sse_new) / sse.max(f64::MIN_POSITIVE);
        let before = theta.to_array();
        let small_step = step
            .iter()
            .zip(before.iter())
            .all(|(d, p)| d.abs() <= XTOL * (p.abs() + XTOL));

        theta = candidate;
        r = r_new;
        sse = sse_new;
        lambda = (lambda / LAMBDA_FACTOR).max(LAMBDA_MIN);

        debug!(
            "lm iter {iteration}: sse={sse:.6e} lambda={lambda:.1e} a={:.6} b={:.6} c={:.3}",
            theta.a, theta.b, theta.c
        );

        if sse < SSE_FLOOR || reduction < FTOL || small_step {
            return Ok(Attempt {
                params: theta,
                sse,
                iterations: iteration,
            });
        }

        jac = jacobian(&theta, x);
    }

    Err(format!("no convergence within {max_iterations} iterations"))
}

/// Solve the damped Gauss–Newton system for the parameter step.
fn damped_step(jac: &DMatrix<f64>, r: &[f64], lambda: f64) -> Option<[f64; 3]> {
    let n = jac.nrows();
    let mut a = DMatrix::<f64>::zeros(n + 3, 3);
    let mut rhs = DVector::<f64>::zeros(n + 3);

    for i in 0..n {
        for k in 0..3 {
            a[(i, k)] = jac[(i, k)];
        }
        rhs[i] = -r[i];
    }
    for k in 0..3 {
        let scale = jac.column(k).norm_squared().max(DIAG_FLOOR);
        a[(n + k, k)] = (lambda * scale).sqrt();
    }

    let step = solve_least_squares(&a, &rhs)?;
    Some([step[0], step[1], step[2]])
}

fn jacobian(theta: &SigmoidParams, x: &[f64]) -> DMatrix<f64> {
    let mut jac = DMatrix::<f64>::zeros(x.len(), 3);
    let mut row = [0.0; 3];
    for (i, &xi) in x.iter().enumerate() {
        fill_jacobian_row(theta, xi, &mut row);
        for k in 0..3 {
            jac[(i, k)] = row[k];
        }
    }
    jac
}

fn residuals(theta: &SigmoidParams, x: &[f64], y: &[f64]) -> Vec<f64> {
    x.iter().zip(y.iter()).map(|(&xi, &yi)| predict(theta, xi) - yi).collect()
}

fn sum_sq(v: &[f64]) -> f64 {
    v.iter().map(|e| e * e).sum()
}

/// MINPACK-style orthogonality: largest cosine between the residual vector
/// and any Jacobian column. Zero at a stationary point.
fn orthogonality(jac: &DMatrix<f64>, r: &[f64]) -> f64 {
    let r = DVector::from_column_slice(r);
    let r_norm = r.norm();
    if r_norm == 0.0 {
        return 0.0;
    }
    (0..jac.ncols())
        .map(|k| {
            let col = jac.column(k);
            let col_norm = col.norm();
            if col_norm == 0.0 {
                0.0
            } else {
                col.dot(&r).abs() / (col_norm * r_norm)
            }
        })
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::aggregate_rates;
    use crate::domain::{RateRow, Response, TrialRecord};
    use crate::error::ErrorKind;

    fn synthetic(truth: SigmoidParams, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| predict(&truth, x)).collect()
    }

    fn assert_rel(actual: f64, expected: f64, tol: f64) {
        let rel = (actual - expected).abs() / expected.abs();
        assert!(rel < tol, "expected {expected}, got {actual} (rel {rel:.2e})");
    }

    #[test]
    fn recovers_known_parameters_without_noise() {
        let cases = [
            (Side::Left, SigmoidParams::new(0.9, 0.03, -100.0), -300.0),
            (Side::Right, SigmoidParams::new(0.85, -0.025, 120.0), 0.0),
        ];
        for (side, truth, x0) in cases {
            let xs: Vec<f64> = (0..13).map(|i| x0 + 25.0 * i as f64).collect();
            let ys = synthetic(truth, &xs);
            let fit = fit_sigmoid(&xs, &ys, &[side.initial_guess()], 500).unwrap();
            assert_rel(fit.params.a, truth.a, 1e-3);
            assert_rel(fit.params.b, truth.b, 1e-3);
            assert_rel(fit.params.c, truth.c, 1e-3);
            assert_eq!(fit.quality.attempts, 1);
            assert!(fit.quality.sse < 1e-12);
        }
    }

    #[test]
    fn reference_rate_table_converges_on_both_sides() {
        // Seven SOAs, 100 trials each, rates as in the reference scenario.
        let rates = [
            (-300.0, 2),
            (-150.0, 10),
            (-50.0, 48),
            (0.0, 55),
            (50.0, 40),
            (150.0, 8),
            (300.0, 1),
        ];
        let mut trials = Vec::new();
        for &(soa, n_sync) in &rates {
            for k in 0..100 {
                let response = if k < n_sync { Response::Sync } else { Response::Async };
                trials.push(TrialRecord { soa, response });
            }
        }
        let table = aggregate_rates(&trials).unwrap();
        let opts = FitOptions::default();

        let left = fit_side(Side::Left, &table, &opts).unwrap();
        assert_eq!(left.quality.n, 4);
        assert!(left.params.b > 0.0);
        assert!(left.params.c > -150.0 && left.params.c < -50.0, "left c = {}", left.params.c);

        let right = fit_side(Side::Right, &table, &opts).unwrap();
        assert_eq!(right.quality.n, 4);
        assert!(right.params.b < 0.0);
        assert!(right.params.c > 0.0 && right.params.c < 150.0, "right c = {}", right.params.c);
    }

    #[test]
    fn fewer_than_three_distinct_soas_is_a_fit_error() {
        let xs = [-100.0, -100.0, 0.0, 0.0];
        let ys = [0.1, 0.2, 0.5, 0.6];
        let err = fit_sigmoid(&xs, &ys, &[Side::Left.initial_guess()], 500).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Fit);
        assert!(err.message().contains("Insufficient data"));
    }

    #[test]
    fn constant_rates_are_a_fit_error() {
        let xs = [-200.0, -100.0, 0.0];
        let ys = [0.3, 0.3, 0.3];
        let err = fit_sigmoid(&xs, &ys, &[Side::Left.initial_guess()], 500).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Fit);
    }

    #[test]
    fn exhausted_attempts_report_every_start() {
        let truth = SigmoidParams::new(0.9, 0.03, -100.0);
        let xs: Vec<f64> = (0..13).map(|i| -300.0 + 25.0 * i as f64).collect();
        let ys = synthetic(truth, &xs);
        let starts = start_sequence(Side::Left, 3, 1);

        let err = fit_sigmoid(&xs, &ys, &starts, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Fit);
        assert!(err.message().contains("after 4 attempt(s)"), "{}", err.message());
    }

    #[test]
    fn later_start_rescues_a_failed_primary() {
        let truth = SigmoidParams::new(0.9, 0.03, -100.0);
        let xs: Vec<f64> = (0..13).map(|i| -300.0 + 25.0 * i as f64).collect();
        let ys = synthetic(truth, &xs);

        // One iteration is not enough from the primary guess; the second start is exact.
        let starts = [Side::Left.initial_guess(), truth];
        let fit = fit_sigmoid(&xs, &ys, &starts, 1).unwrap();
        assert_eq!(fit.quality.attempts, 2);
        assert_eq!(fit.start, truth);
        assert_eq!(fit.params, truth);
    }

    #[test]
    fn perturbed_restart_recovers_side_parameters() {
        let truth = SigmoidParams::new(0.9, 0.03, -100.0);
        let rows = (0..13)
            .map(|i| {
                let soa = -300.0 + 25.0 * i as f64;
                RateRow {
                    soa,
                    count_sync: 0,
                    count_total: 1,
                    sync_rate: predict(&truth, soa),
                }
            })
            .collect();
        let table = RateTable::from_sorted_rows(rows);

        // The primary guess needs more than ten iterations on this data.
        let opts = FitOptions {
            max_iterations: 10,
            retries: 32,
            seed: 42,
        };
        let (xs, ys) = table.side_xy(Side::Left);
        assert!(fit_sigmoid(&xs, &ys, &[Side::Left.initial_guess()], opts.max_iterations).is_err());

        let fit = fit_side(Side::Left, &table, &opts).unwrap();
        assert!(fit.quality.attempts > 1, "attempts = {}", fit.quality.attempts);
        let starts = start_sequence(Side::Left, opts.retries, opts.seed);
        assert_eq!(fit.start, starts[fit.quality.attempts - 1]);
        assert_ne!(fit.start, Side::Left.initial_guess());
        assert_rel(fit.params.a, truth.a, 1e-3);
        assert_rel(fit.params.b, truth.b, 1e-3);
        assert_rel(fit.params.c, truth.c, 1e-3);
    }

    #[test]
    fn side_errors_name_the_side_and_stage() {
        let trials: Vec<TrialRecord> = [-100.0, 0.0, 100.0, 200.0, 300.0]
            .iter()
            .map(|&soa| TrialRecord { soa, response: Response::Sync })
            .collect();
        let table = aggregate_rates(&trials).unwrap();
        let err = fit_side(Side::Left, &table, &FitOptions::default()).unwrap_err();
        assert!(err.message().starts_with("left side / fit:"), "{}", err.message());
    }

    #[test]
    fn orthogonality_is_zero_for_exact_fit() {
        let truth = SigmoidParams::new(1.0, 0.02, -50.0);
        let xs = [-200.0, -100.0, -50.0, 0.0];
        let jac = jacobian(&truth, &xs);
        assert_eq!(orthogonality(&jac, &[0.0; 4]), 0.0);
    }
}
