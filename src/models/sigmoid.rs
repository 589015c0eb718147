//! Logistic psychometric function.
//!
//! `rate(soa) = a / (1 + exp(-b * (soa - c)))`
//!
//! The fitter relies on two primitive operations:
//! - predict the rate at an SOA (residuals, plots)
//! - fill a Jacobian row for an SOA (Gauss–Newton steps)
//!
//! The threshold solver uses the closed-form inverse.

use crate::domain::SigmoidParams;
use crate::error::AppError;

/// Logistic core `1 / (1 + exp(-z))`, evaluated without overflow for large |z|.
fn logistic(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Predicted sync rate at `soa`.
pub fn predict(p: &SigmoidParams, soa: f64) -> f64 {
    p.a * logistic(p.b * (soa - p.c))
}

/// Fill the partial derivatives of `predict` w.r.t. `(a, b, c)` at `soa`.
///
/// # Panics
/// Panics if `out` is shorter than 3.
pub fn fill_jacobian_row(p: &SigmoidParams, soa: f64, out: &mut [f64]) {
    let s = logistic(p.b * (soa - p.c));
    let ds = s * (1.0 - s);
    out[0] = s;
    out[1] = p.a * ds * (soa - p.c);
    out[2] = -p.a * ds * p.b;
}

/// Solve `predict(p, soa) = target` for `soa`.
///
/// `soa = c - ln(a / target - 1) / b`
pub fn invert(p: &SigmoidParams, target: f64) -> Result<f64, AppError> {
    if !p.is_finite() {
        return Err(AppError::domain("non-finite sigmoid parameters"));
    }
    if p.b == 0.0 {
        return Err(AppError::domain("zero slope (b = 0); the curve never crosses the target"));
    }
    if !(target.is_finite() && target > 0.0) {
        return Err(AppError::domain(format!(
            "target rate {target} must be finite and > 0"
        )));
    }

    let arg = p.a / target - 1.0;
    if !(arg.is_finite() && arg > 0.0) {
        return Err(AppError::domain(format!(
            "ln(a / target - 1) undefined: a={:.6}, target={target}, argument={arg:.6}",
            p.a
        )));
    }

    let soa = p.c - arg.ln() / p.b;
    if soa.is_finite() {
        Ok(soa)
    } else {
        Err(AppError::domain("threshold SOA is not finite"))
    }
}

/// Sample the fitted curve on `n` evenly spaced SOAs in `[soa_min, soa_max]`.
pub fn sample_curve(p: &SigmoidParams, soa_min: f64, soa_max: f64, n: usize) -> Vec<(f64, f64)> {
    let n = n.max(2);
    (0..n)
        .map(|i| {
            let u = i as f64 / (n as f64 - 1.0);
            let soa = soa_min + u * (soa_max - soa_min);
            (soa, predict(p, soa))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn invert_at_half_is_inflection_for_unit_amplitude() {
        for &(b, c) in &[(0.01, -150.0), (-0.02, 120.0), (0.5, 3.25)] {
            let p = SigmoidParams::new(1.0, b, c);
            assert_eq!(invert(&p, 0.5).unwrap(), c);
        }
    }

    #[test]
    fn invert_at_half_amplitude_is_inflection() {
        let p = SigmoidParams::new(0.8, -0.03, 95.0);
        assert_eq!(invert(&p, p.a / 2.0).unwrap(), p.c);
    }

    #[test]
    fn invert_and_predict_are_inverse() {
        let params = [
            SigmoidParams::new(0.9, 0.03, -100.0),
            SigmoidParams::new(0.7, -0.025, 80.0),
        ];
        for p in &params {
            for &target in &[0.01, 0.05, 0.2, 0.5, 0.65] {
                let soa = invert(p, target).unwrap();
                assert!((predict(p, soa) - target).abs() < 1e-12, "target {target}");
            }
        }
    }

    #[test]
    fn invert_rejects_unreachable_targets() {
        let p = SigmoidParams::new(0.4, 0.02, -80.0);
        let err = invert(&p, 0.5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Domain);

        let flat = SigmoidParams::new(1.0, 0.0, -80.0);
        assert_eq!(invert(&flat, 0.5).unwrap_err().kind(), ErrorKind::Domain);

        let ok = SigmoidParams::new(1.0, 0.02, -80.0);
        assert_eq!(invert(&ok, 0.0).unwrap_err().kind(), ErrorKind::Domain);
    }

    #[test]
    fn predict_stays_finite_far_from_inflection() {
        let p = SigmoidParams::new(1.0, 0.5, 0.0);
        assert_eq!(predict(&p, -5000.0), 0.0);
        assert!((predict(&p, 5000.0) - 1.0).abs() < 1e-15);
    }

    #[test]
    fn jacobian_matches_finite_differences() {
        let p = SigmoidParams::new(0.85, 0.02, -90.0);
        let soa = -60.0;
        let mut row = [0.0; 3];
        fill_jacobian_row(&p, soa, &mut row);

        let base = p.to_array();
        let steps = [1e-6, 1e-8, 1e-4];
        for k in 0..3 {
            let mut hi = base;
            let mut lo = base;
            hi[k] += steps[k];
            lo[k] -= steps[k];
            let fd = (predict(&SigmoidParams::from_array(hi), soa)
                - predict(&SigmoidParams::from_array(lo), soa))
                / (2.0 * steps[k]);
            assert!((fd - row[k]).abs() < 1e-6 * (1.0 + row[k].abs()), "param {k}: {fd} vs {}", row[k]);
        }
    }
}
