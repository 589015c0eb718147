//! Starting points for the optimizer.
//!
//! The primary start comes from `Side::initial_guess`. When it fails to
//! converge, the fitter retries from a bounded number of perturbed starts.
//! Perturbations are drawn from a seeded RNG so reruns are reproducible.

use rand::prelude::*;
use rand::rngs::StdRng;

use crate::domain::{SigmoidParams, Side};

/// Amplitude range for perturbed starts.
const A_RANGE: (f64, f64) = (0.6, 1.0);
/// `log10` range of the steepness multiplier.
const B_LOG10_RANGE: (f64, f64) = (-0.5, 1.0);
/// Maximum shift (ms) of the inflection location.
const C_SHIFT_MS: f64 = 100.0;

/// Draw `count` perturbed starts around `base`.
///
/// The sign of `b` is preserved so every start keeps the rising/falling shape
/// of its side.
pub fn perturbed_starts(base: SigmoidParams, count: usize, seed: u64) -> Vec<SigmoidParams> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let a = rng.gen_range(A_RANGE.0..=A_RANGE.1);
            let b = base.b * 10f64.powf(rng.gen_range(B_LOG10_RANGE.0..=B_LOG10_RANGE.1));
            let c = base.c + rng.gen_range(-C_SHIFT_MS..=C_SHIFT_MS);
            SigmoidParams::new(a, b, c)
        })
        .collect()
}

/// All starts for one side, primary first.
pub fn start_sequence(side: Side, retries: usize, seed: u64) -> Vec<SigmoidParams> {
    let base = side.initial_guess();
    // Separate streams per side so the two fits do not share perturbations.
    let side_seed = match side {
        Side::Left => seed,
        Side::Right => seed ^ 0x9e37_79b9_7f4a_7c15,
    };
    let mut starts = Vec::with_capacity(retries + 1);
    starts.push(base);
    starts.extend(perturbed_starts(base, retries, side_seed));
    starts
}
