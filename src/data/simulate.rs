//! Synthetic observer for generating phase-A trial files.
//!
//! The observer's synchrony probability is a two-sided sigmoid: the left
//! parameters apply for SOA ≤ 0, the right ones for SOA > 0. Each trial is a
//! Bernoulli draw, optionally replaced by a lapse (no key pressed).

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{Response, SigmoidParams};
use crate::error::AppError;
use crate::experiment::{plan_session, Counterbalance, Phase};
use crate::io::TrialLogRow;
use crate::models::predict;

/// Reaction times are clamped to this range (seconds).
const RT_CLAMP: (f64, f64) = (0.1, 2.0);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObserverModel {
    pub left: SigmoidParams,
    pub right: SigmoidParams,
    /// Probability that a trial gets no response.
    pub lapse: f64,
    pub rt_mean: f64,
    pub rt_sd: f64,
}

impl Default for ObserverModel {
    fn default() -> Self {
        Self {
            left: SigmoidParams::new(0.9, 0.03, -100.0),
            right: SigmoidParams::new(0.85, -0.025, 120.0),
            lapse: 0.02,
            rt_mean: 0.6,
            rt_sd: 0.15,
        }
    }
}

impl ObserverModel {
    pub fn sync_probability(&self, soa: f64) -> f64 {
        let params = if soa <= 0.0 { &self.left } else { &self.right };
        let p = predict(params, soa);
        if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 }
    }

    fn validate(&self) -> Result<(), AppError> {
        if !(self.left.is_finite() && self.right.is_finite()) {
            return Err(AppError::config("Observer parameters must be finite."));
        }
        if !(0.0..=1.0).contains(&self.lapse) {
            return Err(AppError::config(format!("Lapse probability must be in [0, 1], got {}.", self.lapse)));
        }
        if !(self.rt_mean.is_finite() && self.rt_sd.is_finite() && self.rt_sd >= 0.0) {
            return Err(AppError::config("Reaction-time mean/sd must be finite with sd >= 0."));
        }
        Ok(())
    }
}

/// Run a full phase-A session for `subject` against `model`.
///
/// Rows come back in presentation order, keyed with the subject's counterbalance.
pub fn simulate_session(model: &ObserverModel, subject: u32, seed: u64) -> Result<Vec<TrialLogRow>, AppError> {
    model.validate()?;

    let plan = plan_session(Phase::A, subject, seed, None)?;
    let counterbalance = Counterbalance::for_phase(Phase::A, subject);
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(1));
    let rt = Normal::new(model.rt_mean, model.rt_sd)
        .map_err(|e| AppError::config(format!("Reaction-time distribution error: {e}")))?;

    let rows = plan
        .into_iter()
        .map(|trial| {
            let response = if rng.gen_bool(model.lapse) {
                Response::Missing
            } else if rng.gen_bool(model.sync_probability(f64::from(trial.soa_ms))) {
                Response::Sync
            } else {
                Response::Async
            };

            let key = counterbalance.key_for(response);
            let reaction = match key {
                Some(_) => rt.sample(&mut rng).clamp(RT_CLAMP.0, RT_CLAMP.1),
                None => f64::NAN,
            };

            TrialLogRow {
                subj: subject,
                block: trial.block,
                trial: trial.trial,
                label: trial.label,
                soa: trial.soa_ms,
                resp: key.map_or("NaN", |k| k.label()).to_string(),
                resp_recode: response.label().to_string(),
                rt: reaction,
            }
        })
        .collect();

    Ok(rows)
}
